//! Async client for one battle.
//!
//! [`BattleClient`] is a thin handle over a background transport loop. The
//! loop owns the [`BattleSession`] reducer: every inbound frame is parsed,
//! reduced, and the resulting [`BattleEvent`]s are pushed onto a bounded
//! channel returned from [`BattleClient::start`].
//!
//! Intents (`mark_ready`, `submit_action`, `send_chat`) are request/response
//! futures: each frame carries a fresh `ackId`, and the future resolves when
//! the server's matching `ack` arrives, when `ack_timeout` elapses, or when
//! the loop exits.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect("ws://localhost:3001/battle").await?;
//! let config = ClientConfig::new("b1").with_token("t0k3n").with_player_name("Harry");
//! let (client, mut events) = BattleClient::start(transport, config);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         BattleEvent::StateUpdated { can_act: true, .. } => {
//!             client.submit_action(PlayerAction::Defend).await?;
//!         }
//!         BattleEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::dedup::DedupWindows;
use crate::error::{BattleClientError, Result};
use crate::event::BattleEvent;
use crate::notify::{Notifier, NotifyConfig};
use crate::protocol::{AckPayload, ClientMessage, OutboundFrame, PlayerAction, ServerMessage};
use crate::session::BattleSession;
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time to wait for an acknowledgment.
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`BattleClient`].
///
/// ```
/// use battle_sync_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("b1")
///     .with_token("s3cret")
///     .with_player_name("Harry")
///     .with_ack_timeout(Duration::from_secs(3));
/// assert_eq!(config.battle_id, "b1");
/// assert_eq!(config.event_channel_capacity, 256);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Battle to join.
    pub battle_id: String,
    /// Player token sent with `playerAuth`.
    pub token: Option<String>,
    /// Player name sent with `playerAuth`, also the chat fallback name.
    pub player_name: Option<String>,
    pub notify: NotifyConfig,
    pub windows: DedupWindows,
    /// How long an intent waits for its acknowledgment.
    ///
    /// Defaults to **10 seconds**. On expiry the intent fails with
    /// [`BattleClientError::Timeout`] and a pending action reopens the
    /// action controls.
    pub ack_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped (with a warning)
    /// rather than stalling the loop. `Disconnected` is always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`BattleClient::shutdown`] waits for the loop before
    /// aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    pub fn new(battle_id: impl Into<String>) -> Self {
        Self {
            battle_id: battle_id.into(),
            token: None,
            player_name: None,
            notify: NotifyConfig::default(),
            windows: DedupWindows::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    #[must_use]
    pub fn with_windows(mut self, windows: DedupWindows) -> Self {
        self.windows = windows;
        self
    }

    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// A zero timeout aborts the loop without waiting.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// A user intent that needs the viewer's identity.
#[derive(Debug)]
enum Intent {
    Ready,
    Action(PlayerAction),
    Chat(String),
}

#[derive(Debug)]
enum Setting {
    Enabled(bool),
    Volume(f64),
    BackgroundOnly(bool),
    ForegroundActive(bool),
}

#[derive(Debug)]
enum Command {
    Intent {
        intent: Intent,
        respond: oneshot::Sender<Result<AckPayload>>,
    },
    Configure(Setting),
}

/// What an outstanding acknowledgment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckKind {
    Auth,
    Ready,
    Action,
    Chat,
}

#[derive(Debug)]
struct PendingAck {
    kind: AckKind,
    deadline: Instant,
    respond: Option<oneshot::Sender<Result<AckPayload>>>,
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
    player_id: Mutex<Option<String>>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            player_id: Mutex::new(None),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running battle connection.
pub struct BattleClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<ClientState>,
    countdown: watch::Receiver<u32>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl BattleClient {
    /// Start the transport loop with a default session (system clock, no
    /// alert side channels).
    ///
    /// The loop immediately sends `join` and then `playerAuth`; a positive
    /// acknowledgment of the latter confirms the viewer's identity.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<BattleEvent>) {
        let session = BattleSession::new(
            Notifier::new(config.notify.clone()),
            config.windows,
            Arc::new(SystemClock),
        );
        Self::start_with_session(transport, config, session)
    }

    /// Start the transport loop around a caller-built session, e.g. one with
    /// alert channels attached or a manual clock.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start_with_session(
        transport: impl Transport,
        config: ClientConfig,
        session: BattleSession,
    ) -> (Self, mpsc::Receiver<BattleEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<BattleEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ClientState::new());
        let countdown = session.countdown();
        let shutdown_timeout = config.shutdown_timeout;

        let task = tokio::spawn(transport_loop(
            transport,
            LoopContext {
                config,
                session,
                pending: HashMap::new(),
                event_tx,
                state: Arc::clone(&state),
            },
            cmd_rx,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            countdown,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (client, event_rx)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Tell the server the viewer is ready.
    ///
    /// # Errors
    ///
    /// [`BattleClientError::NotAuthenticated`] before the identity is known,
    /// [`BattleClientError::Rejected`] on a negative acknowledgment,
    /// [`BattleClientError::Timeout`] when no acknowledgment arrives in time,
    /// [`BattleClientError::NotConnected`] / [`BattleClientError::AckDropped`]
    /// when the connection is gone.
    pub async fn mark_ready(&self) -> Result<AckPayload> {
        self.request(Intent::Ready).await
    }

    /// Submit an action for the current turn. Locks the action controls
    /// until the server answers.
    ///
    /// # Errors
    ///
    /// As for [`mark_ready`](Self::mark_ready).
    pub async fn submit_action(&self, action: PlayerAction) -> Result<AckPayload> {
        self.request(Intent::Action(action)).await
    }

    /// Send a chat line. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// [`BattleClientError::EmptyMessage`] for a blank line, otherwise as for
    /// [`mark_ready`](Self::mark_ready).
    pub async fn send_chat(&self, text: &str) -> Result<AckPayload> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BattleClientError::EmptyMessage);
        }
        self.request(Intent::Chat(text.to_string())).await
    }

    // ── Notification settings ───────────────────────────────────────

    /// # Errors
    ///
    /// [`BattleClientError::NotConnected`] once the loop has exited.
    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<()> {
        self.send(Command::Configure(Setting::Enabled(enabled)))
    }

    /// Values outside `0.0..=1.0` are clamped.
    ///
    /// # Errors
    ///
    /// [`BattleClientError::NotConnected`] once the loop has exited.
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.send(Command::Configure(Setting::Volume(volume)))
    }

    /// # Errors
    ///
    /// [`BattleClientError::NotConnected`] once the loop has exited.
    pub fn set_background_only(&self, background_only: bool) -> Result<()> {
        self.send(Command::Configure(Setting::BackgroundOnly(background_only)))
    }

    /// Report whether the viewing surface is in the foreground.
    ///
    /// # Errors
    ///
    /// [`BattleClientError::NotConnected`] once the loop has exited.
    pub fn set_foreground_active(&self, active: bool) -> Result<()> {
        self.send(Command::Configure(Setting::ForegroundActive(active)))
    }

    // ── State accessors ─────────────────────────────────────────────

    /// The display countdown in seconds.
    pub fn countdown(&self) -> watch::Receiver<u32> {
        self.countdown.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// The viewer's confirmed player id.
    pub async fn player_id(&self) -> Option<String> {
        self.state.player_id.lock().await.clone()
    }

    /// Shut down the client, closing the transport.
    ///
    /// The event receiver yields `Disconnected` and then `None`.
    pub async fn shutdown(&mut self) {
        debug!("BattleClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn send(&self, cmd: Command) -> Result<()> {
        if !self.is_connected() {
            return Err(BattleClientError::NotConnected);
        }
        self.cmd_tx
            .send(cmd)
            .map_err(|_| BattleClientError::NotConnected)
    }

    async fn request(&self, intent: Intent) -> Result<AckPayload> {
        let (respond, rx) = oneshot::channel();
        self.send(Command::Intent { intent, respond })?;
        rx.await.map_err(|_| BattleClientError::AckDropped)?
    }
}

impl std::fmt::Debug for BattleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleClient")
            .field("connected", &self.is_connected())
            .field("countdown", &*self.countdown.borrow())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for BattleClient {
    fn drop(&mut self) {
        // No executor to drive a graceful close from here; abort instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Everything the loop owns besides the transport and its inputs.
struct LoopContext {
    config: ClientConfig,
    session: BattleSession,
    pending: HashMap<Uuid, PendingAck>,
    event_tx: mpsc::Sender<BattleEvent>,
    state: Arc<ClientState>,
}

/// Far-future stand-in used while no acknowledgment is pending.
const IDLE_DEADLINE: Duration = Duration::from_secs(3600);

/// Multiplexes commands, shutdown, inbound frames and acknowledgment
/// deadlines with `tokio::select!`.
///
/// Exits when the command channel closes, the shutdown signal fires, the
/// transport ends or fails.
async fn transport_loop(
    mut transport: impl Transport,
    mut ctx: LoopContext,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(battle_id = %ctx.config.battle_id, "transport loop started");
    emit_event(&ctx.event_tx, BattleEvent::Connected);

    if let Err(reason) = ctx.handshake(&mut transport).await {
        ctx.disconnect(Some(reason)).await;
        return;
    }

    loop {
        let next_deadline = ctx.pending.values().map(|p| p.deadline).min();
        let deadline_armed = next_deadline.is_some();
        let deadline = next_deadline.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE);

        // Commands first: a setting changed before a frame arrived applies to it.
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Intent { intent, respond }) => {
                        if let Err(e) = ctx.dispatch(&mut transport, intent, respond).await {
                            error!("transport send error: {e}");
                            ctx.disconnect(Some(format!("transport send error: {e}"))).await;
                            break;
                        }
                    }
                    Some(Command::Configure(setting)) => ctx.configure(setting),
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        ctx.disconnect(Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                ctx.disconnect(Some("client shut down".into())).await;
                break;
            }

            _ = tokio::time::sleep_until(deadline), if deadline_armed => {
                ctx.expire_acks().await;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => match ServerMessage::parse(&text) {
                        Ok(msg) => ctx.receive(msg).await,
                        Err(e) => warn!("failed to parse server frame: {e} (raw: {text})"),
                    },
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        ctx.disconnect(Some(format!("transport receive error: {e}"))).await;
                        break;
                    }
                    None => {
                        debug!("transport closed by server");
                        ctx.disconnect(None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

impl LoopContext {
    /// Send `join`, then `playerAuth` with an acknowledgment id.
    async fn handshake(
        &mut self,
        transport: &mut impl Transport,
    ) -> std::result::Result<(), String> {
        let join = OutboundFrame::fire(ClientMessage::Join {
            battle_id: self.config.battle_id.clone(),
        });
        let auth = OutboundFrame::with_ack(ClientMessage::PlayerAuth {
            battle_id: self.config.battle_id.clone(),
            token: self.config.token.clone(),
            name: self.config.player_name.clone(),
        });
        for frame in [&join, &auth] {
            send_frame(transport, frame)
                .await
                .map_err(|e| format!("transport send error: {e}"))?;
        }
        if let Some(id) = auth.ack_id {
            self.track(id, AckKind::Auth, None);
        }
        Ok(())
    }

    fn track(
        &mut self,
        id: Uuid,
        kind: AckKind,
        respond: Option<oneshot::Sender<Result<AckPayload>>>,
    ) {
        let deadline = Instant::now() + self.config.ack_timeout;
        self.pending.insert(
            id,
            PendingAck {
                kind,
                deadline,
                respond,
            },
        );
    }

    /// Turn an intent into a frame and send it. Only a transport failure is
    /// returned; everything else resolves `respond`.
    async fn dispatch(
        &mut self,
        transport: &mut impl Transport,
        intent: Intent,
        respond: oneshot::Sender<Result<AckPayload>>,
    ) -> Result<()> {
        let battle_id = self.config.battle_id.clone();
        let Some(player_id) = self.session.identity().map(str::to_string) else {
            let _ = respond.send(Err(BattleClientError::NotAuthenticated));
            return Ok(());
        };

        let (kind, message) = match intent {
            Intent::Ready => (AckKind::Ready, ClientMessage::PlayerReady { battle_id, player_id }),
            Intent::Action(action) => (
                AckKind::Action,
                ClientMessage::PlayerAction {
                    battle_id,
                    player_id,
                    action,
                },
            ),
            Intent::Chat(message) => (
                AckKind::Chat,
                ClientMessage::ChatMessage {
                    battle_id,
                    name: self.session.chat_name(self.config.player_name.as_deref()),
                    message,
                },
            ),
        };

        let frame = OutboundFrame::with_ack(message);
        debug!(event = frame.message.event_name(), ack_id = ?frame.ack_id, "sending intent");
        if let Err(e) = send_frame(transport, &frame).await {
            let reason = e.to_string();
            let _ = respond.send(Err(e));
            return Err(BattleClientError::TransportSend(reason));
        }

        if kind == AckKind::Action {
            let event = self.session.action_submitted();
            emit_event(&self.event_tx, event);
        }
        if let Some(id) = frame.ack_id {
            self.track(id, kind, Some(respond));
        }
        Ok(())
    }

    fn configure(&mut self, setting: Setting) {
        debug!(?setting, "notification setting changed");
        let notifier = self.session.notifier_mut();
        match setting {
            Setting::Enabled(on) => notifier.set_enabled(on),
            Setting::Volume(v) => notifier.set_volume(v),
            Setting::BackgroundOnly(on) => notifier.set_background_only(on),
            Setting::ForegroundActive(on) => notifier.set_foreground_active(on),
        }
    }

    async fn receive(&mut self, msg: ServerMessage) {
        let events = match msg {
            ServerMessage::Ack(ack) => self.resolve_ack(ack),
            other => self.session.handle(other),
        };
        self.publish(events).await;
    }

    fn resolve_ack(&mut self, ack: AckPayload) -> Vec<BattleEvent> {
        let Some(pending) = ack.ack_id.and_then(|id| self.pending.remove(&id)) else {
            debug!(ack_id = ?ack.ack_id, "acknowledgment for unknown request ignored");
            return Vec::new();
        };

        let mut events = Vec::new();
        match pending.kind {
            AckKind::Auth if ack.ok => events.extend(self.session.on_auth(&ack.auth())),
            AckKind::Auth => {
                let reason = ack.error.clone().unwrap_or_else(|| "알 수 없는 오류".to_string());
                warn!(%reason, "player authentication rejected");
                events.push(BattleEvent::AuthFailed { reason });
            }
            AckKind::Action => events.extend(self.session.action_resolved(ack.ok)),
            AckKind::Ready | AckKind::Chat => {}
        }

        if let Some(respond) = pending.respond {
            let result = if ack.ok {
                Ok(ack)
            } else {
                Err(BattleClientError::Rejected {
                    error: ack.error.unwrap_or_else(|| "알 수 없는 오류".to_string()),
                })
            };
            let _ = respond.send(result);
        }
        events
    }

    async fn expire_acks(&mut self) {
        let now = Instant::now();
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut events = Vec::new();
        for id in expired {
            let Some(pending) = self.pending.remove(&id) else {
                continue;
            };
            warn!(ack_id = %id, kind = ?pending.kind, "acknowledgment timed out");
            match pending.kind {
                AckKind::Auth => events.push(BattleEvent::AuthFailed {
                    reason: "acknowledgment timed out".to_string(),
                }),
                AckKind::Action => events.extend(self.session.action_resolved(false)),
                AckKind::Ready | AckKind::Chat => {}
            }
            if let Some(respond) = pending.respond {
                let _ = respond.send(Err(BattleClientError::Timeout));
            }
        }
        self.publish(events).await;
    }

    async fn publish(&mut self, events: Vec<BattleEvent>) {
        for event in events {
            if let BattleEvent::IdentityConfirmed { player_id } = &event {
                *self.state.player_id.lock().await = Some(player_id.clone());
            }
            emit_event(&self.event_tx, event);
        }
    }

    /// Final event. Pending intents resolve with `AckDropped` when their
    /// senders drop along with the loop.
    async fn disconnect(&mut self, reason: Option<String>) {
        self.state.connected.store(false, Ordering::Release);
        let event = self.session.on_disconnect(reason);
        if self.event_tx.send(event).await.is_err() {
            debug!("event channel closed, receiver dropped");
        }
    }
}

async fn send_frame(transport: &mut impl Transport, frame: &OutboundFrame) -> Result<()> {
    let json = frame.to_json()?;
    transport.send(json).await
}

/// Push an event without blocking; a full channel drops it with a warning.
fn emit_event(event_tx: &mpsc::Sender<BattleEvent>, event: BattleEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new("b1");
        assert_eq!(config.battle_id, "b1");
        assert!(config.token.is_none());
        assert!(config.player_name.is_none());
        assert_eq!(config.ack_timeout, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.notify, NotifyConfig::default());
        assert_eq!(config.windows, DedupWindows::default());
    }

    #[test]
    fn event_channel_capacity_is_clamped_to_one() {
        let config = ClientConfig::new("b1").with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn builder_sets_credentials() {
        let config = ClientConfig::new("b1")
            .with_token("t")
            .with_player_name("Harry")
            .with_ack_timeout(Duration::from_millis(5));
        assert_eq!(config.token.as_deref(), Some("t"));
        assert_eq!(config.player_name.as_deref(), Some("Harry"));
        assert_eq!(config.ack_timeout, Duration::from_millis(5));
    }
}
