//! The per-connection reducer over inbound battle events.
//!
//! [`BattleSession`] owns every piece of mutable reconciliation state: the
//! viewer's identity, the latest canonical [`BattleState`], the dedup gates,
//! the notifier's cooldown, the display countdown and the action gate.
//! [`BattleSession::handle`] consumes one [`ServerMessage`] and returns the
//! [`BattleEvent`]s it produced, in order.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::dedup::{DedupWindows, DeliveryGate};
use crate::event::{BattleEvent, ChatLine, LogEntry};
use crate::notify::{DispatchOutcome, LogCategory, Notifier};
use crate::protocol::{AuthPayload, ServerMessage};
use crate::snapshot::{normalize_raw, BattleState, ItemKind, RawSnapshot, Status};
use crate::team::resolve_team;
use crate::timer::TimerSync;
use crate::turn::{is_my_turn, ActionGate};

/// Chat sender name used when nothing better is known.
pub const DEFAULT_CHAT_NAME: &str = "전투 참가자";

/// Reconciliation state for one battle connection.
pub struct BattleSession {
    clock: SharedClock,
    identity: Option<String>,
    auth_name: Option<String>,
    state: Option<BattleState>,
    gate: DeliveryGate,
    notifier: Notifier,
    timer: TimerSync,
    actions: ActionGate,
    ended: bool,
    end_announced: bool,
}

impl BattleSession {
    pub fn new(notifier: Notifier, windows: DedupWindows, clock: SharedClock) -> Self {
        Self {
            clock,
            identity: None,
            auth_name: None,
            state: None,
            gate: DeliveryGate::new(windows),
            notifier,
            timer: TimerSync::new(),
            actions: ActionGate::new(),
            ended: false,
            end_announced: false,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Latest accepted canonical state.
    pub fn state(&self) -> Option<&BattleState> {
        self.state.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn my_turn(&self) -> bool {
        match &self.state {
            Some(state) if !self.ended => is_my_turn(state, self.identity()),
            _ => false,
        }
    }

    pub fn can_act(&self) -> bool {
        match &self.state {
            Some(state) if !self.ended => self.actions.can_act(state, self.identity()),
            _ => false,
        }
    }

    pub fn can_use_item(&self, kind: ItemKind) -> bool {
        match &self.state {
            Some(state) if !self.ended => {
                self.actions.can_use_item(state, self.identity(), kind)
            }
            _ => false,
        }
    }

    /// Subscribe to the display countdown.
    pub fn countdown(&self) -> watch::Receiver<u32> {
        self.timer.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    /// Name to sign chat lines with: roster name, then the name the server
    /// confirmed at authentication, then `fallback`.
    pub fn chat_name(&self, fallback: Option<&str>) -> String {
        let roster = self
            .identity()
            .and_then(|id| self.state.as_ref()?.player(id))
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty());
        roster
            .or(self.auth_name.as_deref())
            .or(fallback)
            .unwrap_or(DEFAULT_CHAT_NAME)
            .to_string()
    }

    // ── Inbound events ──────────────────────────────────────────────

    /// Reduce one inbound message.
    pub fn handle(&mut self, msg: ServerMessage) -> Vec<BattleEvent> {
        match msg {
            ServerMessage::BattleUpdate(raw) => self.on_snapshot(&raw),
            ServerMessage::TurnStart(payload) => {
                if self.ended {
                    return Vec::new();
                }
                let now = self.clock.now();
                let outcome =
                    self.notifier
                        .on_turn_start(payload.player_id(), self.identity.as_deref(), now);
                alerts(outcome)
            }
            ServerMessage::BattleStarted(payload) => {
                let now = self.clock.now();
                info!(battle_id = ?payload.battle_id(), "battle started");
                let outcome = self.notifier.on_battle_started(
                    payload.message.as_deref(),
                    payload.battle_id(),
                    now,
                );
                alerts(Some(outcome))
            }
            ServerMessage::BattleEnded(payload) => {
                if self.end_announced {
                    debug!("repeated battle end ignored");
                    return Vec::new();
                }
                self.end_announced = true;
                self.finish();
                let now = self.clock.now();
                let winner = payload.winner.as_deref().and_then(resolve_team);
                info!(?winner, "battle ended");
                let outcome = self.notifier.on_battle_ended(
                    payload.winner.as_deref(),
                    payload.message.as_deref(),
                    now,
                );
                let mut events = alerts(Some(outcome));
                events.push(BattleEvent::BattleEnded { winner });
                events
            }
            ServerMessage::Log(payload) => {
                let now = self.clock.now();
                let message = payload.message.as_deref().unwrap_or_default();
                if !self.gate.admit_log(message, now) {
                    return Vec::new();
                }
                let mut events = vec![BattleEvent::Log(LogEntry::from(&payload))];
                let category = LogCategory::from_wire(payload.kind.as_deref().unwrap_or_default());
                events.extend(alerts(self.notifier.on_log(category, message, now)));
                events
            }
            ServerMessage::Chat(payload) => {
                let now = self.clock.now();
                let sender = payload.name.as_deref().unwrap_or_default();
                let message = payload.message.as_deref().unwrap_or_default();
                if !self.gate.admit_chat(sender, message, now) {
                    return Vec::new();
                }
                vec![BattleEvent::Chat(ChatLine::from(&payload))]
            }
            ServerMessage::AuthSuccess(auth) => self.on_auth(&auth),
            ServerMessage::AuthError(payload) => {
                warn!(reason = payload.reason(), "authentication rejected");
                vec![BattleEvent::AuthFailed {
                    reason: payload.reason().to_string(),
                }]
            }
            ServerMessage::ActionSuccess => {
                if !self.actions.is_locked() {
                    self.actions.lock(self.state.as_ref());
                }
                vec![BattleEvent::ActionAccepted, self.controls()]
            }
            ServerMessage::ActionError(payload) => {
                debug!(reason = payload.reason(), "action rejected");
                self.actions.release();
                vec![
                    BattleEvent::ActionRejected {
                        reason: payload.reason().to_string(),
                    },
                    self.controls(),
                ]
            }
            ServerMessage::Ack(ack) => {
                debug!(ack_id = ?ack.ack_id, "unmatched acknowledgment ignored");
                Vec::new()
            }
            ServerMessage::Unknown => Vec::new(),
        }
    }

    /// Apply an authentication result, from either an `auth:success` event or
    /// the `playerAuth` acknowledgment.
    pub fn on_auth(&mut self, auth: &AuthPayload) -> Vec<BattleEvent> {
        if !auth.ok {
            debug!("authentication payload reported failure");
            return Vec::new();
        }
        if let Some(name) = auth.player_name() {
            self.auth_name = Some(name.to_string());
        }
        let Some(id) = auth.player_id() else {
            debug!("authentication payload without player id");
            return Vec::new();
        };
        match self.identity.as_deref() {
            None => {
                info!(player_id = id, "identity confirmed");
                self.identity = Some(id.to_string());
                let mut events = vec![BattleEvent::IdentityConfirmed {
                    player_id: id.to_string(),
                }];
                if self.state.is_some() {
                    events.push(self.controls());
                }
                events
            }
            Some(current) if current == id => Vec::new(),
            Some(current) => {
                warn!(current, ignored = id, "identity already set; ignoring new id");
                Vec::new()
            }
        }
    }

    fn on_snapshot(&mut self, raw: &RawSnapshot) -> Vec<BattleEvent> {
        let now = self.clock.now();
        if !self.gate.admit_snapshot(now) {
            return Vec::new();
        }
        if raw.battle_id().is_none() {
            debug!("snapshot without battle id dropped");
            return Vec::new();
        }

        let mut state = normalize_raw(raw);
        if self.ended {
            // A late frame cannot reopen a finished battle.
            state.status = Status::Ended;
        }

        if state.status == Status::Ended {
            self.state = Some(state);
            self.finish();
        } else {
            self.actions.observe(&state);
            self.timer.sync(
                i64::from(state.current_turn.time_left_sec),
                &state.current_turn.phase,
            );
            self.state = Some(state);
        }

        let mut events = Vec::new();
        if let Some(state) = &self.state {
            events.push(BattleEvent::StateUpdated {
                state: Box::new(state.clone()),
                my_turn: self.my_turn(),
                can_act: self.can_act(),
            });
            let outcomes = self.notifier.on_snapshot(state, self.identity.as_deref(), now);
            events.extend(outcomes.into_iter().filter_map(delivered));
        }
        events
    }

    // ── Outbound bookkeeping ────────────────────────────────────────

    /// An action was submitted: lock the controls.
    pub fn action_submitted(&mut self) -> BattleEvent {
        self.actions.lock(self.state.as_ref());
        self.controls()
    }

    /// The action's acknowledgment resolved. Anything but success reopens the
    /// controls.
    pub fn action_resolved(&mut self, ok: bool) -> Option<BattleEvent> {
        if ok || self.ended {
            return None;
        }
        self.actions.release();
        Some(self.controls())
    }

    /// The connection dropped.
    pub fn on_disconnect(&mut self, reason: Option<String>) -> BattleEvent {
        self.timer.cancel();
        BattleEvent::Disconnected { reason }
    }

    fn finish(&mut self) {
        if !self.ended {
            debug!("battle finished; countdown stopped and actions locked");
        }
        self.ended = true;
        self.timer.cancel();
        self.actions.lock(self.state.as_ref());
        if let Some(state) = &mut self.state {
            state.status = Status::Ended;
        }
    }

    fn controls(&self) -> BattleEvent {
        BattleEvent::ControlsChanged {
            can_act: self.can_act(),
        }
    }
}

impl Default for BattleSession {
    fn default() -> Self {
        Self::new(
            Notifier::default(),
            DedupWindows::default(),
            Arc::new(SystemClock),
        )
    }
}

impl std::fmt::Debug for BattleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("identity", &self.identity)
            .field("has_state", &self.state.is_some())
            .field("ended", &self.ended)
            .field("notifier", &self.notifier)
            .finish()
    }
}

fn delivered(outcome: DispatchOutcome) -> Option<BattleEvent> {
    match outcome {
        DispatchOutcome::Delivered(alert) => Some(BattleEvent::Alert(alert)),
        _ => None,
    }
}

fn alerts(outcome: Option<DispatchOutcome>) -> Vec<BattleEvent> {
    outcome.and_then(delivered).into_iter().collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::notify::{AlertKind, NotifyConfig};
    use crate::protocol::{EventName, ServerMessage};
    use crate::team::Team;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn session() -> (BattleSession, ManualClock) {
        let clock = ManualClock::new();
        let session = BattleSession::new(
            Notifier::new(NotifyConfig::new()),
            DedupWindows::default(),
            Arc::new(clock.clone()),
        );
        (session, clock)
    }

    fn msg(event: EventName, data: Value) -> ServerMessage {
        ServerMessage::from_parts(event, data)
    }

    fn auth(session: &mut BattleSession, id: &str) {
        session.handle(msg(EventName::AuthSuccess, json!({"playerId": id})));
    }

    async fn tick() {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    fn my_turn_snapshot() -> Value {
        json!({
            "id": "b1",
            "status": "active",
            "players": [
                {"id": "p1", "name": "Harry", "team": "A", "hp": 50, "maxHp": 100},
                {"id": "p2", "name": "Draco", "team": "B", "hp": 60, "maxHp": 100}
            ],
            "currentTurn": {"playerId": "p1", "timeLeftSec": 30, "turnNumber": 1}
        })
    }

    fn alert_kinds(events: &[BattleEvent]) -> Vec<AlertKind> {
        events
            .iter()
            .filter_map(|e| match e {
                BattleEvent::Alert(a) => Some(a.kind),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn my_turn_snapshot_yields_turn_alert_once_cooldown_allows() {
        let (mut s, clock) = session();
        auth(&mut s, "p1");

        // Seed the status so only the turn alert is in play.
        s.notifier_mut()
            .on_battle_started(None, Some("b1"), clock.now());
        clock.advance_ms(2000);

        let events = s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert!(matches!(
            events[0],
            BattleEvent::StateUpdated { my_turn: true, can_act: true, .. }
        ));
        assert_eq!(alert_kinds(&events), vec![AlertKind::YourTurn]);
    }

    #[tokio::test]
    async fn status_transition_and_turn_alert_dispatch_once() {
        let (mut s, _clock) = session();
        auth(&mut s, "p1");
        let events = s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert_eq!(
            alert_kinds(&events),
            vec![AlertKind::StatusChanged(Status::Active)]
        );
    }

    #[tokio::test]
    async fn repeated_active_updates_fire_start_alert_once() {
        let (mut s, clock) = session();
        let snapshot = json!({"id": "b1", "status": "active"});
        let mut fired = 0;
        for _ in 0..4 {
            let events = s.handle(msg(EventName::BattleUpdate, snapshot.clone()));
            fired += alert_kinds(&events)
                .iter()
                .filter(|k| **k == AlertKind::StatusChanged(Status::Active))
                .count();
            clock.advance_ms(3000);
        }
        assert_eq!(fired, 1);
    }

    #[tokio::test]
    async fn snapshot_burst_is_rate_limited() {
        let (mut s, clock) = session();
        assert!(!s
            .handle(msg(EventName::BattleUpdate, my_turn_snapshot()))
            .is_empty());
        clock.advance_ms(50);
        assert!(s
            .handle(msg(EventName::BattleUpdate, my_turn_snapshot()))
            .is_empty());
        clock.advance_ms(60);
        assert!(!s
            .handle(msg(EventName::BattleUpdate, my_turn_snapshot()))
            .is_empty());
    }

    #[tokio::test]
    async fn snapshot_without_id_is_dropped() {
        let (mut s, _clock) = session();
        let events = s.handle(msg(EventName::BattleUpdate, json!({"status": "active"})));
        assert!(events.is_empty());
        assert!(s.state().is_none());
    }

    #[tokio::test]
    async fn duplicate_logs_inside_window_show_once() {
        let (mut s, clock) = session();
        let log = json!({"type": "battle", "message": "라운드 1"});
        let count = |events: Vec<BattleEvent>| {
            events
                .iter()
                .filter(|e| matches!(e, BattleEvent::Log(_)))
                .count()
        };

        assert_eq!(count(s.handle(msg(EventName::Log, log.clone()))), 1);
        clock.advance_ms(500);
        assert_eq!(count(s.handle(msg(EventName::Log, log.clone()))), 0);
        clock.advance_ms(1000);
        assert_eq!(count(s.handle(msg(EventName::Log, log))), 1);
    }

    #[tokio::test]
    async fn duplicate_chat_is_suppressed_per_sender() {
        let (mut s, clock) = session();
        let chat = json!({"name": "Ron", "message": "go"});
        assert_eq!(s.handle(msg(EventName::Chat, chat.clone())).len(), 1);
        clock.advance_ms(200);
        assert!(s.handle(msg(EventName::Chat, chat)).is_empty());
        let other = s.handle(msg(EventName::Chat, json!({"message": "go"})));
        assert_eq!(
            other,
            vec![BattleEvent::Chat(ChatLine {
                sender: "익명".into(),
                message: "go".into()
            })]
        );
    }

    #[tokio::test]
    async fn identity_is_set_once() {
        let (mut s, _clock) = session();
        let events = s.handle(msg(EventName::AuthSuccess, json!({"player": {"id": "p1"}})));
        assert_eq!(
            events,
            vec![BattleEvent::IdentityConfirmed {
                player_id: "p1".into()
            }]
        );
        assert!(s
            .handle(msg(EventName::AuthSuccess, json!({"playerId": "p9"})))
            .is_empty());
        assert_eq!(s.identity(), Some("p1"));
    }

    #[tokio::test]
    async fn failed_auth_payload_does_not_set_identity() {
        let (mut s, _clock) = session();
        s.handle(msg(EventName::AuthSuccess, json!({"ok": false, "playerId": "p1"})));
        assert_eq!(s.identity(), None);

        let events = s.handle(msg(EventName::AuthError, json!({})));
        assert_eq!(
            events,
            vec![BattleEvent::AuthFailed {
                reason: "알 수 없는 오류".into()
            }]
        );
    }

    #[tokio::test]
    async fn action_success_locks_until_next_turn_window() {
        let (mut s, clock) = session();
        auth(&mut s, "p1");
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert!(s.can_act());

        s.action_submitted();
        let events = s.handle(msg(EventName::ActionSuccess, json!({})));
        assert_eq!(events[1], BattleEvent::ControlsChanged { can_act: false });

        clock.advance_ms(200);
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert!(!s.can_act());

        clock.advance_ms(200);
        let mut next = my_turn_snapshot();
        next["currentTurn"]["turnNumber"] = json!(2);
        s.handle(msg(EventName::BattleUpdate, next));
        assert!(s.can_act());
    }

    #[tokio::test]
    async fn action_error_reopens_controls() {
        let (mut s, _clock) = session();
        auth(&mut s, "p1");
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        s.action_submitted();
        assert!(!s.can_act());

        let events = s.handle(msg(EventName::ActionError, json!({"error": "쿨다운"})));
        assert_eq!(
            events[0],
            BattleEvent::ActionRejected {
                reason: "쿨다운".into()
            }
        );
        assert!(s.can_act());
    }

    #[tokio::test]
    async fn negative_ack_reopens_controls() {
        let (mut s, _clock) = session();
        auth(&mut s, "p1");
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        s.action_submitted();
        assert_eq!(s.action_resolved(true), None);
        assert_eq!(
            s.action_resolved(false),
            Some(BattleEvent::ControlsChanged { can_act: true })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn battle_end_stops_turns_and_countdown() {
        let (mut s, clock) = session();
        auth(&mut s, "p1");
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert_eq!(*s.countdown().borrow(), 30);

        let events = s.handle(msg(EventName::BattleEnded, json!({"winner": "불사조 기사단"})));
        assert_eq!(
            events.last(),
            Some(&BattleEvent::BattleEnded {
                winner: Some(Team::A)
            })
        );
        assert!(s.is_ended());
        assert!(!s.my_turn());

        // The other spelling of the same event is not announced again.
        assert!(s
            .handle(msg(EventName::BattleEnded, json!({"winner": "A"})))
            .is_empty());

        // A stale active frame cannot reopen the battle.
        clock.advance_ms(5000);
        let events = s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert!(matches!(
            events[0],
            BattleEvent::StateUpdated { my_turn: false, can_act: false, .. }
        ));
        assert!(alert_kinds(&events).is_empty());
        assert!(s
            .handle(msg(EventName::TurnStart, json!({"playerId": "p1"})))
            .is_empty());

        tokio::time::advance(std::time::Duration::from_secs(3)).await;
        assert_eq!(*s.countdown().borrow(), 30);
    }

    #[tokio::test]
    async fn ended_snapshot_finishes_the_battle() {
        let (mut s, _clock) = session();
        auth(&mut s, "p1");
        let mut ended = my_turn_snapshot();
        ended["status"] = json!("ended");
        s.handle(msg(EventName::BattleUpdate, ended));
        assert!(s.is_ended());
        assert!(!s.can_act());

        // battle:ended still announces the winner once.
        let events = s.handle(msg(EventName::BattleEnded, json!({"winner": "death_eaters"})));
        assert_eq!(
            events.last(),
            Some(&BattleEvent::BattleEnded {
                winner: Some(Team::B)
            })
        );
    }

    #[tokio::test]
    async fn chat_name_prefers_roster() {
        let (mut s, _clock) = session();
        assert_eq!(s.chat_name(None), DEFAULT_CHAT_NAME);
        assert_eq!(s.chat_name(Some("Guest")), "Guest");
        auth(&mut s, "p1");
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));
        assert_eq!(s.chat_name(Some("Guest")), "Harry");
    }

    #[tokio::test]
    async fn routine_system_log_is_shown_but_not_alerted() {
        let (mut s, _clock) = session();
        let events = s.handle(msg(
            EventName::Log,
            json!({"type": "system", "message": "관리자 접속"}),
        ));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], BattleEvent::Log(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_countdown() {
        let (mut s, _clock) = session();
        let countdown = s.countdown();
        s.handle(msg(EventName::BattleUpdate, my_turn_snapshot()));

        tick().await;
        let before = *countdown.borrow();
        assert!(before > 0);

        let event = s.on_disconnect(Some("gone".into()));
        assert_eq!(
            event,
            BattleEvent::Disconnected {
                reason: Some("gone".into())
            }
        );

        for _ in 0..3 {
            tick().await;
        }
        assert_eq!(*countdown.borrow(), before);
    }

    #[test]
    fn snapshot_reduces_without_a_runtime() {
        let mut s = BattleSession::default();
        let events = s.handle(msg(
            EventName::BattleUpdate,
            json!({"id": "b1", "status": "active", "currentTurn": {"timeLeftSec": 10}}),
        ));
        assert!(matches!(events.first(), Some(BattleEvent::StateUpdated { .. })));
        assert_eq!(*s.countdown().borrow(), 10);
    }
}
