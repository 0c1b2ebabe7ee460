//! Alert throttling and dispatch.
//!
//! [`Notifier`] turns semantic battle moments (status changes, "your turn",
//! combat log lines) into user-visible [`Alert`]s. All alert kinds share one
//! cooldown stamp, so a burst of different alerts still throttles as a single
//! stream. Delivery goes to two optional side channels (visual and audio);
//! either may be missing or fail, and failures are swallowed.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::snapshot::{BattleState, Status};
use crate::team::{resolve_team, Team};

/// Cooldown for "your turn" derived from a snapshot update.
pub const UPDATE_TURN_COOLDOWN: Duration = Duration::from_millis(1500);
/// Cooldown for an explicit turn-start event.
pub const TURN_START_COOLDOWN: Duration = Duration::from_millis(800);
/// Cooldown for combat log alerts.
pub const COMBAT_LOG_COOLDOWN: Duration = Duration::from_millis(600);
/// Cooldown for system log alerts.
pub const SYSTEM_LOG_COOLDOWN: Duration = Duration::from_millis(800);

const DEFAULT_VOLUME: f64 = 0.6;
const DEFAULT_TITLE_PREFIX: &str = "PYXIS";

/// System log fragments that are routine connection chatter.
const ROUTINE_SYSTEM_MARKERS: &[&str] = &["연결되었습니다", "접속"];

/// Clamp a volume into `0.0..=1.0`; non-finite input becomes `0.0`.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// User-facing notification settings. Every field can change mid-session.
///
/// ```
/// use battle_sync_client::notify::NotifyConfig;
///
/// let config = NotifyConfig::new().with_volume(3.0).with_background_only(false);
/// assert_eq!(config.volume, 1.0);
/// assert!(!config.background_only);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Audio cue volume in `0.0..=1.0`.
    pub volume: f64,
    /// Only alert while the viewing surface is in the background.
    pub background_only: bool,
    /// Prefix prepended to every alert title.
    pub title_prefix: String,
}

impl NotifyConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            volume: DEFAULT_VOLUME,
            background_only: true,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Values outside `0.0..=1.0` are clamped.
    #[must_use]
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = clamp_volume(volume);
        self
    }

    #[must_use]
    pub fn with_background_only(mut self, background_only: bool) -> Self {
        self.background_only = background_only;
        self
    }

    #[must_use]
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = prefix.into();
        self
    }

    fn format_title(&self, title: &str) -> String {
        let title = title.trim();
        if title.is_empty() {
            self.title_prefix.clone()
        } else {
            format!("{} · {}", self.title_prefix, title)
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Alerts ──────────────────────────────────────────────────────────

/// Category of a `battle:log` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Attack,
    Defend,
    Evade,
    Cheer,
    System,
    Other,
}

impl LogCategory {
    pub fn from_wire(raw: &str) -> LogCategory {
        match raw.trim().to_lowercase().as_str() {
            "attack" => LogCategory::Attack,
            "defend" | "defense" => LogCategory::Defend,
            "evade" | "dodge" => LogCategory::Evade,
            "cheer" => LogCategory::Cheer,
            "system" => LogCategory::System,
            _ => LogCategory::Other,
        }
    }

    fn alert_title(self) -> Option<&'static str> {
        match self {
            LogCategory::Attack => Some("공격"),
            LogCategory::Defend => Some("방어"),
            LogCategory::Evade => Some("회피"),
            LogCategory::Cheer => Some("응원"),
            LogCategory::System => Some("알림"),
            LogCategory::Other => None,
        }
    }

    fn cooldown(self) -> Duration {
        match self {
            LogCategory::System => SYSTEM_LOG_COOLDOWN,
            _ => COMBAT_LOG_COOLDOWN,
        }
    }
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    StatusChanged(Status),
    YourTurn,
    BattleStarted,
    BattleEnded { winner: Option<Team> },
    Log(LogCategory),
}

/// A user-visible alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
}

/// Why a side channel could not deliver.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel unavailable")]
    Unavailable,
    #[error("permission denied")]
    PermissionDenied,
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// A place alerts can be sent: a desktop notification, a sound, a toast.
pub trait AlertChannel: Send {
    /// Deliver one alert. Errors are logged and ignored by the caller.
    fn deliver(&mut self, alert: &Alert, config: &NotifyConfig) -> Result<(), ChannelError>;
}

/// Result of one alert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Passed the cooldown and was handed to the side channels.
    Delivered(Alert),
    /// Passed the cooldown, but settings kept it off the side channels.
    Muted(Alert),
    /// Dropped inside the shared cooldown window.
    Throttled,
    /// Routine message not worth alerting on.
    Filtered,
}

impl DispatchOutcome {
    pub fn delivered(&self) -> Option<&Alert> {
        match self {
            DispatchOutcome::Delivered(alert) => Some(alert),
            _ => None,
        }
    }
}

// ── Notifier ────────────────────────────────────────────────────────

/// Bookkeeping kept across the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    pub last_battle_id: Option<String>,
    pub last_status: Option<Status>,
    pub last_current_player_id: Option<String>,
    pub last_shown_at: Option<Instant>,
}

/// Edge-triggered status alerts plus the shared alert cooldown.
pub struct Notifier {
    config: NotifyConfig,
    state: NotificationState,
    foreground_active: bool,
    visual: Option<Box<dyn AlertChannel>>,
    audio: Option<Box<dyn AlertChannel>>,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            state: NotificationState::default(),
            foreground_active: false,
            visual: None,
            audio: None,
        }
    }

    #[must_use]
    pub fn with_visual(mut self, channel: Box<dyn AlertChannel>) -> Self {
        self.visual = Some(channel);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, channel: Box<dyn AlertChannel>) -> Self {
        self.audio = Some(channel);
        self
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.config.volume = clamp_volume(volume);
    }

    pub fn set_background_only(&mut self, background_only: bool) {
        self.config.background_only = background_only;
    }

    /// Tell the notifier whether the viewing surface is in the foreground.
    pub fn set_foreground_active(&mut self, active: bool) {
        self.foreground_active = active;
    }

    /// React to a normalized snapshot: status edge, then "your turn".
    pub fn on_snapshot(
        &mut self,
        battle: &BattleState,
        my_id: Option<&str>,
        now: Instant,
    ) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();

        if self.state.last_status != Some(battle.status) {
            let (title, body) = status_text(battle.status);
            outcomes.push(self.attempt(
                AlertKind::StatusChanged(battle.status),
                title,
                body,
                Duration::ZERO,
                now,
            ));
        }

        // The normalized current player is authoritative, not the raw payload fields.
        let current_id = battle
            .current_turn
            .current_player
            .as_ref()
            .map(|p| p.id.clone());
        let mine = matches!((my_id, current_id.as_deref()), (Some(me), Some(cur)) if me == cur);
        if mine && battle.status != Status::Ended {
            outcomes.push(self.your_turn(UPDATE_TURN_COOLDOWN, now));
        }

        self.state.last_battle_id = battle.id.clone();
        self.state.last_status = Some(battle.status);
        self.state.last_current_player_id = current_id;
        outcomes
    }

    /// React to an explicit turn-start event.
    pub fn on_turn_start(
        &mut self,
        player_id: Option<&str>,
        my_id: Option<&str>,
        now: Instant,
    ) -> Option<DispatchOutcome> {
        match (player_id, my_id) {
            (Some(pid), Some(me)) if pid == me => Some(self.your_turn(TURN_START_COOLDOWN, now)),
            _ => None,
        }
    }

    /// The server announced the battle start.
    pub fn on_battle_started(
        &mut self,
        message: Option<&str>,
        battle_id: Option<&str>,
        now: Instant,
    ) -> DispatchOutcome {
        let body = message.unwrap_or("전투가 시작되었습니다.");
        let outcome = self.attempt(AlertKind::BattleStarted, "전투 시작", body, Duration::ZERO, now);
        if let Some(id) = battle_id {
            self.state.last_battle_id = Some(id.to_string());
            self.state.last_status = Some(Status::Active);
        }
        outcome
    }

    /// The server announced the battle end.
    pub fn on_battle_ended(
        &mut self,
        winner: Option<&str>,
        message: Option<&str>,
        now: Instant,
    ) -> DispatchOutcome {
        let winner = winner.and_then(resolve_team);
        let body = match (message, winner) {
            (Some(message), _) => message.to_string(),
            (None, Some(team)) => format!("{}팀의 승리입니다.", team.code()),
            (None, None) => "전투가 종료되었습니다.".to_string(),
        };
        let outcome = self.attempt(
            AlertKind::BattleEnded { winner },
            "전투 종료",
            &body,
            Duration::ZERO,
            now,
        );
        self.state.last_status = Some(Status::Ended);
        outcome
    }

    /// React to a log line. Uncategorised lines never alert.
    pub fn on_log(
        &mut self,
        category: LogCategory,
        message: &str,
        now: Instant,
    ) -> Option<DispatchOutcome> {
        if message.is_empty() {
            return None;
        }
        let title = category.alert_title()?;
        if category == LogCategory::System && is_routine_system_message(message) {
            debug!(message, "routine system message not alerted");
            return Some(DispatchOutcome::Filtered);
        }
        Some(self.attempt(
            AlertKind::Log(category),
            title,
            message,
            category.cooldown(),
            now,
        ))
    }

    fn your_turn(&mut self, cooldown: Duration, now: Instant) -> DispatchOutcome {
        self.attempt(
            AlertKind::YourTurn,
            "당신의 턴입니다",
            "지금 행동하세요.",
            cooldown,
            now,
        )
    }

    /// Run an alert through the shared cooldown and, if it passes, the side
    /// channels.
    fn attempt(
        &mut self,
        kind: AlertKind,
        title: &str,
        body: &str,
        cooldown: Duration,
        now: Instant,
    ) -> DispatchOutcome {
        if let Some(last) = self.state.last_shown_at {
            if now.saturating_duration_since(last) < cooldown {
                debug!(?kind, "alert throttled by cooldown");
                return DispatchOutcome::Throttled;
            }
        }
        self.state.last_shown_at = Some(now);

        let alert = Alert {
            kind,
            title: self.config.format_title(title),
            body: body.to_string(),
        };

        if !self.config.enabled || (self.config.background_only && self.foreground_active) {
            debug!(?kind, "alert muted by settings");
            return DispatchOutcome::Muted(alert);
        }

        for channel in [self.visual.as_mut(), self.audio.as_mut()].into_iter().flatten() {
            if let Err(e) = channel.deliver(&alert, &self.config) {
                debug!(error = %e, "alert channel failed");
            }
        }
        DispatchOutcome::Delivered(alert)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NotifyConfig::default())
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("foreground_active", &self.foreground_active)
            .field("has_visual", &self.visual.is_some())
            .field("has_audio", &self.audio.is_some())
            .finish()
    }
}

fn status_text(status: Status) -> (&'static str, &'static str) {
    match status {
        Status::Active => ("전투 시작", "전투가 시작되었습니다."),
        Status::Paused => ("일시정지", "전투가 일시정지되었습니다."),
        Status::Ended => ("전투 종료", "전투가 종료되었습니다."),
        Status::Waiting => ("대기", "전투가 곧 시작됩니다."),
    }
}

/// Connection chatter that should not raise an alert.
pub fn is_routine_system_message(message: &str) -> bool {
    let m = message.to_lowercase();
    m.is_empty() || ROUTINE_SYSTEM_MARKERS.iter().any(|marker| m.contains(marker))
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
    use crate::snapshot::normalize;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<Alert>>>);

    impl AlertChannel for Recorder {
        fn deliver(&mut self, alert: &Alert, _config: &NotifyConfig) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct Broken;

    impl AlertChannel for Broken {
        fn deliver(&mut self, _alert: &Alert, _config: &NotifyConfig) -> Result<(), ChannelError> {
            Err(ChannelError::PermissionDenied)
        }
    }

    fn ms(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn active_my_turn() -> BattleState {
        normalize(&json!({
            "id": "b1",
            "status": "active",
            "players": [{"id": "p1", "team": "A", "hp": 50, "maxHp": 100}],
            "currentTurn": {"playerId": "p1"}
        }))
    }

    #[test]
    fn status_edge_fires_once_for_repeated_status() {
        let t0 = Instant::now();
        let mut n = Notifier::default();
        let state = normalize(&json!({"id": "b1", "status": "active"}));

        let first = n.on_snapshot(&state, None, t0);
        assert!(matches!(
            first.as_slice(),
            [DispatchOutcome::Delivered(Alert {
                kind: AlertKind::StatusChanged(Status::Active),
                ..
            })]
        ));
        for i in 1..5 {
            assert!(n.on_snapshot(&state, None, ms(t0, i * 5000)).is_empty());
        }
    }

    #[test]
    fn first_observation_fires_even_for_waiting() {
        let mut n = Notifier::default();
        let outcomes = n.on_snapshot(&normalize(&json!({})), None, Instant::now());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].delivered().unwrap().kind,
            AlertKind::StatusChanged(Status::Waiting)
        );
    }

    #[test]
    fn status_change_and_turn_alert_throttle_as_one_stream() {
        let mut n = Notifier::default();
        let outcomes = n.on_snapshot(&active_my_turn(), Some("p1"), Instant::now());
        let delivered: Vec<_> = outcomes.iter().filter_map(DispatchOutcome::delivered).collect();
        assert_eq!(delivered.len(), 1);
        assert_eq!(outcomes[1], DispatchOutcome::Throttled);
    }

    #[test]
    fn turn_alert_respects_update_cooldown() {
        let t0 = Instant::now();
        let mut n = Notifier::default();
        n.on_snapshot(&active_my_turn(), Some("p1"), t0);

        let again = n.on_snapshot(&active_my_turn(), Some("p1"), ms(t0, 1000));
        assert_eq!(again, vec![DispatchOutcome::Throttled]);

        let later = n.on_snapshot(&active_my_turn(), Some("p1"), ms(t0, 1600));
        assert_eq!(later[0].delivered().unwrap().kind, AlertKind::YourTurn);
    }

    #[test]
    fn turn_start_uses_shorter_cooldown() {
        let t0 = Instant::now();
        let mut n = Notifier::default();
        assert!(n.on_turn_start(Some("p1"), Some("p1"), t0).unwrap().delivered().is_some());
        assert_eq!(
            n.on_turn_start(Some("p1"), Some("p1"), ms(t0, 700)),
            Some(DispatchOutcome::Throttled)
        );
        assert!(n
            .on_turn_start(Some("p1"), Some("p1"), ms(t0, 800))
            .unwrap()
            .delivered()
            .is_some());
        assert_eq!(n.on_turn_start(Some("p2"), Some("p1"), ms(t0, 5000)), None);
        assert_eq!(n.on_turn_start(Some("p1"), None, ms(t0, 5000)), None);
    }

    #[test]
    fn cooldown_is_shared_across_categories() {
        let t0 = Instant::now();
        let mut n = Notifier::default();
        assert!(n.on_log(LogCategory::Attack, "hit", t0).unwrap().delivered().is_some());
        assert_eq!(
            n.on_turn_start(Some("p1"), Some("p1"), ms(t0, 500)),
            Some(DispatchOutcome::Throttled)
        );
        assert_eq!(
            n.on_log(LogCategory::Defend, "block", ms(t0, 550)),
            Some(DispatchOutcome::Throttled)
        );
        assert!(n
            .on_log(LogCategory::Evade, "dodge", ms(t0, 600))
            .unwrap()
            .delivered()
            .is_some());
    }

    #[test]
    fn routine_system_messages_are_filtered() {
        let mut n = Notifier::default();
        let t0 = Instant::now();
        assert_eq!(
            n.on_log(LogCategory::System, "서버에 연결되었습니다", t0),
            Some(DispatchOutcome::Filtered)
        );
        assert_eq!(
            n.on_log(LogCategory::System, "관전자 접속", t0),
            Some(DispatchOutcome::Filtered)
        );
        let outcome = n.on_log(LogCategory::System, "라운드 3 시작", t0).unwrap();
        assert_eq!(outcome.delivered().unwrap().title, "PYXIS · 알림");
    }

    #[test]
    fn uncategorised_and_empty_logs_never_alert() {
        let mut n = Notifier::default();
        assert_eq!(n.on_log(LogCategory::Other, "whatever", Instant::now()), None);
        assert_eq!(n.on_log(LogCategory::Attack, "", Instant::now()), None);
    }

    #[test]
    fn log_category_aliases() {
        assert_eq!(LogCategory::from_wire("DEFENSE"), LogCategory::Defend);
        assert_eq!(LogCategory::from_wire("dodge"), LogCategory::Evade);
        assert_eq!(LogCategory::from_wire("round"), LogCategory::Other);
    }

    #[test]
    fn battle_started_seeds_status_so_update_does_not_refire() {
        let t0 = Instant::now();
        let mut n = Notifier::default();
        let started = n.on_battle_started(None, Some("b1"), t0);
        assert_eq!(started.delivered().unwrap().body, "전투가 시작되었습니다.");
        let state = normalize(&json!({"id": "b1", "status": "active"}));
        assert!(n.on_snapshot(&state, None, ms(t0, 5000)).is_empty());
    }

    #[test]
    fn battle_ended_message_uses_resolved_winner() {
        let mut n = Notifier::default();
        let outcome = n.on_battle_ended(Some("phoenix"), None, Instant::now());
        let alert = outcome.delivered().unwrap();
        assert_eq!(alert.body, "A팀의 승리입니다.");
        assert_eq!(alert.kind, AlertKind::BattleEnded { winner: Some(Team::A) });

        let mut n = Notifier::default();
        let outcome = n.on_battle_ended(Some("draw"), None, Instant::now());
        assert_eq!(outcome.delivered().unwrap().body, "전투가 종료되었습니다.");
        assert_eq!(n.state().last_status, Some(Status::Ended));
    }

    #[test]
    fn foreground_mutes_unless_always_alert() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut n = Notifier::default().with_visual(Box::new(Recorder(Arc::clone(&sink))));
        n.set_foreground_active(true);

        let t0 = Instant::now();
        let outcome = n.on_turn_start(Some("p1"), Some("p1"), t0).unwrap();
        assert!(matches!(outcome, DispatchOutcome::Muted(_)));
        assert!(sink.lock().unwrap().is_empty());

        n.set_background_only(false);
        let outcome = n.on_turn_start(Some("p1"), Some("p1"), ms(t0, 1000)).unwrap();
        assert!(outcome.delivered().is_some());
        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[test]
    fn disabled_notifier_still_consumes_cooldown() {
        let t0 = Instant::now();
        let mut n = Notifier::default();
        n.set_enabled(false);
        assert!(matches!(
            n.on_turn_start(Some("p1"), Some("p1"), t0),
            Some(DispatchOutcome::Muted(_))
        ));
        n.set_enabled(true);
        assert_eq!(
            n.on_turn_start(Some("p1"), Some("p1"), ms(t0, 100)),
            Some(DispatchOutcome::Throttled)
        );
    }

    #[test]
    fn failing_channel_does_not_block_the_other() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut n = Notifier::default()
            .with_visual(Box::new(Broken))
            .with_audio(Box::new(Recorder(Arc::clone(&sink))));
        let outcome = n.on_turn_start(Some("p1"), Some("p1"), Instant::now()).unwrap();
        assert!(outcome.delivered().is_some());
        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[test]
    fn volume_is_clamped() {
        let mut n = Notifier::default();
        n.set_volume(-1.0);
        assert_eq!(n.config().volume, 0.0);
        n.set_volume(f64::NAN);
        assert_eq!(n.config().volume, 0.0);
        n.set_volume(0.25);
        assert_eq!(n.config().volume, 0.25);
    }
}
