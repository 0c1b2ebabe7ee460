//! Presentation-facing events emitted by the battle client.

use serde::Serialize;

use crate::notify::Alert;
use crate::protocol::{ChatPayload, LogPayload};
use crate::snapshot::BattleState;
use crate::team::Team;

/// Name shown for chat lines without a sender.
pub const ANONYMOUS_SENDER: &str = "익명";

/// Display class of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// `battle` and `round` lines.
    Battle,
    Error,
    System,
    Plain,
}

impl LogKind {
    pub fn from_wire(raw: Option<&str>) -> LogKind {
        match raw.map(str::to_lowercase).as_deref() {
            Some("battle" | "round") => LogKind::Battle,
            Some("error") => LogKind::Error,
            Some("system") => LogKind::System,
            _ => LogKind::Plain,
        }
    }
}

/// One line of the battle log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub kind: LogKind,
    /// Category exactly as the server sent it.
    pub category: Option<String>,
    pub message: String,
    /// Server timestamp in epoch milliseconds, when supplied.
    pub ts: Option<u64>,
}

impl From<&LogPayload> for LogEntry {
    fn from(payload: &LogPayload) -> Self {
        Self {
            kind: LogKind::from_wire(payload.kind.as_deref()),
            category: payload.kind.clone(),
            message: payload.message.clone().unwrap_or_default(),
            ts: payload
                .ts
                .filter(|ts| *ts >= 0.0)
                .map(|ts| ts.min(u64::MAX as f64) as u64),
        }
    }
}

/// One chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    pub sender: String,
    pub message: String,
}

impl From<&ChatPayload> for ChatLine {
    fn from(payload: &ChatPayload) -> Self {
        Self {
            sender: payload
                .name
                .clone()
                .unwrap_or_else(|| ANONYMOUS_SENDER.to_string()),
            message: payload.message.clone().unwrap_or_default(),
        }
    }
}

/// Everything the presentation layer needs to react to.
///
/// Events arrive in the order the underlying frames were delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    /// The transport loop started. Always the first event.
    Connected,
    /// A new canonical state was accepted.
    StateUpdated {
        state: Box<BattleState>,
        /// Whether it is the viewer's turn.
        my_turn: bool,
        /// Whether the action controls should be enabled.
        can_act: bool,
    },
    Log(LogEntry),
    Chat(ChatLine),
    /// An alert passed the cooldown and was delivered.
    Alert(Alert),
    /// Authentication succeeded and the viewer's id is now known.
    IdentityConfirmed { player_id: String },
    AuthFailed { reason: String },
    ActionAccepted,
    ActionRejected { reason: String },
    /// The action controls were locked or reopened outside a snapshot.
    ControlsChanged { can_act: bool },
    BattleEnded { winner: Option<Team> },
    /// The connection is gone. Always the last event.
    Disconnected { reason: Option<String> },
}
