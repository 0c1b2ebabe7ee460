//! Wire types for the battle event channel.
//!
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.
//! Server builds disagree on event spelling (`battle:update` vs
//! `battleUpdate`) and on payload shapes, so inbound parsing is lenient:
//!
//! - both spellings of an event collapse into one [`EventName`] variant
//! - unknown event names parse as [`EventName::Other`] and are ignored
//! - a missing or non-object `data` behaves like `{}`
//! - a payload field with the wrong JSON type behaves as if absent
//!
//! Outbound frames carry an optional `ackId` that the server echoes back in
//! an `ack` frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::snapshot::{lenient, ItemKind, RawPlayer, RawSnapshot};

// ── Event names ─────────────────────────────────────────────────────

/// Logical name of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "battle:update", alias = "battleUpdate")]
    BattleUpdate,
    #[serde(rename = "turn:start")]
    TurnStart,
    #[serde(rename = "battle:started")]
    BattleStarted,
    #[serde(rename = "battle:ended", alias = "battleEnded")]
    BattleEnded,
    #[serde(rename = "battle:log", alias = "battleLog")]
    Log,
    #[serde(rename = "battle:chat", alias = "chatMessage")]
    Chat,
    #[serde(rename = "auth:success", alias = "authSuccess")]
    AuthSuccess,
    #[serde(rename = "authError")]
    AuthError,
    #[serde(rename = "player:action:success", alias = "actionSuccess")]
    ActionSuccess,
    #[serde(rename = "actionError")]
    ActionError,
    #[serde(rename = "ack")]
    Ack,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: EventName,
    #[serde(default)]
    data: Value,
}

/// Parse a payload leniently; anything that is not a well-formed object
/// yields the default payload.
fn payload<T: Default + for<'de> Deserialize<'de>>(data: Value) -> T {
    if !data.is_object() {
        return T::default();
    }
    serde_json::from_value(data).unwrap_or_default()
}

// ── Inbound payloads ────────────────────────────────────────────────

/// `turn:start`: whose turn just began.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStartPayload {
    #[serde(default, deserialize_with = "lenient::id")]
    player_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    id: Option<String>,
}

impl TurnStartPayload {
    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BattleRef {
    #[serde(default, deserialize_with = "lenient::id")]
    id: Option<String>,
}

fn battle_ref<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<BattleRef>, D::Error> {
    let value = Value::deserialize(d)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// `battle:started`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStartedPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "battle_ref")]
    battle: Option<BattleRef>,
    #[serde(default, deserialize_with = "lenient::id")]
    battle_id: Option<String>,
}

impl BattleStartedPayload {
    pub fn battle_id(&self) -> Option<&str> {
        self.battle
            .as_ref()
            .and_then(|b| b.id.as_deref())
            .or(self.battle_id.as_deref())
    }
}

/// `battle:ended`. The winner is free text resolved by the team resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BattleEndedPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub winner: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
}

/// `battle:log`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogPayload {
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    /// Server timestamp in epoch milliseconds.
    #[serde(default, deserialize_with = "lenient::number")]
    pub ts: Option<f64>,
}

/// `battle:chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
}

fn not_false<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(!matches!(Value::deserialize(d)?, Value::Bool(false)))
}

fn default_true() -> bool {
    true
}

/// `auth:success`, also the shape of a `playerAuth` acknowledgment.
///
/// The player id may arrive as `playerId`, `id` or `player.id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// Only an explicit `false` marks failure.
    #[serde(default = "default_true", deserialize_with = "not_false")]
    pub ok: bool,
    #[serde(default, deserialize_with = "lenient::id")]
    player_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient::player")]
    player: Option<RawPlayer>,
}

impl Default for AuthPayload {
    fn default() -> Self {
        Self {
            ok: true,
            player_id: None,
            id: None,
            player: None,
        }
    }
}

impl AuthPayload {
    pub fn player_id(&self) -> Option<&str> {
        self.player_id
            .as_deref()
            .or(self.id.as_deref())
            .or_else(|| self.player.as_ref().and_then(|p| p.id.as_deref()))
    }

    /// Display name of the authenticated player, when the server sent one.
    pub fn player_name(&self) -> Option<&str> {
        self.player.as_ref().and_then(|p| p.name.as_deref())
    }
}

/// `authError` / `actionError`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    pub error: Option<String>,
}

impl ErrorPayload {
    pub fn reason(&self) -> &str {
        self.error.as_deref().unwrap_or("알 수 없는 오류")
    }
}

fn ack_id<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Option<Uuid>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Uuid::parse_str(&s).ok(),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAck {
    #[serde(default, deserialize_with = "ack_id")]
    ack_id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient::flag")]
    ok: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    error: Option<String>,
}

/// Resolution of an outbound request: `{ok, error?}` plus whatever else the
/// server attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AckPayload {
    pub ack_id: Option<Uuid>,
    /// Only an explicit `true` counts as success.
    pub ok: bool,
    pub error: Option<String>,
    /// The full acknowledgment object.
    pub data: Value,
}

impl AckPayload {
    fn from_value(data: Value) -> Self {
        let raw: RawAck = payload(data.clone());
        Self {
            ack_id: raw.ack_id,
            ok: raw.ok,
            error: raw.error,
            data,
        }
    }

    /// Read the acknowledgment as an authentication result.
    pub fn auth(&self) -> AuthPayload {
        payload(self.data.clone())
    }
}

// ── Inbound messages ────────────────────────────────────────────────

/// A parsed inbound frame.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Full battle snapshot (boxed to reduce enum size).
    BattleUpdate(Box<RawSnapshot>),
    TurnStart(TurnStartPayload),
    BattleStarted(BattleStartedPayload),
    BattleEnded(BattleEndedPayload),
    Log(LogPayload),
    Chat(ChatPayload),
    AuthSuccess(AuthPayload),
    AuthError(ErrorPayload),
    ActionSuccess,
    ActionError(ErrorPayload),
    Ack(AckPayload),
    /// An event this client does not handle.
    Unknown,
}

impl ServerMessage {
    /// Parse one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BattleClientError::Serialization`](crate::error::BattleClientError::Serialization)
    /// when the text is not JSON or has no string `event` field. Payload
    /// problems never fail.
    ///
    /// ```
    /// use battle_sync_client::protocol::ServerMessage;
    ///
    /// let msg = ServerMessage::parse(r#"{"event":"battleLog","data":{"message":"hit"}}"#).unwrap();
    /// assert!(matches!(msg, ServerMessage::Log(_)));
    /// ```
    pub fn parse(text: &str) -> Result<ServerMessage> {
        let frame: RawFrame = serde_json::from_str(text)?;
        Ok(Self::from_parts(frame.event, frame.data))
    }

    /// Build a message from an already-split event name and payload.
    pub fn from_parts(event: EventName, data: Value) -> ServerMessage {
        match event {
            EventName::BattleUpdate => {
                ServerMessage::BattleUpdate(Box::new(RawSnapshot::from_value(&data)))
            }
            EventName::TurnStart => ServerMessage::TurnStart(payload(data)),
            EventName::BattleStarted => ServerMessage::BattleStarted(payload(data)),
            EventName::BattleEnded => ServerMessage::BattleEnded(payload(data)),
            EventName::Log => ServerMessage::Log(payload(data)),
            EventName::Chat => ServerMessage::Chat(payload(data)),
            EventName::AuthSuccess => ServerMessage::AuthSuccess(payload(data)),
            EventName::AuthError => ServerMessage::AuthError(payload(data)),
            EventName::ActionSuccess => ServerMessage::ActionSuccess,
            EventName::ActionError => ServerMessage::ActionError(payload(data)),
            EventName::Ack => ServerMessage::Ack(AckPayload::from_value(data)),
            EventName::Other => ServerMessage::Unknown,
        }
    }
}

// ── Outbound messages ───────────────────────────────────────────────

/// An action submitted for the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayerAction {
    #[serde(rename_all = "camelCase")]
    Attack { target_id: String },
    Defend,
    Dodge,
    Pass,
    #[serde(rename_all = "camelCase")]
    Item {
        item: ItemKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
    },
}

impl PlayerAction {
    pub fn item(&self) -> Option<ItemKind> {
        match self {
            PlayerAction::Item { item, .. } => Some(*item),
            _ => None,
        }
    }
}

/// Intents sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Enter the battle room.
    #[serde(rename = "join", rename_all = "camelCase")]
    Join { battle_id: String },
    /// Authenticate as a player of the battle.
    #[serde(rename = "playerAuth", rename_all = "camelCase")]
    PlayerAuth {
        battle_id: String,
        token: Option<String>,
        name: Option<String>,
    },
    #[serde(rename = "player:ready", rename_all = "camelCase")]
    PlayerReady { battle_id: String, player_id: String },
    #[serde(rename = "player:action", rename_all = "camelCase")]
    PlayerAction {
        battle_id: String,
        player_id: String,
        action: PlayerAction,
    },
    #[serde(rename = "chatMessage", rename_all = "camelCase")]
    ChatMessage {
        battle_id: String,
        name: String,
        message: String,
    },
}

impl ClientMessage {
    /// Wire event name, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::PlayerAuth { .. } => "playerAuth",
            ClientMessage::PlayerReady { .. } => "player:ready",
            ClientMessage::PlayerAction { .. } => "player:action",
            ClientMessage::ChatMessage { .. } => "chatMessage",
        }
    }
}

/// A [`ClientMessage`] plus the acknowledgment id the server should echo.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    #[serde(flatten)]
    pub message: ClientMessage,
    #[serde(rename = "ackId", skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<Uuid>,
}

impl OutboundFrame {
    /// A frame that expects no acknowledgment.
    pub fn fire(message: ClientMessage) -> Self {
        Self {
            message,
            ack_id: None,
        }
    }

    /// A frame tagged with a fresh v4 acknowledgment id.
    pub fn with_ack(message: ClientMessage) -> Self {
        Self {
            message,
            ack_id: Some(Uuid::new_v4()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
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
    use serde_json::json;

    #[test]
    fn both_spellings_collapse_to_one_event() {
        for name in ["battle:update", "battleUpdate"] {
            let text = json!({"event": name, "data": {"id": "b1"}}).to_string();
            let msg = ServerMessage::parse(&text).unwrap();
            let ServerMessage::BattleUpdate(raw) = msg else {
                panic!("expected BattleUpdate for {name}");
            };
            assert_eq!(raw.battle_id(), Some("b1"));
        }
    }

    #[test]
    fn unknown_event_is_ignored_not_rejected() {
        let msg = ServerMessage::parse(r#"{"event":"spectator:count","data":3}"#).unwrap();
        assert!(matches!(msg, ServerMessage::Unknown));
    }

    #[test]
    fn missing_event_is_an_error() {
        assert!(ServerMessage::parse(r#"{"data":{}}"#).is_err());
        assert!(ServerMessage::parse("not json").is_err());
    }

    #[test]
    fn non_object_payload_is_empty() {
        let msg = ServerMessage::parse(r#"{"event":"battle:log","data":"boom"}"#).unwrap();
        let ServerMessage::Log(log) = msg else {
            panic!("expected Log");
        };
        assert_eq!(log, LogPayload::default());
    }

    #[test]
    fn wrong_typed_fields_are_absent() {
        let msg = ServerMessage::parse(
            r#"{"event":"battle:log","data":{"type":7,"message":"hit","ts":"yesterday"}}"#,
        )
        .unwrap();
        let ServerMessage::Log(log) = msg else {
            panic!("expected Log");
        };
        assert_eq!(log.kind, None);
        assert_eq!(log.message.as_deref(), Some("hit"));
        assert_eq!(log.ts, None);
    }

    #[test]
    fn auth_player_id_shapes() {
        for data in [
            json!({"playerId": "p1"}),
            json!({"id": "p1"}),
            json!({"player": {"id": "p1", "name": "Harry"}}),
        ] {
            let msg = ServerMessage::from_parts(EventName::AuthSuccess, data);
            let ServerMessage::AuthSuccess(auth) = msg else {
                panic!("expected AuthSuccess");
            };
            assert!(auth.ok);
            assert_eq!(auth.player_id(), Some("p1"));
        }
    }

    #[test]
    fn auth_ok_false_is_failure_but_missing_is_success() {
        let auth: AuthPayload = payload(json!({"ok": false, "playerId": "p1"}));
        assert!(!auth.ok);
        let auth: AuthPayload = payload(json!({"ok": "yes"}));
        assert!(auth.ok);
    }

    #[test]
    fn ack_requires_explicit_true() {
        let id = Uuid::new_v4();
        let msg = ServerMessage::from_parts(
            EventName::Ack,
            json!({"ackId": id.to_string(), "ok": 1, "error": "nope"}),
        );
        let ServerMessage::Ack(ack) = msg else {
            panic!("expected Ack");
        };
        assert_eq!(ack.ack_id, Some(id));
        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("nope"));
    }

    #[test]
    fn battle_started_reads_nested_battle_id() {
        let started: BattleStartedPayload = payload(json!({"battle": {"id": "b9"}}));
        assert_eq!(started.battle_id(), Some("b9"));
        let started: BattleStartedPayload = payload(json!({"battle": "b9"}));
        assert_eq!(started.battle_id(), None);
    }

    #[test]
    fn outbound_frame_layout() {
        let frame = OutboundFrame::with_ack(ClientMessage::PlayerAction {
            battle_id: "b1".into(),
            player_id: "p1".into(),
            action: PlayerAction::Attack {
                target_id: "p2".into(),
            },
        });
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "player:action");
        assert_eq!(value["data"]["battleId"], "b1");
        assert_eq!(value["data"]["action"], json!({"type": "attack", "targetId": "p2"}));
        assert_eq!(value["ackId"], frame.ack_id.unwrap().to_string());
    }

    #[test]
    fn fire_frame_has_no_ack_id() {
        let frame = OutboundFrame::fire(ClientMessage::Join {
            battle_id: "b1".into(),
        });
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "join", "data": {"battleId": "b1"}}));
    }

    #[test]
    fn item_action_uses_canonical_item_name() {
        let action = PlayerAction::Item {
            item: ItemKind::Dittany,
            target_id: None,
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "item", "item": "dittany"})
        );
        assert_eq!(action.item(), Some(ItemKind::Dittany));
    }
}
