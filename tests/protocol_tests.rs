#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the battle client.
//!
//! Verifies that every inbound event spelling a server build has been seen
//! to use parses to the right `ServerMessage`, that payload damage never
//! fails a frame, and that outbound frames have the shape the server reads.

use battle_sync_client::protocol::{ClientMessage, OutboundFrame, PlayerAction, ServerMessage};
use battle_sync_client::snapshot::{normalize, ItemKind, Status};
use battle_sync_client::Team;
use serde_json::{json, Value};

fn parse(event: &str, data: Value) -> ServerMessage {
    ServerMessage::parse(&json!({"event": event, "data": data}).to_string())
        .unwrap_or_else(|e| panic!("{event} failed to parse: {e}"))
}

// ════════════════════════════════════════════════════════════════════
// Inbound event names
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_event_spelling_is_recognised() {
    let cases: &[(&str, fn(&ServerMessage) -> bool)] = &[
        ("battle:update", |m| matches!(m, ServerMessage::BattleUpdate(_))),
        ("battleUpdate", |m| matches!(m, ServerMessage::BattleUpdate(_))),
        ("turn:start", |m| matches!(m, ServerMessage::TurnStart(_))),
        ("battle:started", |m| matches!(m, ServerMessage::BattleStarted(_))),
        ("battle:ended", |m| matches!(m, ServerMessage::BattleEnded(_))),
        ("battleEnded", |m| matches!(m, ServerMessage::BattleEnded(_))),
        ("battle:log", |m| matches!(m, ServerMessage::Log(_))),
        ("battleLog", |m| matches!(m, ServerMessage::Log(_))),
        ("battle:chat", |m| matches!(m, ServerMessage::Chat(_))),
        ("chatMessage", |m| matches!(m, ServerMessage::Chat(_))),
        ("auth:success", |m| matches!(m, ServerMessage::AuthSuccess(_))),
        ("authSuccess", |m| matches!(m, ServerMessage::AuthSuccess(_))),
        ("authError", |m| matches!(m, ServerMessage::AuthError(_))),
        ("player:action:success", |m| matches!(m, ServerMessage::ActionSuccess)),
        ("actionSuccess", |m| matches!(m, ServerMessage::ActionSuccess)),
        ("actionError", |m| matches!(m, ServerMessage::ActionError(_))),
        ("ack", |m| matches!(m, ServerMessage::Ack(_))),
        ("spectator:count", |m| matches!(m, ServerMessage::Unknown)),
    ];
    for (event, check) in cases {
        let msg = parse(event, json!({}));
        assert!(check(&msg), "{event} parsed as {msg:?}");
    }
}

#[test]
fn frames_without_event_name_fail() {
    assert!(ServerMessage::parse(r#"{"data":{}}"#).is_err());
    assert!(ServerMessage::parse(r#"{"event":42}"#).is_err());
    assert!(ServerMessage::parse("").is_err());
}

#[test]
fn missing_or_scalar_data_yields_default_payloads() {
    let ServerMessage::Chat(chat) = ServerMessage::parse(r#"{"event":"battle:chat"}"#).unwrap()
    else {
        panic!("expected Chat");
    };
    assert!(chat.name.is_none());
    assert!(chat.message.is_none());

    let ServerMessage::Log(log) = parse("battle:log", json!("boom")) else {
        panic!("expected Log");
    };
    assert!(log.message.is_none());
}

// ════════════════════════════════════════════════════════════════════
// Inbound payloads
// ════════════════════════════════════════════════════════════════════

#[test]
fn turn_start_reads_either_id_field() {
    let ServerMessage::TurnStart(a) = parse("turn:start", json!({"playerId": "p1"})) else {
        panic!()
    };
    let ServerMessage::TurnStart(b) = parse("turn:start", json!({"id": 7})) else {
        panic!()
    };
    assert_eq!(a.player_id(), Some("p1"));
    assert_eq!(b.player_id(), Some("7"));
}

#[test]
fn battle_started_prefers_nested_battle_id() {
    let ServerMessage::BattleStarted(p) = parse(
        "battle:started",
        json!({"battle": {"id": "nested"}, "battleId": "flat", "message": "시작!"}),
    ) else {
        panic!()
    };
    assert_eq!(p.battle_id(), Some("nested"));
    assert_eq!(p.message.as_deref(), Some("시작!"));

    let ServerMessage::BattleStarted(p) =
        parse("battle:started", json!({"battle": "x", "battleId": "flat"}))
    else {
        panic!()
    };
    assert_eq!(p.battle_id(), Some("flat"));
}

#[test]
fn log_payload_keeps_type_and_timestamp() {
    let ServerMessage::Log(p) = parse(
        "battle:log",
        json!({"type": "attack", "message": "명중", "ts": 1_700_000_000_000_u64}),
    ) else {
        panic!()
    };
    assert_eq!(p.kind.as_deref(), Some("attack"));
    assert_eq!(p.message.as_deref(), Some("명중"));
    assert_eq!(p.ts, Some(1_700_000_000_000.0));
}

#[test]
fn auth_payload_finds_the_player_id() {
    for data in [
        json!({"playerId": "p1"}),
        json!({"id": "p1"}),
        json!({"player": {"id": "p1", "name": "Harry"}}),
    ] {
        let ServerMessage::AuthSuccess(auth) = parse("auth:success", data.clone()) else {
            panic!()
        };
        assert!(auth.ok);
        assert_eq!(auth.player_id(), Some("p1"), "payload {data}");
    }

    let ServerMessage::AuthSuccess(auth) = parse("auth:success", json!({"ok": false})) else {
        panic!()
    };
    assert!(!auth.ok);
}

#[test]
fn error_payload_has_a_fallback_reason() {
    let ServerMessage::ActionError(p) = parse("actionError", json!({})) else {
        panic!()
    };
    assert_eq!(p.reason(), "알 수 없는 오류");
    let ServerMessage::AuthError(p) = parse("authError", json!({"error": "denied"})) else {
        panic!()
    };
    assert_eq!(p.reason(), "denied");
}

#[test]
fn ack_requires_explicit_true() {
    let id = "6f1c1c2e-5a8e-4c59-9f55-0e1f3b8e0a11";
    let ServerMessage::Ack(ok) = parse("ack", json!({"ackId": id, "ok": true, "playerId": "p1"}))
    else {
        panic!()
    };
    assert!(ok.ok);
    assert_eq!(ok.ack_id.map(|u| u.to_string()).as_deref(), Some(id));
    assert_eq!(ok.auth().player_id(), Some("p1"));

    let ServerMessage::Ack(missing) = parse("ack", json!({"ackId": id})) else {
        panic!()
    };
    assert!(!missing.ok);

    let ServerMessage::Ack(bad_id) = parse("ack", json!({"ackId": "nope", "ok": true})) else {
        panic!()
    };
    assert!(bad_id.ack_id.is_none());
}

// ════════════════════════════════════════════════════════════════════
// Snapshot fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn nested_and_flat_snapshots_normalize_alike() {
    let players = json!([
        {"id": "p1", "name": "Harry", "team": "불사조 기사단", "hp": 70, "maxHp": 100},
        {"id": "p2", "name": "Draco", "team": "death_eaters", "hp": 0, "maxHp": 100},
    ]);
    let nested = normalize(&json!({
        "id": "b1",
        "status": "active",
        "players": players,
        "currentTurn": {"currentPlayer": {"id": "p1"}, "timeLeftSec": 12, "phase": "A_select"},
    }));
    let flat = normalize(&json!({
        "battleId": "b1",
        "status": "active",
        "players": players,
        "currentPlayerId": "p1",
        "timeLeftSec": 12,
        "phase": "A_select",
    }));

    for state in [&nested, &flat] {
        assert_eq!(state.id.as_deref(), Some("b1"));
        assert_eq!(state.status, Status::Active);
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.players[0].team, Some(Team::A));
        assert_eq!(state.players[1].team, Some(Team::B));
        assert_eq!(
            state
                .current_turn
                .current_player
                .as_ref()
                .map(|p| p.id.as_str()),
            Some("p1")
        );
        assert_eq!(state.current_turn.time_left_sec, 12);
    }
}

#[test]
fn damaged_snapshot_still_normalizes() {
    let state = normalize(&json!({
        "id": 99,
        "status": "exploded",
        "players": [null, 5, {"name": "no id"}, {"id": "p1", "hp": "lots", "items": {"ditany": 2}}],
        "currentTurn": "soon",
    }));
    assert_eq!(state.id.as_deref(), Some("99"));
    assert_eq!(state.status, Status::Waiting);
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[0].item_count(ItemKind::Dittany), 2);
    assert!(state.current_turn.current_player.is_none());
}

// ════════════════════════════════════════════════════════════════════
// Outbound frames
// ════════════════════════════════════════════════════════════════════

fn to_value(frame: &OutboundFrame) -> Value {
    serde_json::from_str(&frame.to_json().unwrap()).unwrap()
}

#[test]
fn fire_and_forget_frames_have_no_ack_id() {
    let v = to_value(&OutboundFrame::fire(ClientMessage::Join {
        battle_id: "b1".into(),
    }));
    assert_eq!(v, json!({"event": "join", "data": {"battleId": "b1"}}));
}

#[test]
fn acknowledged_frames_carry_a_fresh_uuid() {
    let make = || {
        OutboundFrame::with_ack(ClientMessage::PlayerReady {
            battle_id: "b1".into(),
            player_id: "p1".into(),
        })
    };
    let a = to_value(&make());
    let b = to_value(&make());
    assert_eq!(a["event"], "player:ready");
    assert_eq!(a["data"], json!({"battleId": "b1", "playerId": "p1"}));
    assert!(uuid::Uuid::parse_str(a["ackId"].as_str().unwrap()).is_ok());
    assert_ne!(a["ackId"], b["ackId"]);
}

#[test]
fn action_frames_tag_the_action_type() {
    let cases = [
        (
            PlayerAction::Attack {
                target_id: "p2".into(),
            },
            json!({"type": "attack", "targetId": "p2"}),
        ),
        (PlayerAction::Defend, json!({"type": "defend"})),
        (PlayerAction::Dodge, json!({"type": "dodge"})),
        (PlayerAction::Pass, json!({"type": "pass"})),
        (
            PlayerAction::Item { item: ItemKind::Dittany, target_id: Some("p1".into()) },
            json!({"type": "item", "item": "dittany", "targetId": "p1"}),
        ),
    ];
    for (action, expected) in cases {
        let v = to_value(&OutboundFrame::fire(ClientMessage::PlayerAction {
            battle_id: "b1".into(),
            player_id: "p1".into(),
            action,
        }));
        assert_eq!(v["event"], "player:action");
        assert_eq!(v["data"]["action"], expected);
    }
}

#[test]
fn chat_frame_shape() {
    let v = to_value(&OutboundFrame::fire(ClientMessage::ChatMessage {
        battle_id: "b1".into(),
        name: "Harry".into(),
        message: "안녕".into(),
    }));
    assert_eq!(
        v,
        json!({"event": "chatMessage", "data": {"battleId": "b1", "name": "Harry", "message": "안녕"}})
    );
}
