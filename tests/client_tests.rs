#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style client tests for the battle client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script server
//! frames and answer acknowledgments, and verifies that `BattleClient`
//! produces the right outbound frames and event stream.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use battle_sync_client::notify::AlertKind;
use battle_sync_client::{
    BattleClient, BattleClientError, BattleEvent, ClientConfig, PlayerAction, Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

use common::{
    auth_success_json, battle_ended_json, chat_json, frame, log_json, snapshot_json,
    turn_start_json, MockServer, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn config() -> ClientConfig {
    ClientConfig::new("b1")
        .with_token("t0k3n")
        .with_player_name("Harry")
}

fn start_client(
    scripted: Vec<Option<Result<String, BattleClientError>>>,
    config: ClientConfig,
) -> (BattleClient, mpsc::Receiver<BattleEvent>, MockServer) {
    let (transport, server) = MockTransport::new(scripted);
    let (client, events) = BattleClient::start(transport, config);
    (client, events, server)
}

/// Receive events until one matches, skipping the rest.
async fn next_matching(
    events: &mut mpsc::Receiver<BattleEvent>,
    pred: impl Fn(&BattleEvent) -> bool,
) -> BattleEvent {
    let found = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(ev) = events.recv().await {
            if pred(&ev) {
                return Some(ev);
            }
        }
        None
    })
    .await
    .expect("timed out waiting for event");
    found.expect("event channel closed before a matching event")
}

/// Start a client and confirm `p1` through the `playerAuth` acknowledgment.
async fn start_as_p1(
    config: ClientConfig,
) -> (BattleClient, mpsc::Receiver<BattleEvent>, MockServer) {
    let (client, mut events, server) = start_client(vec![], config);
    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, BattleEvent::Connected), "got {ev:?}");
    server
        .ack("playerAuth", json!({"ok": true, "playerId": "p1", "name": "Harry"}))
        .await;
    let ev = next_matching(&mut events, |e| {
        matches!(e, BattleEvent::IdentityConfirmed { .. })
    })
    .await;
    assert!(matches!(ev, BattleEvent::IdentityConfirmed { player_id } if player_id == "p1"));
    (client, events, server)
}

// ════════════════════════════════════════════════════════════════════
// Handshake
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn handshake_sends_join_then_player_auth() {
    let (mut client, mut events, server) = start_client(vec![], config());

    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, BattleEvent::Connected));
    assert!(client.is_connected());

    server.wait_for("playerAuth").await;
    let frames = server.sent_frames();
    assert_eq!(frames[0]["event"], "join");
    assert_eq!(frames[0]["data"]["battleId"], "b1");
    assert!(frames[0].get("ackId").is_none());

    assert_eq!(frames[1]["event"], "playerAuth");
    assert_eq!(frames[1]["data"]["battleId"], "b1");
    assert_eq!(frames[1]["data"]["token"], "t0k3n");
    assert_eq!(frames[1]["data"]["name"], "Harry");
    assert!(frames[1]["ackId"].is_string());

    client.shutdown().await;
}

#[tokio::test]
async fn positive_auth_ack_confirms_identity() {
    let (mut client, _events, _server) = start_as_p1(config()).await;
    assert_eq!(client.player_id().await.as_deref(), Some("p1"));
    client.shutdown().await;
}

#[tokio::test]
async fn auth_success_event_confirms_identity_once() {
    let (mut client, mut events, server) = start_client(
        vec![
            Some(Ok(auth_success_json("p1"))),
            Some(Ok(auth_success_json("p9"))),
        ],
        config(),
    );

    let ev = next_matching(&mut events, |e| {
        matches!(e, BattleEvent::IdentityConfirmed { .. })
    })
    .await;
    assert!(matches!(ev, BattleEvent::IdentityConfirmed { player_id } if player_id == "p1"));

    // The conflicting id is ignored; the next event is the chat line.
    server.push(chat_json("Ron", "hi"));
    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, BattleEvent::Chat(_)), "got {ev:?}");
    assert_eq!(client.player_id().await.as_deref(), Some("p1"));

    client.shutdown().await;
}

#[tokio::test]
async fn negative_auth_ack_reports_failure() {
    let (mut client, mut events, server) = start_client(vec![], config());
    server
        .ack("playerAuth", json!({"ok": false, "error": "invalid token"}))
        .await;

    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::AuthFailed { .. })).await;
    assert!(matches!(ev, BattleEvent::AuthFailed { reason } if reason == "invalid token"));
    assert!(client.player_id().await.is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn auth_ack_timeout_reports_failure() {
    let (mut client, mut events, _server) = start_client(
        vec![],
        config().with_ack_timeout(Duration::from_millis(50)),
    );

    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::AuthFailed { .. })).await;
    assert!(matches!(ev, BattleEvent::AuthFailed { .. }));
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test]
async fn auth_error_event_is_reported() {
    let (mut client, mut events, _server) = start_client(
        vec![Some(Ok(frame("authError", json!({"error": "만료된 토큰"}))))],
        config(),
    );
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::AuthFailed { .. })).await;
    assert!(matches!(ev, BattleEvent::AuthFailed { reason } if reason == "만료된 토큰"));
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Intents
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn intents_before_identity_fail() {
    let (mut client, mut events, _server) = start_client(vec![], config());
    let _ = events.recv().await;

    let err = client.mark_ready().await.unwrap_err();
    assert!(matches!(err, BattleClientError::NotAuthenticated));
    let err = client.submit_action(PlayerAction::Defend).await.unwrap_err();
    assert!(matches!(err, BattleClientError::NotAuthenticated));

    client.shutdown().await;
}

#[tokio::test]
async fn mark_ready_sends_player_ready() {
    let (mut client, _events, server) = start_as_p1(config()).await;

    let (result, ()) = tokio::join!(
        client.mark_ready(),
        server.ack("player:ready", json!({"ok": true}))
    );
    let ack = result.expect("ready acknowledged");
    assert!(ack.ok);

    let frame = server.wait_for("player:ready").await;
    assert_eq!(frame["data"]["battleId"], "b1");
    assert_eq!(frame["data"]["playerId"], "p1");

    client.shutdown().await;
}

#[tokio::test]
async fn submitted_action_locks_controls_until_acknowledged() {
    let (mut client, mut events, server) = start_as_p1(config()).await;

    server.push(snapshot_json("p1", 30));
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::StateUpdated { .. })).await;
    assert!(matches!(
        ev,
        BattleEvent::StateUpdated {
            my_turn: true,
            can_act: true,
            ..
        }
    ));

    let (result, ()) = tokio::join!(
        client.submit_action(PlayerAction::Attack {
            target_id: "p2".into()
        }),
        server.ack("player:action", json!({"ok": true}))
    );
    assert!(result.expect("action acknowledged").ok);

    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::ControlsChanged { .. })).await;
    assert!(matches!(ev, BattleEvent::ControlsChanged { can_act: false }));

    let frame = server.wait_for("player:action").await;
    assert_eq!(frame["data"]["playerId"], "p1");
    assert_eq!(frame["data"]["action"]["type"], "attack");
    assert_eq!(frame["data"]["action"]["targetId"], "p2");

    client.shutdown().await;
}

#[tokio::test]
async fn rejected_action_reopens_controls() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    server.push(snapshot_json("p1", 30));
    next_matching(&mut events, |e| matches!(e, BattleEvent::StateUpdated { .. })).await;

    let (result, ()) = tokio::join!(
        client.submit_action(PlayerAction::Defend),
        server.ack("player:action", json!({"ok": false, "error": "이미 행동했습니다"}))
    );
    let err = result.unwrap_err();
    assert!(
        matches!(&err, BattleClientError::Rejected { error } if error == "이미 행동했습니다"),
        "got {err:?}"
    );

    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::ControlsChanged { .. })).await;
    assert!(matches!(ev, BattleEvent::ControlsChanged { can_act: false }));
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::ControlsChanged { .. })).await;
    assert!(matches!(ev, BattleEvent::ControlsChanged { can_act: true }));

    client.shutdown().await;
}

#[tokio::test]
async fn unanswered_action_times_out_and_reopens_controls() {
    let (mut client, mut events, server) =
        start_as_p1(config().with_ack_timeout(Duration::from_millis(100))).await;
    server.push(snapshot_json("p1", 30));
    next_matching(&mut events, |e| matches!(e, BattleEvent::StateUpdated { .. })).await;

    let err = client.submit_action(PlayerAction::Dodge).await.unwrap_err();
    assert!(matches!(err, BattleClientError::Timeout), "got {err:?}");

    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::ControlsChanged { .. })).await;
    assert!(matches!(ev, BattleEvent::ControlsChanged { can_act: false }));
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::ControlsChanged { .. })).await;
    assert!(matches!(ev, BattleEvent::ControlsChanged { can_act: true }));

    client.shutdown().await;
}

#[tokio::test]
async fn chat_is_trimmed_and_signed_with_roster_name() {
    let (mut client, mut events, server) = start_as_p1(config().with_player_name("fallback")).await;
    server.push(snapshot_json("p2", 30));
    next_matching(&mut events, |e| matches!(e, BattleEvent::StateUpdated { .. })).await;

    let (result, ()) = tokio::join!(
        client.send_chat("  잘 부탁해  "),
        server.ack("chatMessage", json!({"ok": true}))
    );
    result.expect("chat acknowledged");

    let frame = server.wait_for("chatMessage").await;
    assert_eq!(frame["data"]["message"], "잘 부탁해");
    assert_eq!(frame["data"]["name"], "Harry");

    client.shutdown().await;
}

#[tokio::test]
async fn blank_chat_is_rejected_locally() {
    let (mut client, _events, server) = start_as_p1(config()).await;
    let err = client.send_chat("   ").await.unwrap_err();
    assert!(matches!(err, BattleClientError::EmptyMessage));
    assert!(server
        .sent_frames()
        .iter()
        .all(|f| f["event"] != "chatMessage"));
    client.shutdown().await;
}

#[tokio::test]
async fn unknown_ack_ids_are_ignored() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    server.push(common::ack_json(
        "00000000-0000-0000-0000-000000000000",
        json!({"ok": true}),
    ));
    server.push(chat_json("Ron", "hi"));
    let ev = events.recv().await.expect("event");
    assert!(matches!(ev, BattleEvent::Chat(_)), "got {ev:?}");
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Reconciliation through the loop
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshot_drives_state_and_countdown() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    let countdown = client.countdown();

    server.push(snapshot_json("p2", 30));
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::StateUpdated { .. })).await;
    let BattleEvent::StateUpdated {
        state,
        my_turn,
        can_act,
    } = ev
    else {
        panic!("expected StateUpdated");
    };
    assert_eq!(state.id.as_deref(), Some("b1"));
    assert_eq!(state.players.len(), 2);
    assert!(!my_turn);
    assert!(!can_act);
    assert_eq!(*countdown.borrow(), 30);

    client.shutdown().await;
}

#[tokio::test]
async fn repeated_logs_are_delivered_once() {
    let (mut client, mut events, _server) = start_client(
        vec![
            Some(Ok(log_json("attack", "Harry의 공격!"))),
            Some(Ok(log_json("attack", "Harry의 공격!"))),
            Some(Ok(chat_json("Ron", "와"))),
        ],
        config(),
    );

    let mut logs = 0;
    loop {
        match events.recv().await.expect("event") {
            BattleEvent::Log(entry) => {
                assert_eq!(entry.message, "Harry의 공격!");
                logs += 1;
            }
            BattleEvent::Chat(_) => break,
            _ => {}
        }
    }
    assert_eq!(logs, 1);
    client.shutdown().await;
}

#[tokio::test]
async fn turn_start_for_viewer_raises_alert() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    server.push(turn_start_json("p1"));
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::Alert(_))).await;
    let BattleEvent::Alert(alert) = ev else {
        panic!("expected Alert");
    };
    assert_eq!(alert.kind, AlertKind::YourTurn);
    assert!(alert.title.starts_with("PYXIS"));
    client.shutdown().await;
}

#[tokio::test]
async fn disabled_notifications_suppress_alerts() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    client.set_notifications_enabled(false).unwrap();

    server.push(turn_start_json("p1"));
    server.push(chat_json("Ron", "조용"));
    let ev = next_matching(&mut events, |e| {
        matches!(e, BattleEvent::Alert(_) | BattleEvent::Chat(_))
    })
    .await;
    assert!(matches!(ev, BattleEvent::Chat(_)), "got {ev:?}");

    client.shutdown().await;
}

#[tokio::test]
async fn foreground_suppresses_background_only_alerts() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    client.set_foreground_active(true).unwrap();
    client.set_volume(3.0).unwrap();

    server.push(turn_start_json("p1"));
    server.push(chat_json("Ron", "앞"));
    let ev = next_matching(&mut events, |e| {
        matches!(e, BattleEvent::Alert(_) | BattleEvent::Chat(_))
    })
    .await;
    assert!(matches!(ev, BattleEvent::Chat(_)), "got {ev:?}");

    // Off background-only, the next turn alert comes through.
    client.set_background_only(false).unwrap();
    tokio::time::sleep(Duration::from_millis(900)).await;
    server.push(turn_start_json("p1"));
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::Alert(_))).await;
    assert!(matches!(ev, BattleEvent::Alert(a) if a.kind == AlertKind::YourTurn));

    client.shutdown().await;
}

#[tokio::test]
async fn battle_end_is_announced_once() {
    let (mut client, mut events, server) = start_as_p1(config()).await;
    server.push(battle_ended_json("team_a"));
    server.push(frame("battleEnded", json!({"winner": "A"})));
    server.push(chat_json("Ron", "끝"));

    let mut ended = 0;
    loop {
        match events.recv().await.expect("event") {
            BattleEvent::BattleEnded { winner } => {
                assert_eq!(winner, Some(battle_sync_client::Team::A));
                ended += 1;
            }
            BattleEvent::Chat(_) => break,
            _ => {}
        }
    }
    assert_eq!(ended, 1);
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Disconnection and shutdown
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn server_close_emits_disconnected() {
    let (_client, mut events, _server) = start_client(vec![None], config());
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::Disconnected { .. })).await;
    assert!(matches!(ev, BattleEvent::Disconnected { reason: None }));
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn transport_error_emits_disconnected_with_reason() {
    let (client, mut events, server) = start_client(vec![], config());
    server.fail("connection reset");
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::Disconnected { .. })).await;
    let BattleEvent::Disconnected { reason: Some(reason) } = ev else {
        panic!("expected a reason");
    };
    assert!(reason.contains("connection reset"));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn pending_intent_is_dropped_when_connection_ends() {
    let (client, mut events, server) = start_as_p1(config()).await;

    let hang_up = async {
        server.wait_for("player:ready").await;
        server.hang_up();
    };
    let (result, ()) = tokio::join!(client.mark_ready(), hang_up);
    assert!(matches!(result.unwrap_err(), BattleClientError::AckDropped));

    next_matching(&mut events, |e| matches!(e, BattleEvent::Disconnected { .. })).await;
    let err = client.mark_ready().await.unwrap_err();
    assert!(matches!(err, BattleClientError::NotConnected));
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let (mut client, mut events, _server) = start_client(
        vec![
            Some(Ok("not json".into())),
            Some(Ok(r#"{"data":{}}"#.into())),
            Some(Ok(frame("someFutureEvent", json!({"x": 1})))),
            Some(Ok(chat_json("Ron", "still here"))),
        ],
        config(),
    );
    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::Chat(_))).await;
    assert!(matches!(ev, BattleEvent::Chat(line) if line.message == "still here"));
    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_transport_and_ends_stream() {
    let (mut client, mut events, server) = start_client(vec![], config());
    let _ = events.recv().await;

    client.shutdown().await;
    assert!(server.closed.load(Ordering::Relaxed));
    assert!(!client.is_connected());

    let ev = next_matching(&mut events, |e| matches!(e, BattleEvent::Disconnected { .. })).await;
    assert!(matches!(ev, BattleEvent::Disconnected { reason: Some(_) }));
    assert!(events.recv().await.is_none());

    assert!(matches!(
        client.set_volume(0.5).unwrap_err(),
        BattleClientError::NotConnected
    ));
}

/// A transport whose `close` never completes.
struct HangingCloseTransport;

#[async_trait::async_trait]
impl Transport for HangingCloseTransport {
    async fn send(&mut self, _message: String) -> Result<(), BattleClientError> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, BattleClientError>> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), BattleClientError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn shutdown_aborts_a_stuck_loop() {
    let config = config().with_shutdown_timeout(Duration::from_millis(50));
    let (mut client, mut events) = BattleClient::start(HangingCloseTransport, config);
    let _ = events.recv().await;

    tokio::time::timeout(Duration::from_secs(2), client.shutdown())
        .await
        .expect("shutdown finished despite the hanging close");
    assert!(!client.is_connected());
}

#[tokio::test]
async fn full_event_channel_drops_events_but_not_disconnect() {
    let mut scripted: Vec<_> = (0..20)
        .map(|i| Some(Ok(log_json("attack", &format!("공격 {i}")))))
        .collect();
    scripted.push(None);
    let (_client, mut events, _server) =
        start_client(scripted, config().with_event_channel_capacity(1));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut received = Vec::new();
    while let Some(ev) = events.recv().await {
        received.push(ev);
    }
    assert!(received.len() < 20, "events should have been dropped");
    assert!(matches!(
        received.last(),
        Some(BattleEvent::Disconnected { .. })
    ));
}
