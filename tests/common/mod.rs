#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the battle client integration tests.
//!
//! Provides a scriptable [`MockTransport`] and helpers that build battle
//! server frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use battle_sync_client::{BattleClientError, Transport};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── MockTransport ───────────────────────────────────────────────────

/// A mock transport for integration testing.
///
/// Scripted frames are consumed in order by `recv()`. Once they run out,
/// `recv()` waits for frames pushed through [`MockServer::push`], so tests
/// can answer requests whose ack ids are only known at runtime.
pub struct MockTransport {
    scripted: VecDeque<Option<Result<String, BattleClientError>>>,
    live: mpsc::UnboundedReceiver<Option<Result<String, BattleClientError>>>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

/// The test's side of a [`MockTransport`].
#[derive(Clone)]
pub struct MockServer {
    /// Every frame the client sent, in order.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
    live: mpsc::UnboundedSender<Option<Result<String, BattleClientError>>>,
}

impl MockTransport {
    pub fn new(scripted: Vec<Option<Result<String, BattleClientError>>>) -> (Self, MockServer) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (live_tx, live_rx) = mpsc::unbounded_channel();
        let transport = Self {
            scripted: VecDeque::from(scripted),
            live: live_rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let server = MockServer {
            sent,
            closed,
            live: live_tx,
        };
        (transport, server)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), BattleClientError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, BattleClientError>> {
        if let Some(item) = self.scripted.pop_front() {
            return item;
        }
        match self.live.recv().await {
            Some(item) => item,
            // The test dropped its handle; stay open until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), BattleClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl MockServer {
    /// Deliver one frame to the client.
    pub fn push(&self, frame: String) {
        self.live.send(Some(Ok(frame))).unwrap();
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        self.live.send(None).unwrap();
    }

    /// Fail the connection.
    pub fn fail(&self, reason: &str) {
        self.live
            .send(Some(Err(BattleClientError::TransportReceive(reason.into()))))
            .unwrap();
    }

    /// All sent frames, parsed.
    pub fn sent_frames(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    /// Wait until the client has sent a frame named `event`, and return the
    /// most recent one.
    pub async fn wait_for(&self, event: &str) -> Value {
        for _ in 0..200 {
            if let Some(frame) = self
                .sent_frames()
                .into_iter()
                .rev()
                .find(|f| f["event"] == event)
            {
                return frame;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("client never sent {event}");
    }

    /// Answer the latest `event` frame with an acknowledgment.
    pub async fn ack(&self, event: &str, extra: Value) {
        let frame = self.wait_for(event).await;
        let ack_id = frame["ackId"].as_str().expect("frame carries ackId");
        self.push(ack_json(ack_id, extra));
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

/// `{"event": event, "data": data}`
pub fn frame(event: &str, data: Value) -> String {
    json!({"event": event, "data": data}).to_string()
}

/// An acknowledgment with `extra` merged into the payload.
pub fn ack_json(ack_id: &str, extra: Value) -> String {
    let mut data = json!({"ackId": ack_id});
    if let (Some(obj), Some(extra)) = (data.as_object_mut(), extra.as_object()) {
        obj.extend(extra.clone());
    }
    frame("ack", data)
}

/// A two-player roster: `p1` on team A, `p2` on team B.
pub fn roster() -> Value {
    json!([
        {"id": "p1", "name": "Harry", "team": "phoenix", "hp": 100, "maxHp": 100,
         "items": {"dittany": 1, "attackBooster": 0, "defenseBooster": 2}},
        {"id": "p2", "name": "Draco", "team": "death", "hp": 80, "maxHp": 100},
    ])
}

/// A nested-shape active snapshot whose current player is `current`.
pub fn snapshot_json(current: &str, time_left_sec: u32) -> String {
    frame(
        "battle:update",
        json!({
            "id": "b1",
            "status": "active",
            "players": roster(),
            "currentTurn": {
                "currentPlayer": {"id": current},
                "timeLeftSec": time_left_sec,
                "phase": "A_select",
                "turnNumber": 1,
            },
        }),
    )
}

pub fn log_json(kind: &str, message: &str) -> String {
    frame("battle:log", json!({"type": kind, "message": message}))
}

pub fn chat_json(name: &str, message: &str) -> String {
    frame("battle:chat", json!({"name": name, "message": message}))
}

pub fn turn_start_json(player_id: &str) -> String {
    frame("turn:start", json!({"playerId": player_id}))
}

pub fn battle_ended_json(winner: &str) -> String {
    frame("battle:ended", json!({"winner": winner}))
}

pub fn auth_success_json(player_id: &str) -> String {
    frame("auth:success", json!({"ok": true, "playerId": player_id}))
}
