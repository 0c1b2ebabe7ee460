#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Alert dispatch through a running client.
//!
//! A session built with a `ManualClock` and recording side channels is
//! handed to `BattleClient::start_with_session`, so cooldown windows are
//! stepped explicitly while frames flow through the real transport loop.

mod common;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use battle_sync_client::notify::{
    Alert, AlertChannel, AlertKind, ChannelError, LogCategory, Notifier, NotifyConfig,
};
use battle_sync_client::{
    BattleClient, BattleEvent, BattleSession, ClientConfig, ManualClock, SharedClock, Status,
};
use serde_json::json;
use tokio::sync::mpsc;

use common::{chat_json, log_json, snapshot_json, turn_start_json, MockServer, MockTransport};

/// Records every alert together with the volume it was played at.
#[derive(Clone, Default)]
struct Recorder(Arc<StdMutex<Vec<(Alert, f64)>>>);

impl Recorder {
    fn kinds(&self) -> Vec<AlertKind> {
        self.0.lock().unwrap().iter().map(|(a, _)| a.kind).collect()
    }
}

impl AlertChannel for Recorder {
    fn deliver(&mut self, alert: &Alert, config: &NotifyConfig) -> Result<(), ChannelError> {
        self.0.lock().unwrap().push((alert.clone(), config.volume));
        Ok(())
    }
}

/// A channel the platform refuses.
struct Denied;

impl AlertChannel for Denied {
    fn deliver(&mut self, _alert: &Alert, _config: &NotifyConfig) -> Result<(), ChannelError> {
        Err(ChannelError::PermissionDenied)
    }
}

struct Harness {
    client: BattleClient,
    events: mpsc::Receiver<BattleEvent>,
    server: MockServer,
    clock: ManualClock,
    visual: Recorder,
}

impl Harness {
    async fn start() -> Self {
        let clock = ManualClock::new();
        let visual = Recorder::default();
        let config = ClientConfig::new("b1").with_player_name("Harry");
        let notifier = Notifier::new(config.notify.clone())
            .with_visual(Box::new(visual.clone()))
            .with_audio(Box::new(Denied));
        let shared: SharedClock = Arc::new(clock.clone());
        let session = BattleSession::new(notifier, config.windows, shared);

        let (transport, server) = MockTransport::new(vec![]);
        let (client, mut events) = BattleClient::start_with_session(transport, config, session);

        server
            .ack("playerAuth", json!({"ok": true, "playerId": "p1"}))
            .await;
        loop {
            match events.recv().await.expect("event") {
                BattleEvent::IdentityConfirmed { .. } => break,
                BattleEvent::Connected => {}
                other => panic!("unexpected {other:?}"),
            }
        }

        Self {
            client,
            events,
            server,
            clock,
            visual,
        }
    }

    /// Push `frame` followed by a chat marker and collect the alerts emitted
    /// before the marker.
    async fn alerts_for(&mut self, frame: String) -> Vec<AlertKind> {
        let marker = format!("marker-{}", uuid::Uuid::new_v4());
        self.server.push(frame);
        self.server.push(chat_json("marker", &marker));
        let mut alerts = Vec::new();
        let collect = async {
            loop {
                match self.events.recv().await.expect("event") {
                    BattleEvent::Alert(alert) => alerts.push(alert.kind),
                    BattleEvent::Chat(line) if line.message == marker => break,
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), collect)
            .await
            .expect("marker arrived");
        alerts
    }
}

#[tokio::test]
async fn turn_alerts_share_one_cooldown() {
    let mut h = Harness::start().await;

    assert_eq!(h.alerts_for(turn_start_json("p1")).await, vec![AlertKind::YourTurn]);
    // Same instant: throttled.
    assert!(h.alerts_for(turn_start_json("p1")).await.is_empty());

    h.clock.advance_ms(799);
    assert!(h.alerts_for(turn_start_json("p1")).await.is_empty());

    h.clock.advance_ms(1);
    assert_eq!(h.alerts_for(turn_start_json("p1")).await, vec![AlertKind::YourTurn]);

    // Someone else's turn never alerts.
    h.clock.advance_ms(5_000);
    assert!(h.alerts_for(turn_start_json("p2")).await.is_empty());

    assert_eq!(h.visual.kinds(), vec![AlertKind::YourTurn, AlertKind::YourTurn]);
    h.client.shutdown().await;
}

#[tokio::test]
async fn status_edge_stamps_the_cooldown_for_the_turn_alert() {
    let mut h = Harness::start().await;

    // The status edge passes and stamps the cooldown, so the turn alert in
    // the same snapshot is throttled.
    assert_eq!(
        h.alerts_for(snapshot_json("p1", 30)).await,
        vec![AlertKind::StatusChanged(Status::Active)]
    );

    h.clock.advance_ms(1_500);
    assert_eq!(h.alerts_for(snapshot_json("p1", 29)).await, vec![AlertKind::YourTurn]);

    h.client.shutdown().await;
}

#[tokio::test]
async fn log_alerts_use_their_category_windows() {
    let mut h = Harness::start().await;

    assert_eq!(
        h.alerts_for(log_json("attack", "Harry의 공격")).await,
        vec![AlertKind::Log(LogCategory::Attack)]
    );
    h.clock.advance_ms(599);
    assert!(h.alerts_for(log_json("defend", "Draco의 방어")).await.is_empty());
    h.clock.advance_ms(1);
    assert_eq!(
        h.alerts_for(log_json("defend", "Draco의 방어 2")).await,
        vec![AlertKind::Log(LogCategory::Defend)]
    );

    // Routine system chatter never alerts; a real one waits 800ms.
    h.clock.advance_ms(10_000);
    assert!(h.alerts_for(log_json("system", "Harry 접속")).await.is_empty());
    assert_eq!(
        h.alerts_for(log_json("system", "다음 라운드가 시작됩니다")).await,
        vec![AlertKind::Log(LogCategory::System)]
    );

    h.client.shutdown().await;
}

#[tokio::test]
async fn failing_channel_does_not_block_the_other() {
    let mut h = Harness::start().await;
    h.client.set_volume(0.3).unwrap();

    assert_eq!(h.alerts_for(turn_start_json("p1")).await, vec![AlertKind::YourTurn]);

    let recorded = h.visual.0.lock().unwrap().clone();
    assert_eq!(recorded.len(), 1);
    assert!((recorded[0].1 - 0.3).abs() < f64::EPSILON);
    assert!(recorded[0].0.title.contains("당신의 턴입니다"));

    h.client.shutdown().await;
}

#[tokio::test]
async fn muted_alerts_skip_channels_but_still_stamp_the_cooldown() {
    let mut h = Harness::start().await;

    h.client.set_notifications_enabled(false).unwrap();
    assert!(h.alerts_for(turn_start_json("p1")).await.is_empty());

    h.client.set_notifications_enabled(true).unwrap();
    h.clock.advance_ms(500);
    assert!(h.alerts_for(turn_start_json("p1")).await.is_empty());

    h.clock.advance_ms(300);
    assert_eq!(h.alerts_for(turn_start_json("p1")).await, vec![AlertKind::YourTurn]);
    assert_eq!(h.visual.kinds(), vec![AlertKind::YourTurn]);

    h.client.shutdown().await;
}
