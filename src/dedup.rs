//! Suppression of repeated deliveries.
//!
//! The server (and the transport's reconnect logic) may deliver the same
//! snapshot, log line or chat line more than once. Each category gets a
//! [`DedupWindow`] that remembers only the last accepted key and instant, so
//! memory stays constant no matter how much traffic arrives.

use std::time::{Duration, Instant};

use tracing::debug;

/// Default rate limit for snapshot updates.
pub const SNAPSHOT_WINDOW: Duration = Duration::from_millis(100);
/// Default window for identical log text.
pub const LOG_WINDOW: Duration = Duration::from_millis(1000);
/// Default window for identical `(sender, message)` chat lines.
pub const CHAT_WINDOW: Duration = Duration::from_millis(1000);

/// A single-slot "seen recently" gate.
///
/// A delivery is suppressed when its key equals the last accepted key and it
/// arrives strictly inside `window` of that acceptance. Suppressed deliveries
/// do not refresh the window.
#[derive(Debug, Clone)]
pub struct DedupWindow<K> {
    window: Duration,
    last: Option<(K, Instant)>,
}

impl<K: PartialEq> DedupWindow<K> {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` if the delivery should be processed.
    pub fn admit(&mut self, key: K, now: Instant) -> bool {
        if let Some((last_key, at)) = &self.last {
            if *last_key == key && now.saturating_duration_since(*at) < self.window {
                return false;
            }
        }
        self.last = Some((key, now));
        true
    }
}

/// Per-category windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupWindows {
    pub snapshot: Duration,
    pub log: Duration,
    pub chat: Duration,
}

impl Default for DedupWindows {
    fn default() -> Self {
        Self {
            snapshot: SNAPSHOT_WINDOW,
            log: LOG_WINDOW,
            chat: CHAT_WINDOW,
        }
    }
}

/// The three delivery gates of a session.
#[derive(Debug, Clone)]
pub struct DeliveryGate {
    // Snapshots are rate-limited regardless of content, so the key is unit.
    snapshot: DedupWindow<()>,
    log: DedupWindow<String>,
    chat: DedupWindow<(String, String)>,
}

impl DeliveryGate {
    pub fn new(windows: DedupWindows) -> Self {
        Self {
            snapshot: DedupWindow::new(windows.snapshot),
            log: DedupWindow::new(windows.log),
            chat: DedupWindow::new(windows.chat),
        }
    }

    pub fn admit_snapshot(&mut self, now: Instant) -> bool {
        let admitted = self.snapshot.admit((), now);
        if !admitted {
            debug!("snapshot suppressed by rate limit");
        }
        admitted
    }

    pub fn admit_log(&mut self, message: &str, now: Instant) -> bool {
        let admitted = self.log.admit(message.to_string(), now);
        if !admitted {
            debug!(message, "duplicate log line suppressed");
        }
        admitted
    }

    pub fn admit_chat(&mut self, sender: &str, message: &str, now: Instant) -> bool {
        let admitted = self
            .chat
            .admit((sender.to_string(), message.to_string()), now);
        if !admitted {
            debug!(sender, message, "duplicate chat line suppressed");
        }
        admitted
    }
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new(DedupWindows::default())
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

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn identical_log_inside_window_is_dropped() {
        let t0 = Instant::now();
        let mut gate = DeliveryGate::default();
        assert!(gate.admit_log("A팀 공격!", t0));
        assert!(!gate.admit_log("A팀 공격!", at(t0, 500)));
        assert!(gate.admit_log("A팀 공격!", at(t0, 1500)));
    }

    #[test]
    fn different_log_text_is_always_admitted() {
        let t0 = Instant::now();
        let mut gate = DeliveryGate::default();
        assert!(gate.admit_log("first", t0));
        assert!(gate.admit_log("second", at(t0, 10)));
        // The window now tracks "second"; "first" is new again.
        assert!(gate.admit_log("first", at(t0, 20)));
    }

    #[test]
    fn suppressed_delivery_does_not_extend_window() {
        let t0 = Instant::now();
        let mut gate = DeliveryGate::default();
        assert!(gate.admit_log("x", t0));
        assert!(!gate.admit_log("x", at(t0, 900)));
        assert!(gate.admit_log("x", at(t0, 1000)));
    }

    #[test]
    fn snapshots_are_rate_limited_regardless_of_content() {
        let t0 = Instant::now();
        let mut gate = DeliveryGate::default();
        assert!(gate.admit_snapshot(t0));
        assert!(!gate.admit_snapshot(at(t0, 99)));
        assert!(gate.admit_snapshot(at(t0, 100)));
    }

    #[test]
    fn chat_key_is_sender_and_message() {
        let t0 = Instant::now();
        let mut gate = DeliveryGate::default();
        assert!(gate.admit_chat("Harry", "hi", t0));
        assert!(!gate.admit_chat("Harry", "hi", at(t0, 300)));
        assert!(gate.admit_chat("Ron", "hi", at(t0, 400)));
        assert!(gate.admit_chat("Harry", "hi", at(t0, 500)));
    }

    #[test]
    fn custom_windows_apply() {
        let t0 = Instant::now();
        let mut gate = DeliveryGate::new(DedupWindows {
            log: Duration::from_millis(50),
            ..DedupWindows::default()
        });
        assert!(gate.admit_log("x", t0));
        assert!(gate.admit_log("x", at(t0, 60)));
    }
}
