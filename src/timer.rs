//! Display countdown kept in step with authoritative time pushes.
//!
//! The server sends the remaining turn time only occasionally. Between pushes
//! the display counts down locally once per second. Every push replaces the
//! running countdown outright; the local value is never used for game logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::snapshot::Phase;

/// Minimum displayed value during the inter-round wait.
pub const INTER_PHASE_FLOOR_SEC: u32 = 5;

/// Interval between local decrements.
pub const TICK: Duration = Duration::from_secs(1);

/// The value the display starts from after an authoritative push.
///
/// ```
/// use battle_sync_client::snapshot::Phase;
/// use battle_sync_client::timer::countdown_start;
///
/// assert_eq!(countdown_start(2, &Phase::Inter), 5);
/// assert_eq!(countdown_start(2, &Phase::TeamAction), 2);
/// assert_eq!(countdown_start(-3, &Phase::TeamAction), 0);
/// ```
pub fn countdown_start(time_left_sec: i64, phase: &Phase) -> u32 {
    let t = u32::try_from(time_left_sec.max(0)).unwrap_or(u32::MAX);
    if *phase == Phase::Inter && t < INTER_PHASE_FLOOR_SEC {
        INTER_PHASE_FLOOR_SEC
    } else {
        t
    }
}

/// Owner of the single local countdown task.
///
/// At most one countdown runs at a time. A generation counter guards the
/// shared display value so a superseded task can never write after the next
/// push, even if it was mid-tick when aborted.
#[derive(Debug)]
pub struct TimerSync {
    display: watch::Sender<u32>,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl TimerSync {
    pub fn new() -> Self {
        let (display, _) = watch::channel(0);
        Self {
            display,
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Subscribe to the displayed seconds.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.display.subscribe()
    }

    /// Currently displayed seconds.
    pub fn remaining(&self) -> u32 {
        *self.display.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Apply an authoritative push: cancel the running countdown, publish the
    /// new start value and begin ticking from it. Returns the start value.
    ///
    /// Outside a Tokio runtime the start value is published but nothing ticks.
    pub fn sync(&mut self, time_left_sec: i64, phase: &Phase) -> u32 {
        self.cancel();
        let start = countdown_start(time_left_sec, phase);
        let generation = self.generation.load(Ordering::Acquire);
        self.display.send_replace(start);
        debug!(start, phase = phase.as_str(), "countdown resynchronised");

        if start == 0 {
            return start;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(start, "no runtime; countdown will not tick");
            return start;
        };
        let display = self.display.clone();
        let current = Arc::clone(&self.generation);
        let first_tick = tokio::time::Instant::now() + TICK;
        self.task = Some(runtime.spawn(run_countdown(
            display, current, generation, first_tick,
        )));
        start
    }

    /// Stop the countdown, leaving the display at its last value.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Default for TimerSync {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerSync {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_countdown(
    display: watch::Sender<u32>,
    current: Arc<AtomicU64>,
    generation: u64,
    first_tick: tokio::time::Instant,
) {
    let mut interval = tokio::time::interval_at(first_tick, TICK);
    loop {
        interval.tick().await;
        let mut remaining = 0;
        let ticked = display.send_if_modified(|secs| {
            if current.load(Ordering::Acquire) != generation || *secs == 0 {
                return false;
            }
            *secs -= 1;
            remaining = *secs;
            true
        });
        if !ticked || remaining == 0 {
            break;
        }
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

    async fn advance_secs(secs: u64) {
        for _ in 0..secs {
            tokio::time::advance(TICK).await;
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn inter_phase_floor_only_applies_below_five() {
        assert_eq!(countdown_start(2, &Phase::Inter), 5);
        assert_eq!(countdown_start(0, &Phase::Inter), 5);
        assert_eq!(countdown_start(8, &Phase::Inter), 8);
        assert_eq!(countdown_start(2, &Phase::parse("team_action")), 2);
        assert_eq!(countdown_start(-1, &Phase::Resolve), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second_and_stops_at_zero() {
        let mut timer = TimerSync::new();
        assert_eq!(timer.sync(3, &Phase::TeamAction), 3);
        assert_eq!(timer.remaining(), 3);

        advance_secs(1).await;
        assert_eq!(timer.remaining(), 2);

        advance_secs(5).await;
        assert_eq!(timer.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_supersedes_running_countdown() {
        let mut timer = TimerSync::new();
        timer.sync(10, &Phase::TeamAction);
        advance_secs(3).await;
        assert_eq!(timer.remaining(), 7);

        timer.sync(30, &Phase::TeamAction);
        assert_eq!(timer.remaining(), 30);
        advance_secs(2).await;
        // A leftover task would have decremented twice as fast.
        assert_eq!(timer.remaining(), 28);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_freezes_display() {
        let mut timer = TimerSync::new();
        timer.sync(5, &Phase::TeamAction);
        advance_secs(1).await;
        timer.cancel();
        advance_secs(3).await;
        assert_eq!(timer.remaining(), 4);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_updates() {
        let mut timer = TimerSync::new();
        let mut rx = timer.subscribe();
        timer.sync(2, &Phase::Inter);
        assert_eq!(*rx.borrow_and_update(), 5);
        advance_secs(1).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 4);
    }

    #[test]
    fn sync_without_runtime_publishes_start_only() {
        let mut timer = TimerSync::new();
        assert_eq!(timer.sync(12, &Phase::TeamAction), 12);
        assert_eq!(timer.remaining(), 12);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_start_spawns_nothing() {
        let mut timer = TimerSync::new();
        let mut rx = timer.subscribe();
        assert_eq!(timer.sync(0, &Phase::Resolve), 0);
        assert!(!timer.is_running());
        rx.borrow_and_update();

        advance_secs(3).await;
        let mut changed = tokio_test::task::spawn(rx.changed());
        tokio_test::assert_pending!(changed.poll());
    }
}
