//! Trailing-window event counters.
//!
//! Backs the requests-per-minute and requests-per-hour figures. Stale
//! timestamps are dropped on read, never on record.

use std::collections::VecDeque;
use std::time::Duration;

/// Trailing one-minute window used for requests-per-minute.
pub const PER_MINUTE: Duration = Duration::from_secs(60);

/// Trailing one-hour window used for requests-per-hour.
pub const PER_HOUR: Duration = Duration::from_secs(3600);

/// Timestamp list with fixed retention, pruned lazily from the front.
///
/// Timestamps must be recorded in non-decreasing order, which keeps the
/// oldest entry at the front and makes pruning proportional to the number
/// of stale entries.
#[derive(Debug, Clone)]
pub struct SlidingWindowCounter {
    window_millis: u64,
    events: VecDeque<u64>,
}

impl SlidingWindowCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window_millis: window.as_millis() as u64,
            events: VecDeque::new(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_millis)
    }

    pub fn record(&mut self, timestamp_millis: u64) {
        debug_assert!(
            self.events.back().is_none_or(|&last| last <= timestamp_millis),
            "sliding window timestamps must be recorded in order"
        );
        self.events.push_back(timestamp_millis);
    }

    /// Drop expired events and return how many remain at `now_millis`.
    pub fn count_in_window(&mut self, now_millis: u64) -> usize {
        while let Some(&oldest) = self.events.front() {
            if now_millis.saturating_sub(oldest) >= self.window_millis {
                self.events.pop_front();
            } else {
                break;
            }
        }
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
