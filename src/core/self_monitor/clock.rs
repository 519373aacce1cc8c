//! Time sources for the metrics core.
//!
//! Wall-clock time stamps snapshots and requests; monotonic time drives the
//! sliding windows and process uptime so a wall-clock jump can never reorder
//! recorded events.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Wall-clock and monotonic timer abstraction.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Milliseconds elapsed since the clock was created. Never decreases.
    fn monotonic_millis(&self) -> u64;
}

/// Clock backed by the operating system.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn monotonic_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock driven by hand, for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    wall_millis: AtomicI64,
    monotonic_millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock whose wall time starts at `wall_millis` and whose
    /// monotonic time starts at zero.
    pub fn new(wall_millis: i64) -> Self {
        Self {
            wall_millis: AtomicI64::new(wall_millis),
            monotonic_millis: AtomicU64::new(0),
        }
    }

    /// Move both time lines forward.
    pub fn advance(&self, by: Duration) {
        let ms = by.as_millis() as u64;
        self.monotonic_millis.fetch_add(ms, Ordering::SeqCst);
        self.wall_millis.fetch_add(ms as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.wall_millis.load(Ordering::SeqCst)
    }

    fn monotonic_millis(&self) -> u64 {
        self.monotonic_millis.load(Ordering::SeqCst)
    }
}
