//! Self-monitoring core.
//!
//! Accumulates request and traffic counters, samples CPU and host usage,
//! assembles snapshots and streams them to live subscribers.

pub mod clock;
pub mod cpu;
pub mod health;
pub mod hub;
mod monitor;
pub mod probe;
mod sampler;
mod snapshot;
pub mod state;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cpu::{CpuSampler, CpuTimes, CpuTimesSource, ProcStatSource};
pub use health::{classify, HealthThresholds, HealthTier};
pub use hub::{
    BroadcastHub, SubscriberId, SubscriberInfo, SubscriberState, Subscription,
    DEFAULT_PUSH_INTERVAL,
};
pub use monitor::{Monitor, MonitorBuilder};
pub use probe::{HostInfo, HostProbe, HostReading, MemoryReading, NetworkInterface, SysinfoProbe};
pub use sampler::{CpuSamplingLoop, SamplingMode};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotInputs};
pub use state::{normalize_path, BodyCounter, MetricsState, RequestHandle, TrafficReading};
pub use window::{SlidingWindowCounter, PER_HOUR, PER_MINUTE};
