// Core business logic module

pub mod config;
pub mod self_monitor;

// Re-export commonly used items
pub use config::MonitorConfig;
pub use self_monitor::{BroadcastHub, Monitor, Snapshot};
