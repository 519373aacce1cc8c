// Selfmon Library - Public API

// Re-export error types
pub mod error;
pub use error::{Result, SelfmonError};

// Module declarations
pub mod commands;
pub mod core;
pub mod server;
pub mod ui;

// Re-export commonly used types
pub use core::config::MonitorConfig;
pub use core::self_monitor::{BroadcastHub, Monitor, Snapshot};

// Initialize logging
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
