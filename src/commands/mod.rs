// Command handlers module
pub mod config;
pub mod serve;
pub mod snapshot;
pub mod version;
pub mod watch;

// Re-exports for cleaner imports
pub use version::execute as version;

use anyhow::{Context, Result};

/// Multi-threaded runtime shared by the async commands.
pub fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("selfmon-worker")
        .build()
        .context("Failed to start async runtime")
}
