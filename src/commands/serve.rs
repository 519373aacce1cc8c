//! `selfmon serve`: run the HTTP monitor until Ctrl-C.

use anyhow::{Context, Result};
use clap::ArgMatches;

use super::config::effective_config;
use crate::server;
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = effective_config(matches)?;

    ui::info(&format!(
        "selfmon {} serving on http://{}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address()
    ));
    ui::dimmed("  GET /api/metrics   current snapshot");
    ui::dimmed("  GET /api/stream    live snapshot stream (text/event-stream)");
    ui::dimmed("Press Ctrl-C to stop.");

    let runtime = super::build_runtime()?;
    runtime
        .block_on(server::run_server(&config))
        .context("Server stopped with an error")?;

    ui::success("Server stopped.");
    Ok(())
}
