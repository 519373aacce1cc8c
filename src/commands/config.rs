use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::MonitorConfig;
use crate::core::self_monitor::SamplingMode;
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(),
        Some(("path", _)) => path(),
        Some(("init", sub_matches)) => init(sub_matches.get_flag("force")),
        _ => {
            println!("Use 'selfmon config --help' for more information.");
            Ok(())
        }
    }
}

/// Load the persisted configuration and apply command-line overrides.
///
/// Recognised flags: `host`, `port`, `interval`, `sampling`. Flags that a
/// subcommand does not define are skipped.
pub fn effective_config(matches: &ArgMatches) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::load().context("Failed to load configuration")?;

    if let Some(host) = matches.try_get_one::<String>("host").ok().flatten() {
        config.host = host.clone();
    }
    if let Some(port) = matches.try_get_one::<u16>("port").ok().flatten() {
        config.port = *port;
    }
    if let Some(interval) = matches.try_get_one::<u64>("interval").ok().flatten() {
        config.push_interval_ms = *interval;
    }
    if let Some(mode) = matches.try_get_one::<SamplingMode>("sampling").ok().flatten() {
        config.sampling_mode = *mode;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn show() -> Result<()> {
    let config = MonitorConfig::load().context("Failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn path() -> Result<()> {
    let path = MonitorConfig::config_path()?;
    println!("{}", path.display());
    Ok(())
}

fn init(force: bool) -> Result<()> {
    let path = MonitorConfig::config_path()?;
    if path.exists() && !force {
        ui::warn(&format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
        return Ok(());
    }

    MonitorConfig::default()
        .save_to(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    ui::success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
