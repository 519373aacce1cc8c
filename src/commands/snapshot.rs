//! `selfmon snapshot`: print one snapshot as JSON.

use anyhow::Result;
use clap::ArgMatches;

use crate::core::self_monitor::{Monitor, SamplingMode};

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let pretty = matches.get_flag("pretty");
    let config = super::config::effective_config(matches)?;

    let monitor = Monitor::builder()
        .thresholds(config.thresholds)
        .sampling_mode(SamplingMode::PerSubscriber)
        .build();

    // The first CPU sample only primes the delta state
    monitor.sample_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

    let snapshot = monitor.snapshot();
    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    println!("{}", json);
    Ok(())
}
