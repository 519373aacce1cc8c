//! `selfmon watch`: subscribe a console subscriber to the hub.
//!
//! Useful for checking the push loop without an HTTP client.

use anyhow::Result;
use clap::ArgMatches;

use super::config::effective_config;
use crate::core::self_monitor::{BroadcastHub, Monitor};
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = effective_config(matches)?;
    let count = matches.get_one::<usize>("count").copied();
    let json_output = matches.get_flag("json");

    let runtime = super::build_runtime()?;
    runtime.block_on(async move {
        let monitor = Monitor::builder()
            .thresholds(config.thresholds)
            .sampling_mode(config.sampling_mode)
            .build();
        let hub = BroadcastHub::new(monitor, config.push_interval());
        let mut subscription = hub.subscribe();
        let mut received = 0usize;

        loop {
            let snapshot = tokio::select! {
                next = subscription.recv() => match next {
                    Some(snapshot) => snapshot,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            };

            if json_output {
                println!("{}", serde_json::to_string(snapshot.as_ref())?);
            } else {
                println!("{}", ui::format_summary_line(&snapshot));
            }

            received += 1;
            if count.is_some_and(|limit| received >= limit) {
                break;
            }
        }

        drop(subscription);
        hub.shutdown();
        Ok::<(), anyhow::Error>(())
    })
}
