//! Process-wide CPU sampling loop.
//!
//! In shared mode a single task samples the CPU once per interval and caches
//! the result, so the number of subscribers never changes the delta window.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::monitor::Monitor;

/// Who advances the CPU sampler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// One background loop samples; snapshot builds read the cached value.
    #[default]
    Shared,
    /// Every snapshot build samples, so concurrent subscribers share one
    /// delta state and shorten each other's measurement windows.
    PerSubscriber,
}

impl std::str::FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "shared" => Ok(SamplingMode::Shared),
            "per-subscriber" | "per_subscriber" => Ok(SamplingMode::PerSubscriber),
            other => Err(format!(
                "unknown sampling mode '{}' (expected shared or per-subscriber)",
                other
            )),
        }
    }
}

/// Handle to the running sampling task.
pub struct CpuSamplingLoop {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl CpuSamplingLoop {
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(monitor: Monitor, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sampling_task(monitor, period, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop to stop after its current iteration.
    pub fn stop(&self) {
        // Fails only when the task already exited
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for CpuSamplingLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn sampling_task(
    monitor: Monitor,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    log::debug!("CPU sampling loop started ({} ms)", period.as_millis());

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let percent = monitor.sample_cpu();
                log::trace!("CPU sampled at {}%", percent);
            }
            _ = shutdown.recv() => {
                log::debug!("CPU sampling loop shutting down");
                break;
            }
        }
    }
}
