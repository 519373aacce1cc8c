//! Delta-based CPU usage sampling.
//!
//! The sampler keeps the previous per-core tick breakdown and reports busy
//! time as the share of non-idle ticks accumulated since the last call.

use crate::error::{Result, SelfmonError};

/// Cumulative tick counters for a single core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub sys: u64,
    pub idle: u64,
    pub irq: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.sys + self.idle + self.irq
    }
}

/// Provider of raw per-core tick counters.
pub trait CpuTimesSource: Send {
    fn read(&mut self) -> Result<Vec<CpuTimes>>;
}

/// Reads `/proc/stat` on Linux.
#[derive(Debug, Default)]
pub struct ProcStatSource;

impl CpuTimesSource for ProcStatSource {
    #[cfg(target_os = "linux")]
    fn read(&mut self) -> Result<Vec<CpuTimes>> {
        let contents = std::fs::read_to_string("/proc/stat")
            .map_err(|e| SelfmonError::introspection(format!("/proc/stat: {}", e)))?;
        let cores = parse_proc_stat(&contents);
        if cores.is_empty() {
            return Err(SelfmonError::introspection("/proc/stat lists no cores"));
        }
        Ok(cores)
    }

    #[cfg(not(target_os = "linux"))]
    fn read(&mut self) -> Result<Vec<CpuTimes>> {
        Err(SelfmonError::introspection(
            "per-core tick counters are not available on this platform",
        ))
    }
}

/// Parse the per-core `cpuN` lines of `/proc/stat`.
///
/// Field order is `user nice system idle iowait irq ...`; the aggregate
/// `cpu` line is skipped. Malformed lines are ignored.
pub fn parse_proc_stat(contents: &str) -> Vec<CpuTimes> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let label = fields.next()?;
            let suffix = label.strip_prefix("cpu")?;
            if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }

            let values: Vec<u64> = fields.map_while(|f| f.parse().ok()).collect();
            if values.len() < 4 {
                return None;
            }

            Some(CpuTimes {
                user: values[0],
                nice: values[1],
                sys: values[2],
                idle: values[3],
                irq: values.get(5).copied().unwrap_or(0),
            })
        })
        .collect()
}

/// Stateful delta calculator over successive tick readings.
///
/// Not synchronised: callers sharing a sampler must serialise `sample` calls.
pub struct CpuSampler {
    source: Box<dyn CpuTimesSource>,
    previous: Option<Vec<CpuTimes>>,
}

impl CpuSampler {
    pub fn new(source: Box<dyn CpuTimesSource>) -> Self {
        Self {
            source,
            previous: None,
        }
    }

    /// Busy percentage across all cores since the previous call, in `0..=100`.
    ///
    /// The first successful call reports 0. A failed read reports 0 and keeps
    /// the stored breakdown.
    pub fn sample(&mut self) -> u8 {
        let current = match self.source.read() {
            Ok(current) => current,
            Err(e) => {
                log::debug!("CPU sample degraded to 0: {}", e);
                return 0;
            }
        };

        let previous = self.previous.as_deref().unwrap_or(&current);
        let percent = busy_percent(previous, &current);
        self.previous = Some(current);
        percent
    }
}

fn busy_percent(previous: &[CpuTimes], current: &[CpuTimes]) -> u8 {
    let (idle_diff, total_diff) = previous.iter().zip(current).fold(
        (0u64, 0u64),
        |(idle, total), (prev, now)| {
            (
                idle + now.idle.saturating_sub(prev.idle),
                total + now.total().saturating_sub(prev.total()),
            )
        },
    );

    if total_diff == 0 {
        return 0;
    }

    let busy = 100.0 * (1.0 - idle_diff as f64 / total_diff as f64);
    busy.round().clamp(0.0, 100.0) as u8
}
