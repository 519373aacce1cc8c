use std::sync::Arc;

use selfmon::core::self_monitor::{
    CpuTimes, CpuTimesSource, HostInfo, HostProbe, ManualClock, MemoryReading, Monitor,
    NetworkInterface, SamplingMode,
};
use selfmon::{Result, SelfmonError};

pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Host with fixed, moderate figures.
pub struct FakeProbe {
    pub disk_fails: bool,
}

impl HostProbe for FakeProbe {
    fn memory(&mut self) -> Result<MemoryReading> {
        Ok(MemoryReading {
            total_bytes: 8 * 1024 * 1024 * 1024,
            free_bytes: 6 * 1024 * 1024 * 1024,
        })
    }

    fn process_rss(&mut self) -> Result<u64> {
        Ok(32 * 1024 * 1024)
    }

    fn disk_percent(&mut self) -> Result<f64> {
        if self.disk_fails {
            return Err(SelfmonError::introspection("statfs failed"));
        }
        Ok(40.0)
    }

    fn network_interfaces(&mut self) -> Result<Vec<NetworkInterface>> {
        Ok(vec![NetworkInterface {
            name: "eth0".to_string(),
            rx_bytes: 1000,
            tx_bytes: 2000,
        }])
    }

    fn host_info(&mut self) -> HostInfo {
        HostInfo {
            hostname: "test-host".to_string(),
            platform: "linux".to_string(),
            cpu_count: 2,
            load_average: [0.5, 0.25, 0.1],
            uptime_secs: 3600,
        }
    }
}

/// Each read adds `busy` busy ticks and `idle` idle ticks to every core.
pub struct TickingSource {
    pub busy: u64,
    pub idle: u64,
    total_busy: u64,
    total_idle: u64,
}

impl TickingSource {
    pub fn new(busy: u64, idle: u64) -> Self {
        Self {
            busy,
            idle,
            total_busy: 0,
            total_idle: 0,
        }
    }
}

impl CpuTimesSource for TickingSource {
    fn read(&mut self) -> Result<Vec<CpuTimes>> {
        self.total_busy += self.busy;
        self.total_idle += self.idle;
        let core = CpuTimes {
            user: self.total_busy,
            idle: self.total_idle,
            ..Default::default()
        };
        Ok(vec![core, core])
    }
}

pub fn fake_monitor(mode: SamplingMode) -> (Monitor, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let monitor = Monitor::builder()
        .clock(clock.clone())
        .cpu_source(Box::new(TickingSource::new(25, 75)))
        .probe(Box::new(FakeProbe { disk_fails: false }))
        .sampling_mode(mode)
        .build();
    (monitor, clock)
}
