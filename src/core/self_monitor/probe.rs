//! Host and process introspection.
//!
//! Every query is individually fallible; [`HostReading::collect`] turns a
//! failed query into a zeroed or empty field so a snapshot always succeeds.

use serde::{Deserialize, Serialize};
use sysinfo::{
    Disks, MemoryRefreshKind, Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System,
};

use crate::error::{Result, SelfmonError};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryReading {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Mostly static facts about the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostInfo {
    pub hostname: String,
    pub platform: String,
    pub cpu_count: usize,
    pub load_average: [f64; 3],
    pub uptime_secs: u64,
}

/// Source of host and process figures.
pub trait HostProbe: Send {
    fn memory(&mut self) -> Result<MemoryReading>;
    fn process_rss(&mut self) -> Result<u64>;
    fn disk_percent(&mut self) -> Result<f64>;
    fn network_interfaces(&mut self) -> Result<Vec<NetworkInterface>>;
    fn host_info(&mut self) -> HostInfo;
}

/// Host figures with failed queries already degraded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostReading {
    pub memory: MemoryReading,
    pub process_rss: u64,
    pub disk_percent: f64,
    pub network_interfaces: Vec<NetworkInterface>,
    pub info: HostInfo,
}

impl HostReading {
    pub fn collect(probe: &mut dyn HostProbe) -> Self {
        Self {
            memory: degrade("memory", probe.memory()),
            process_rss: degrade("process rss", probe.process_rss()),
            disk_percent: degrade("disk usage", probe.disk_percent()),
            network_interfaces: degrade("network interfaces", probe.network_interfaces()),
            info: probe.host_info(),
        }
    }
}

fn degrade<T: Default>(what: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        log::debug!("Introspection of {} degraded: {}", what, e);
        T::default()
    })
}

/// [`HostProbe`] backed by `sysinfo`.
pub struct SysinfoProbe {
    system: System,
    disks: Disks,
    networks: Networks,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_memory(MemoryRefreshKind::nothing().with_ram())
            .with_cpu(sysinfo::CpuRefreshKind::nothing());

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                log::debug!("Current pid unavailable: {}", e);
                None
            }
        };

        Self {
            system: System::new_with_specifics(refresh_kind),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn memory(&mut self) -> Result<MemoryReading> {
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());

        Ok(MemoryReading {
            total_bytes: self.system.total_memory(),
            free_bytes: self.system.available_memory(),
        })
    }

    fn process_rss(&mut self) -> Result<u64> {
        let pid = self
            .pid
            .ok_or_else(|| SelfmonError::introspection("current pid unknown"))?;

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        self.system
            .process(pid)
            .map(|process| process.memory())
            .ok_or_else(|| SelfmonError::introspection(format!("process {} not listed", pid)))
    }

    fn disk_percent(&mut self) -> Result<f64> {
        self.disks.refresh(true);

        let disk = self
            .disks
            .iter()
            .find(|disk| disk.mount_point() == std::path::Path::new("/"))
            .or_else(|| self.disks.iter().next())
            .ok_or_else(|| SelfmonError::introspection("no mounted disks"))?;

        let total = disk.total_space();
        if total == 0 {
            return Ok(0.0);
        }
        let used = total.saturating_sub(disk.available_space());
        Ok(used as f64 / total as f64 * 100.0)
    }

    fn network_interfaces(&mut self) -> Result<Vec<NetworkInterface>> {
        self.networks.refresh(true);

        let mut interfaces: Vec<_> = self
            .networks
            .iter()
            .map(|(name, data)| NetworkInterface {
                name: name.to_string(),
                rx_bytes: data.total_received(),
                tx_bytes: data.total_transmitted(),
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }

    fn host_info(&mut self) -> HostInfo {
        let load = System::load_average();

        HostInfo {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            platform: std::env::consts::OS.to_string(),
            cpu_count: self.system.cpus().len(),
            load_average: [load.one, load.five, load.fifteen],
            uptime_secs: System::uptime(),
        }
    }
}
