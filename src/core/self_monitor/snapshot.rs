//! Snapshot value and its assembly from raw readings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::health::{classify, HealthThresholds, HealthTier};
use super::probe::{HostReading, NetworkInterface};
use super::state::TrafficReading;
use crate::ui::format_size;

/// One immutable measurement of process, host and traffic state.
///
/// Field names are the JSON contract consumed by dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Unix milliseconds at build time
    pub timestamp: i64,
    pub cpu: u8,
    pub cpu_count: usize,
    pub load_average: [f64; 3],
    pub memory_rss: u64,
    pub memory_rss_human: String,
    pub sys_mem_total: u64,
    pub sys_mem_total_human: String,
    pub sys_mem_free: u64,
    pub sys_mem_free_human: String,
    pub sys_mem_percent: f64,
    pub disk_percent: f64,
    pub health: HealthTier,
    pub health_color: String,
    pub total_requests: u64,
    pub rpm: u64,
    pub rps: f64,
    pub rph: u64,
    pub avg_lifetime_rpm: f64,
    pub avg_response_ms: u64,
    pub min_response_ms: u64,
    pub max_response_ms: u64,
    pub error_count: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub status_codes: BTreeMap<String, u64>,
    pub endpoints: BTreeMap<String, u64>,
    pub active_connections: u64,
    pub total_bytes_received: u64,
    pub total_bytes_received_human: String,
    pub total_bytes_sent: u64,
    pub total_bytes_sent_human: String,
    pub process_uptime_sec: u64,
    pub system_uptime_sec: u64,
    pub last_request_at: Option<i64>,
    pub hostname: String,
    pub platform: String,
    pub pid: u32,
    pub network_interfaces: Vec<NetworkInterface>,
}

/// Everything a snapshot is derived from, captured at one instant.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInputs {
    pub timestamp_millis: i64,
    pub cpu_percent: u8,
    pub process_uptime: Duration,
    pub traffic: TrafficReading,
    pub host: HostReading,
}

/// Pure assembly of a [`Snapshot`] from its inputs.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    thresholds: HealthThresholds,
}

impl SnapshotBuilder {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    pub fn assemble(&self, inputs: SnapshotInputs) -> Snapshot {
        let SnapshotInputs {
            timestamp_millis,
            cpu_percent,
            process_uptime,
            traffic,
            host,
        } = inputs;

        let total = traffic.total_requests;
        let uptime_secs = process_uptime.as_secs();

        let avg_response_ms = if total > 0 {
            (traffic.total_response_time_ms as f64 / total as f64).round() as u64
        } else {
            0
        };
        let (success_rate, error_rate) = if total > 0 {
            let errors = traffic.error_count.min(total);
            (
                round_to(100.0 * (total - errors) as f64 / total as f64, 1),
                round_to(100.0 * errors as f64 / total as f64, 1),
            )
        } else {
            (100.0, 0.0)
        };
        let uptime_minutes = (uptime_secs as f64 / 60.0).max(1.0);

        let mem = host.memory;
        let sys_mem_percent = if mem.total_bytes > 0 {
            let used = mem.total_bytes.saturating_sub(mem.free_bytes);
            round_to(100.0 * used as f64 / mem.total_bytes as f64, 1)
        } else {
            0.0
        };
        let disk_percent = round_to(host.disk_percent, 1);
        let health = classify(
            f64::from(cpu_percent),
            sys_mem_percent,
            disk_percent,
            &self.thresholds,
        );

        Snapshot {
            timestamp: timestamp_millis,
            cpu: cpu_percent,
            cpu_count: host.info.cpu_count,
            load_average: host.info.load_average,
            memory_rss: host.process_rss,
            memory_rss_human: format_size(host.process_rss),
            sys_mem_total: mem.total_bytes,
            sys_mem_total_human: format_size(mem.total_bytes),
            sys_mem_free: mem.free_bytes,
            sys_mem_free_human: format_size(mem.free_bytes),
            sys_mem_percent,
            disk_percent,
            health,
            health_color: health.color().to_string(),
            total_requests: total,
            rpm: traffic.requests_last_minute,
            rps: round_to(traffic.requests_last_minute as f64 / 60.0, 2),
            rph: traffic.requests_last_hour,
            avg_lifetime_rpm: round_to(total as f64 / uptime_minutes, 2),
            avg_response_ms,
            min_response_ms: traffic.min_response_time_ms.unwrap_or(0),
            max_response_ms: traffic.max_response_time_ms,
            error_count: traffic.error_count,
            success_rate,
            error_rate,
            status_codes: traffic.status_code_counts,
            endpoints: traffic.endpoint_counts,
            active_connections: traffic.active_connections,
            total_bytes_received: traffic.total_bytes_received,
            total_bytes_received_human: format_size(traffic.total_bytes_received),
            total_bytes_sent: traffic.total_bytes_sent,
            total_bytes_sent_human: format_size(traffic.total_bytes_sent),
            process_uptime_sec: uptime_secs,
            system_uptime_sec: host.info.uptime_secs,
            last_request_at: traffic.last_request_at,
            hostname: host.info.hostname,
            platform: host.info.platform,
            pid: std::process::id(),
            network_interfaces: host.network_interfaces,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
