//! One-line console rendering of a snapshot.

use colored::{ColoredString, Colorize};

use crate::core::self_monitor::{HealthTier, Snapshot};

use super::formatters::{format_timestamp, format_uptime};

fn paint_health(tier: HealthTier) -> ColoredString {
    match tier {
        HealthTier::Healthy => tier.as_str().green().bold(),
        HealthTier::Warning => tier.as_str().yellow().bold(),
        HealthTier::Critical => tier.as_str().red().bold(),
    }
}

/// Compact status line used by `selfmon watch`.
pub fn format_summary_line(snapshot: &Snapshot) -> String {
    format!(
        "{} {:<8} cpu {:>3}%  mem {:>5.1}%  disk {:>5.1}%  | req {} rpm {} avg {}ms err {:.1}%  | subs {}  rss {}  up {}",
        format_timestamp(snapshot.timestamp).dimmed(),
        paint_health(snapshot.health),
        snapshot.cpu,
        snapshot.sys_mem_percent,
        snapshot.disk_percent,
        snapshot.total_requests,
        snapshot.rpm,
        snapshot.avg_response_ms,
        snapshot.error_rate,
        snapshot.active_connections,
        snapshot.memory_rss_human,
        format_uptime(snapshot.process_uptime_sec),
    )
}
