use chrono::{Local, TimeZone};

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

/// Format a byte count in human-readable form (B, KB, MB, GB), base 1024
pub fn format_size(size: u64) -> String {
    let bytes = size as f64;
    if bytes < KB {
        format!("{} B", size)
    } else if bytes < MB {
        format!("{:.2} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.2} MB", bytes / MB)
    } else {
        format!("{:.2} GB", bytes / GB)
    }
}

/// Format a number of seconds as a compact uptime (e.g. `2d 03h 04m`, `5m 07s`)
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a Unix millisecond timestamp as local wall time (HH:MM:SS)
pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(datetime) => datetime.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
