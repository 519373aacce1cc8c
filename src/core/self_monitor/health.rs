//! Health tier classification.
//!
//! Maps instantaneous CPU, memory and disk usage onto a coarse tier. Tiers
//! are evaluated most severe first and recomputed on every call.

use serde::{Deserialize, Serialize};

/// Threshold configuration, in percent. A value strictly above a threshold
/// trips the tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub disk_warning: f64,
    pub disk_critical: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 70.0,
            cpu_critical: 90.0,
            memory_warning: 70.0,
            memory_critical: 90.0,
            disk_warning: 80.0,
            disk_critical: 95.0,
        }
    }
}

impl HealthThresholds {
    /// Name of the first metric whose warning threshold exceeds its critical one.
    pub fn inverted(&self) -> Option<&'static str> {
        if self.cpu_warning > self.cpu_critical {
            Some("cpu")
        } else if self.memory_warning > self.memory_critical {
            Some("memory")
        } else if self.disk_warning > self.disk_critical {
            Some("disk")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthTier {
    Healthy,
    Warning,
    Critical,
}

impl HealthTier {
    /// Display color for dashboards.
    pub fn color(self) -> &'static str {
        match self {
            HealthTier::Healthy => "#22c55e",
            HealthTier::Warning => "#f59e0b",
            HealthTier::Critical => "#ef4444",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthTier::Healthy => "HEALTHY",
            HealthTier::Warning => "WARNING",
            HealthTier::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for HealthTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify usage percentages into a health tier.
pub fn classify(cpu: f64, memory: f64, disk: f64, thresholds: &HealthThresholds) -> HealthTier {
    if cpu > thresholds.cpu_critical
        || memory > thresholds.memory_critical
        || disk > thresholds.disk_critical
    {
        HealthTier::Critical
    } else if cpu > thresholds.cpu_warning
        || memory > thresholds.memory_warning
        || disk > thresholds.disk_warning
    {
        HealthTier::Warning
    } else {
        HealthTier::Healthy
    }
}
