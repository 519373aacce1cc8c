use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::self_monitor::{HealthThresholds, SamplingMode, DEFAULT_PUSH_INTERVAL};
use crate::error::{Result, SelfmonError};

/// Persisted monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub host: String,
    pub port: u16,
    /// Interval between pushes to each live subscriber
    pub push_interval_ms: u64,
    pub sampling_mode: SamplingMode,
    pub thresholds: HealthThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            push_interval_ms: DEFAULT_PUSH_INTERVAL.as_millis() as u64,
            sampling_mode: SamplingMode::default(),
            thresholds: HealthThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from the default location, falling back to defaults when the
    /// file is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`. A missing or empty file yields defaults; a file that
    /// no longer parses is replaced by defaults with a warning.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        match serde_json::from_str(&data) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable config file {}: {}",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SelfmonError::config("Could not determine config directory"))?;

        Ok(config_dir.join("selfmon").join("config.json"))
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.push_interval_ms == 0 {
            return Err(SelfmonError::config("push_interval_ms must be greater than 0"));
        }
        if self.port == 0 {
            return Err(SelfmonError::config("port must be greater than 0"));
        }
        if self.host.trim().is_empty() {
            return Err(SelfmonError::config("host must not be empty"));
        }
        if let Some(metric) = self.thresholds.inverted() {
            return Err(SelfmonError::config(format!(
                "{} warning threshold exceeds its critical threshold",
                metric
            )));
        }
        Ok(())
    }
}
