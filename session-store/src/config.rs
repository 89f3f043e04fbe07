//! Configuration for the session store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one JSON file per session
    pub data_dir: PathBuf,

    /// Sessions older than this are deleted (hours)
    pub retention_hours: u64,

    /// How often the expiry sweep runs (seconds)
    pub sweep_interval_secs: u64,

    /// Tracking sheet written when a session completes; no export when unset
    pub export_path: Option<PathBuf>,

    /// Settlement configuration
    pub settlement: potsplit_settlement::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.sessions"),
            retention_hours: 24,
            sweep_interval_secs: 60 * 60,
            export_path: None,
            settlement: potsplit_settlement::Config::default(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Retention window
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }

    /// Sweep period
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
