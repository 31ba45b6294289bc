//! Configuration management for docqueue.
//!
//! Settings come from a TOML file with environment overrides. Lookup order:
//! an explicit `--config` path, `$DOCQUEUE_CONFIG`, then
//! `<config dir>/docqueue/config.toml`. Missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::repository::context::Tuning;

/// Environment variable overriding the database path.
const ENV_DATABASE: &str = "DOCQUEUE_DB";
/// Environment variable pointing at the settings file.
const ENV_CONFIG: &str = "DOCQUEUE_CONFIG";

/// Queue tuning section of the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Files claimed per batch by default.
    pub claim_batch_size: u32,
    /// Worker heartbeat refresh interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat age after which a session is presumed dead.
    pub session_timeout_secs: i64,
    /// Minimum interval between lease sweeps from one process.
    pub sweep_min_interval_secs: u64,
    /// How long a statistics consolidation may be reused.
    pub stats_staleness_secs: i64,
    /// Attempts per unit of work on transient store failures.
    pub retry_attempts: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            claim_batch_size: 10,
            heartbeat_interval_secs: 15,
            session_timeout_secs: 90,
            sweep_min_interval_secs: 30,
            stats_staleness_secs: 30,
            retry_attempts: 3,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database path.
    pub database_path: PathBuf,
    pub queue: QueueSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            queue: QueueSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, applying environment overrides.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match settings_path(explicit) {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(&path)?;
                toml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid settings file {}: {e}", path.display()))?
            }
            Some(path) if explicit.is_some() => {
                anyhow::bail!("settings file not found: {}", path.display())
            }
            _ => Settings::default(),
        };

        if let Ok(db) = std::env::var(ENV_DATABASE) {
            settings.database_path = PathBuf::from(db);
        }
        Ok(settings)
    }

    /// Repository tuning derived from these settings.
    pub fn tuning(&self) -> Tuning {
        Tuning {
            session_timeout_secs: self.queue.session_timeout_secs,
            sweep_min_interval_secs: self.queue.sweep_min_interval_secs,
            stats_staleness_secs: self.queue.stats_staleness_secs,
            retry_attempts: self.queue.retry_attempts,
        }
    }

    /// Heartbeat interval as a duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.queue.heartbeat_interval_secs)
    }
}

/// Resolve the settings file path, if any.
fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("docqueue").join("config.toml"))
}

/// Default database location under the platform data directory.
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docqueue")
        .join("queue.sqlite")
}
