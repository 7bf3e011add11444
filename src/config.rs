//! Configuration types for the heartbeat scheduler.

use crate::heartbeat_dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Smallest tick interval the runner accepts.
const MIN_TICK_INTERVAL_SECS: u64 = 1;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Path to the Markdown schedule definition (None = `HEARTBEAT.md` in
    /// the config directory).
    pub definition_path: Option<PathBuf>,
    /// Path to the persisted run-state file (None = `heartbeat_state.json`
    /// in the config directory).
    pub state_path: Option<PathBuf>,
    /// Tick loop settings.
    pub runner: RunnerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Tick loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Seconds between scheduler ticks.
    pub tick_interval_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for daily-rolling log files (None = stderr only).
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "heartbeat=info".to_owned(),
            log_dir: None,
        }
    }
}

impl HeartbeatConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::HeartbeatError::Config(e.to_string()))
    }

    /// Load the config at [`Self::default_config_path`], falling back to
    /// defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default() -> crate::error::Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::HeartbeatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        heartbeat_dirs::config_file()
    }

    /// Resolved definition path.
    pub fn definition_path(&self) -> PathBuf {
        self.definition_path
            .clone()
            .unwrap_or_else(heartbeat_dirs::definition_file)
    }

    /// Resolved run-state path.
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(heartbeat_dirs::state_file)
    }

    /// Tick interval, clamped to at least one second.
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.runner.tick_interval_secs.max(MIN_TICK_INTERVAL_SECS))
    }
}
