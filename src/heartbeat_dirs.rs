//! Centralized directory paths for the heartbeat scheduler.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/heartbeat/` | `~/.config/heartbeat/` |
//! | Data | `~/Library/Application Support/heartbeat/` | `~/.local/share/heartbeat/` |
//!
//! # Environment Overrides
//!
//! - `HEARTBEAT_CONFIG_DIR`: overrides [`config_dir`]
//! - `HEARTBEAT_DATA_DIR`: overrides [`data_dir`]

use std::path::PathBuf;

/// Application config directory.
///
/// Holds `config.toml`, the `HEARTBEAT.md` definition and the run-state file.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HEARTBEAT_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("heartbeat"))
        .unwrap_or_else(|| PathBuf::from("/tmp/heartbeat-config"))
}

/// Application data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("HEARTBEAT_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("heartbeat"))
        .unwrap_or_else(|| PathBuf::from("/tmp/heartbeat-data"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Schedule definition path (`config_dir()/HEARTBEAT.md`).
#[must_use]
pub fn definition_file() -> PathBuf {
    config_dir().join("HEARTBEAT.md")
}

/// Run-state file path (`config_dir()/heartbeat_state.json`).
#[must_use]
pub fn state_file() -> PathBuf {
    config_dir().join("heartbeat_state.json")
}
