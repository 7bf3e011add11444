//! Run-state persistence.
//!
//! Stores the last completion time of each task as a flat JSON object,
//! `{"task_name": "2026-03-02T07:00:30.125"}`, rewritten in full on every
//! save. Deleting the file resets every task to "never run".
//!
//! There is no locking: two processes sharing one file race, and the last
//! writer wins.

use crate::error::{HeartbeatError, Result};
use crate::heartbeat_dirs;
use chrono::{DateTime, Local, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Last completion time per task name.
pub type RunState = HashMap<String, NaiveDateTime>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// File-backed store for [`RunState`].
#[derive(Debug, Clone)]
pub struct RunStateStore {
    /// `None` keeps state in memory only.
    path: Option<PathBuf>,
}

impl RunStateStore {
    /// Store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    /// Store at the default per-user location.
    pub fn default_location() -> Self {
        Self::new(heartbeat_dirs::state_file())
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load state, treating any failure as "no prior state".
    pub fn load(&self) -> RunState {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!("ignoring unreadable heartbeat state: {e}");
                RunState::new()
            }
        }
    }

    /// Persist state. Failures are logged at debug level and swallowed.
    pub fn save(&self, state: &RunState) {
        if let Err(e) = self.try_save(state) {
            debug!("cannot persist heartbeat state: {e}");
        }
    }

    /// Load state, reporting failures.
    ///
    /// A missing file is not an error. Any malformed entry fails the whole
    /// load.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::State`] if the file cannot be read or parsed.
    pub fn try_load(&self) -> Result<RunState> {
        let Some(path) = &self.path else {
            return Ok(RunState::new());
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RunState::new()),
            Err(e) => {
                return Err(HeartbeatError::State(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        let raw: BTreeMap<String, String> = serde_json::from_slice(&bytes)
            .map_err(|e| HeartbeatError::State(format!("cannot parse {}: {e}", path.display())))?;

        raw.into_iter()
            .map(|(name, ts)| {
                let parsed = parse_timestamp(&ts).ok_or_else(|| {
                    HeartbeatError::State(format!("bad timestamp for '{name}': {ts}"))
                })?;
                Ok::<_, HeartbeatError>((name, parsed))
            })
            .collect()
    }

    /// Persist state, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::State`] if the directory cannot be created,
    /// or the file cannot be written.
    pub fn try_save(&self, state: &RunState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HeartbeatError::State(format!(
                    "cannot create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let sorted: BTreeMap<&str, String> = state
            .iter()
            .map(|(name, ts)| (name.as_str(), format_timestamp(*ts)))
            .collect();
        let json = serde_json::to_string_pretty(&sorted)
            .map_err(|e| HeartbeatError::State(format!("cannot serialize state: {e}")))?;

        std::fs::write(path, json).map_err(|e| {
            HeartbeatError::State(format!("cannot write {}: {e}", path.display()))
        })?;

        Ok(())
    }

    /// Delete the state file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::State`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HeartbeatError::State(format!(
                "cannot delete {}: {e}",
                path.display()
            ))),
        }
    }
}

/// ISO-8601 local timestamp, fractional seconds only when non-zero.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a naive ISO-8601 timestamp, or an RFC 3339 one converted to local time.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = raw.parse::<NaiveDateTime>() {
        return Some(ts);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Local).naive_local())
}
