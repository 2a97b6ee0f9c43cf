//! Flat JSON state persisted between runs.
//!
//! One document per concern in the state directory. Everything is read
//! once when a run starts and written once when it ends. A missing or
//! unreadable document is replaced by its default; it never fails a run.

use crate::message::Message;
use crate::types::{AlertState, ChangelogEntry, MessageHandle};
use common::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use statuscheck::{HistoryEntry, StatusCache};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MESSAGE_FILE: &str = "message.json";
pub const LAST_PAYLOAD_FILE: &str = "last_payload.json";
pub const HISTORY_FILE: &str = "history.json";
pub const LATENCY_FILE: &str = "latency.json";
pub const STATUS_CACHE_FILE: &str = "status_cache.json";
pub const CHANGELOG_FILE: &str = "changelog.json";
pub const ALERTS_FILE: &str = "alerts.json";

/// Everything a run reads at start and writes at end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub handle: Option<MessageHandle>,
    pub last_payload: Option<Message>,
    pub history: Vec<HistoryEntry>,
    /// Region → mean latency of the previous run
    pub latency: BTreeMap<String, f64>,
    pub status_cache: StatusCache,
    pub changelog: Vec<ChangelogEntry>,
    pub alerts: AlertState,
}

/// State directory accessor
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read one document; `None` when missing or corrupt.
    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.path(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "State file missing, using default");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable state file, using default");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt state file, using default");
                None
            }
        }
    }

    /// Write one document through a temp file and rename.
    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let tmp = self.path(&format!("{}.tmp", name));
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_optional<T: Serialize>(&self, name: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.write_json(name, value),
            None => self.remove(name),
        }
    }

    /// Load all documents, substituting defaults.
    pub fn load(&self) -> PersistedState {
        PersistedState {
            handle: self.read_json(MESSAGE_FILE),
            last_payload: self.read_json(LAST_PAYLOAD_FILE),
            history: self.read_json(HISTORY_FILE).unwrap_or_default(),
            latency: self.read_json(LATENCY_FILE).unwrap_or_default(),
            status_cache: self.read_json(STATUS_CACHE_FILE).unwrap_or_default(),
            changelog: self.read_json(CHANGELOG_FILE).unwrap_or_default(),
            alerts: self.read_json(ALERTS_FILE).unwrap_or_default(),
        }
    }

    /// Persist all documents.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::state(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        self.write_optional(MESSAGE_FILE, state.handle.as_ref())?;
        self.write_optional(LAST_PAYLOAD_FILE, state.last_payload.as_ref())?;
        self.write_json(HISTORY_FILE, &state.history)?;
        self.write_json(LATENCY_FILE, &state.latency)?;
        self.write_json(STATUS_CACHE_FILE, &state.status_cache)?;
        self.write_json(CHANGELOG_FILE, &state.changelog)?;
        self.write_json(ALERTS_FILE, &state.alerts)?;

        debug!(dir = %self.dir.display(), "State saved");
        Ok(())
    }
}
