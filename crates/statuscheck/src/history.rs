//! Rolling run history and uptime ratios.

use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// One sample per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub ok: bool,

    /// Per-subject levels for this run
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subjects: BTreeMap<String, Severity>,
}

impl HistoryEntry {
    pub fn new(timestamp: DateTime<Utc>, ok: bool) -> Self {
        Self {
            timestamp,
            ok,
            subjects: BTreeMap::new(),
        }
    }
}

/// Bounded FIFO of history entries.
///
/// The length never exceeds `cap`; appending to a full buffer drops the
/// oldest entry.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    cap: usize,
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: VecDeque::with_capacity(cap.min(4096)),
        }
    }

    /// Rebuild from persisted entries, keeping only the newest `cap`.
    pub fn from_entries(entries: Vec<HistoryEntry>, cap: usize) -> Self {
        let mut entries = VecDeque::from(entries);
        while entries.len() > cap {
            entries.pop_front();
        }
        Self { cap, entries }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Push a sample, evicting from the front past the cap.
    pub fn append(&mut self, entry: HistoryEntry) -> &Self {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
        self
    }

    /// Percentage of ok samples among the newest `window` entries.
    ///
    /// The window shrinks to the history length; an empty window is 0.
    pub fn uptime(&self, window: usize) -> u8 {
        let window = window.min(self.entries.len());
        if window == 0 {
            return 0;
        }
        let ok = self.entries.iter().rev().take(window).filter(|e| e.ok).count();
        (100.0 * ok as f64 / window as f64).round() as u8
    }

    /// Owned entries for persisting.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}
