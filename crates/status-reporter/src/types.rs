//! Types shared by the reporter, its store and the notifier.

use crate::config::AlertSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statuscheck::{Severity, Thresholds};
use std::collections::VecDeque;
use std::fmt;

/// Settings consumed by a run
#[derive(Debug, Clone)]
pub struct ReporterSettings {
    /// Embed title
    pub title: String,

    /// Overrides the webhook's display name on create
    pub username: Option<String>,

    /// Thumbnail shown in the embed
    pub thumbnail_url: Option<String>,

    /// Latency classification thresholds
    pub thresholds: Thresholds,

    /// Probes in flight at once
    pub concurrency: usize,

    /// History entries retained
    pub history_capacity: usize,

    /// Uptime windows rendered in the footer
    pub uptime_windows: Vec<UptimeWindowSpec>,

    /// Role mention policy
    pub alerts: AlertSettings,

    /// Link buttons (label, url)
    pub links: Vec<(String, String)>,

    /// Transitions retained
    pub changelog_capacity: usize,

    /// Transitions rendered
    pub changelog_shown: usize,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            title: "Overwatch 2 Server Status".to_string(),
            username: None,
            thumbnail_url: None,
            thresholds: Thresholds::default(),
            concurrency: 8,
            history_capacity: 30 * 24,
            uptime_windows: vec![
                UptimeWindowSpec {
                    label: "24h".to_string(),
                    samples: 24,
                },
                UptimeWindowSpec {
                    label: "7d".to_string(),
                    samples: 7 * 24,
                },
            ],
            alerts: AlertSettings::default(),
            links: Vec::new(),
            changelog_capacity: 10,
            changelog_shown: 3,
        }
    }
}

/// Uptime window expressed in history samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UptimeWindowSpec {
    pub label: String,
    pub samples: usize,
}

/// Identifier Discord assigned to the live message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted pointer to the live message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
}

/// One subject changing level between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub at: DateTime<Utc>,
    pub subject: String,
    pub from: Severity,
    pub to: Severity,
}

/// Bounded list of transitions, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct Changelog {
    cap: usize,
    entries: VecDeque<ChangelogEntry>,
}

impl Changelog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: VecDeque::new(),
        }
    }

    pub fn from_entries(entries: Vec<ChangelogEntry>, cap: usize) -> Self {
        let mut log = Self::new(cap);
        for entry in entries {
            log.push(entry);
        }
        log
    }

    pub fn push(&mut self, entry: ChangelogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest `n` entries, newest first
    pub fn newest(&self, n: usize) -> impl Iterator<Item = &ChangelogEntry> {
        self.entries.iter().rev().take(n)
    }

    pub fn to_vec(&self) -> Vec<ChangelogEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Bookkeeping for role pings across runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// Start of the current bad state
    #[serde(default)]
    pub incident_since: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_ping_at: Option<DateTime<Utc>>,

    /// Escalation ping already sent for this incident
    #[serde(default)]
    pub escalated: bool,
}

/// Latency direction compared with the previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Steady,
}

impl Trend {
    /// Relative change below which latency counts as steady
    pub const TOLERANCE: f64 = 0.10;

    pub fn between(previous: Option<f64>, current: Option<f64>) -> Self {
        match (previous, current) {
            (Some(prev), Some(cur)) if prev > 0.0 => {
                let change = (cur - prev) / prev;
                if change > Self::TOLERANCE {
                    Trend::Rising
                } else if change < -Self::TOLERANCE {
                    Trend::Falling
                } else {
                    Trend::Steady
                }
            }
            _ => Trend::Steady,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Trend::Rising => "↑",
            Trend::Falling => "↓",
            Trend::Steady => "→",
        }
    }
}

/// What a run did with the notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Payload unchanged, no network call made
    Unchanged,
    /// First message created
    Created(MessageId),
    /// Existing message edited
    Edited(MessageId),
    /// Existing message was gone, a new one was created
    Recreated(MessageId),
}

impl RunOutcome {
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            RunOutcome::Unchanged => None,
            RunOutcome::Created(id) | RunOutcome::Edited(id) | RunOutcome::Recreated(id) => Some(id),
        }
    }
}
