//! Status check types and structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ordered alarm level.
///
/// The derived order is the "worse than" relation used by worst-state
/// reduction: `Ok < Info < Warn < Critical < Unknown`. A subject nobody can
/// vouch for ranks above any explicit alarm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Service reachable and normal
    Ok,
    /// Degraded, limited or under maintenance
    Info,
    /// Confirmed problem
    Warn,
    /// Latency above the optional critical threshold
    Critical,
    /// Nothing resolved
    #[default]
    Unknown,
}

impl Severity {
    /// All levels, best first.
    pub const ALL: [Severity; 5] = [
        Severity::Ok,
        Severity::Info,
        Severity::Warn,
        Severity::Critical,
        Severity::Unknown,
    ];

    /// Numeric rank, higher is worse.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Whether the level is an explicit alarm (`warn` or `critical`).
    pub fn is_alarm(self) -> bool {
        matches!(self, Severity::Warn | Severity::Critical)
    }

    /// Whether players can be assumed to reach the service.
    pub fn is_playable(self) -> bool {
        matches!(self, Severity::Ok | Severity::Info)
    }

    /// Status dot used in rendered messages.
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Ok => "🟢",
            Severity::Info => "🟡",
            Severity::Warn => "🔴",
            Severity::Critical => "⛔",
            Severity::Unknown => "⚪",
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw value produced by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reading {
    /// Round-trip latency in milliseconds
    LatencyMs(f64),
    /// A level decided by the probe itself (keyword pages)
    Level(Severity),
}

/// One probe outcome. `value` is `None` when the probe failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub source: String,
    pub value: Option<Reading>,
}

impl Signal {
    /// Latency measurement
    pub fn latency(source: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            source: source.into(),
            value: Some(Reading::LatencyMs(latency_ms)),
        }
    }

    /// Level decided by a keyword probe
    pub fn level(source: impl Into<String>, severity: Severity) -> Self {
        Self {
            source: source.into(),
            value: Some(Reading::Level(severity)),
        }
    }

    /// Failure marker
    pub fn unresolved(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            value: None,
        }
    }

    /// Latency in milliseconds, if this signal carries one.
    pub fn latency_ms(&self) -> Option<f64> {
        match self.value {
            Some(Reading::LatencyMs(ms)) => Some(ms),
            _ => None,
        }
    }

    /// Turn the signal into evidence for quorum merge.
    pub fn to_evidence(&self, thresholds: &Thresholds) -> Evidence {
        let severity = match self.value {
            None => None,
            Some(Reading::LatencyMs(ms)) => match crate::classify::classify(Some(ms), thresholds) {
                Severity::Unknown => None,
                s => Some(s),
            },
            Some(Reading::Level(Severity::Unknown)) => None,
            Some(Reading::Level(s)) => Some(s),
        };
        Evidence {
            source: self.source.clone(),
            severity,
        }
    }
}

/// A classified signal: one source's opinion about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: String,
    pub severity: Option<Severity>,
}

impl Evidence {
    pub fn new(source: impl Into<String>, severity: Option<Severity>) -> Self {
        Self {
            source: source.into(),
            severity,
        }
    }
}

/// Latency thresholds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// At or above this latency a subject is `info`
    pub info_ms: f64,

    /// At or above this latency a subject is `warn`
    pub warn_ms: f64,

    /// At or above this latency a subject is `critical`
    #[serde(default)]
    pub critical_ms: Option<f64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            info_ms: 80.0,
            warn_ms: 150.0,
            critical_ms: None,
        }
    }
}

/// What kind of thing a subject is. Drives grouping when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// Aggregated game reachability, always present
    Overall,
    /// Latency-probed region
    Region,
    /// Platform network status page
    Platform,
    /// Maintenance announcement page
    Maintenance,
}

/// Per-run status of one monitored subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectStatus {
    pub subject_id: String,
    pub kind: SubjectKind,
    pub severity: Severity,
    pub note: String,
    pub evidence_sources: BTreeSet<String>,
    pub observed_at: Option<DateTime<Utc>>,

    /// Minutes since the cached value was observed, when the status came from the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age_minutes: Option<i64>,

    /// Mean latency for latency-probed subjects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,

    /// Status page for the subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl SubjectStatus {
    /// Create a status observed now with no evidence yet.
    pub fn new(
        subject_id: impl Into<String>,
        kind: SubjectKind,
        severity: Severity,
        observed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind,
            severity,
            note: String::new(),
            evidence_sources: BTreeSet::new(),
            observed_at,
            cache_age_minutes: None,
            latency_ms: None,
            link: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// True when the status was taken from the cache.
    pub fn is_cached(&self) -> bool {
        self.cache_age_minutes.is_some()
    }
}
