//! Mapping raw probe values to severities.
//!
//! Two policies live here and they are deliberately different:
//!
//! - [`classify`] turns a latency into a level against rising thresholds.
//! - [`classify_text`] scans a page for keywords and lets the most alarming
//!   category win (bad before warn before ok). Only keyword pages use this
//!   worst-first tie-break; the aggregator leans the other way.

use crate::types::{Severity, Thresholds};
use serde::{Deserialize, Serialize};

/// Classify a latency measurement.
///
/// Total over every input: `None` and NaN are `unknown`, otherwise the
/// highest threshold reached wins.
pub fn classify(latency_ms: Option<f64>, thresholds: &Thresholds) -> Severity {
    let Some(ms) = latency_ms else {
        return Severity::Unknown;
    };
    if ms.is_nan() {
        return Severity::Unknown;
    }

    if let Some(critical) = thresholds.critical_ms {
        if ms >= critical {
            return Severity::Critical;
        }
    }
    if ms >= thresholds.warn_ms {
        Severity::Warn
    } else if ms >= thresholds.info_ms {
        Severity::Info
    } else {
        Severity::Ok
    }
}

/// Keywords searched for on a status page, matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    /// Phrases meaning the service runs normally
    #[serde(default)]
    pub ok: Vec<String>,

    /// Phrases meaning degraded service or maintenance
    #[serde(default)]
    pub warn: Vec<String>,

    /// Phrases meaning an outage
    #[serde(default)]
    pub bad: Vec<String>,
}

impl KeywordSet {
    pub fn new<S: Into<String>>(
        ok: impl IntoIterator<Item = S>,
        warn: impl IntoIterator<Item = S>,
        bad: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            ok: ok.into_iter().map(Into::into).collect(),
            warn: warn.into_iter().map(Into::into).collect(),
            bad: bad.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ok.is_empty() && self.warn.is_empty() && self.bad.is_empty()
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .filter(|n| !n.trim().is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}

/// Classify a text document by keyword.
///
/// Bad keywords map to `warn`, warn keywords to `info`, ok keywords to
/// `ok`. Returns `None` when nothing matches.
pub fn classify_text(text: &str, keywords: &KeywordSet) -> Option<Severity> {
    let text = text.to_lowercase();
    if contains_any(&text, &keywords.bad) {
        Some(Severity::Warn)
    } else if contains_any(&text, &keywords.warn) {
        Some(Severity::Info)
    } else if contains_any(&text, &keywords.ok) {
        Some(Severity::Ok)
    } else {
        None
    }
}
