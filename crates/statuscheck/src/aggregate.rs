//! Combining classified signals.
//!
//! Per subject, [`quorum_merge`] picks the most optimistic level any source
//! confirmed, and [`StatusCache::resolve`] fills in the last known level
//! when nothing resolved this run. Across subjects, [`worst_state`] takes
//! the maximum.

use crate::types::{Evidence, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Confirmation priority: the first level any source reports wins.
const CONFIRMATION_ORDER: [Severity; 4] = [
    Severity::Ok,
    Severity::Info,
    Severity::Warn,
    Severity::Critical,
];

/// Result of merging one subject's evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub severity: Severity,
    /// Sources that reported the winning level
    pub sources: BTreeSet<String>,
}

impl Merged {
    pub fn unknown() -> Self {
        Self {
            severity: Severity::Unknown,
            sources: BTreeSet::new(),
        }
    }
}

/// Merge the evidence for one subject.
///
/// One confirmation of normal service outweighs any number of alarms: `ok`
/// beats `info` beats `warn` beats `critical`. Unresolved evidence is
/// ignored; with nothing resolved the result is `unknown`.
pub fn quorum_merge<'a>(evidence: impl IntoIterator<Item = &'a Evidence>) -> Merged {
    let resolved: Vec<(&str, Severity)> = evidence
        .into_iter()
        .filter_map(|e| match e.severity {
            Some(Severity::Unknown) | None => None,
            Some(s) => Some((e.source.as_str(), s)),
        })
        .collect();

    for level in CONFIRMATION_ORDER {
        let sources: BTreeSet<String> = resolved
            .iter()
            .filter(|(_, s)| *s == level)
            .map(|(src, _)| src.to_string())
            .collect();
        if !sources.is_empty() {
            return Merged {
                severity: level,
                sources,
            };
        }
    }

    Merged::unknown()
}

/// Worst severity over a set of subjects.
///
/// `None` for empty input; callers always include the overall subject so
/// the run has something to report.
pub fn worst_state(severities: impl IntoIterator<Item = Severity>) -> Option<Severity> {
    severities.into_iter().max()
}

/// Mean of the latencies that resolved, or `None` when none did.
pub fn mean_latency(samples: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = samples
        .into_iter()
        .flatten()
        .filter(|ms| ms.is_finite())
        .fold((0.0, 0usize), |(sum, count), ms| (sum + ms, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Last known level of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedStatus {
    pub severity: Severity,
    pub ts: DateTime<Utc>,
}

/// A subject's level after cache fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub severity: Severity,
    pub sources: BTreeSet<String>,
    /// Set when the level came from the cache
    pub cache_age_minutes: Option<i64>,
    /// Level cached before this run, if any
    pub previous: Option<Severity>,
}

/// Persisted subject id → last known level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCache {
    entries: BTreeMap<String, CachedStatus>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject_id: &str) -> Option<&CachedStatus> {
        self.entries.get(subject_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remember a resolved level. `unknown` is never cached.
    pub fn record(&mut self, subject_id: &str, severity: Severity, now: DateTime<Utc>) {
        if severity == Severity::Unknown {
            return;
        }
        self.entries
            .insert(subject_id.to_string(), CachedStatus { severity, ts: now });
    }

    /// Apply the unknown fallback and update the cache.
    ///
    /// A known merge result is recorded and returned as is. An unknown one
    /// is replaced by the cached level, annotated with its age in minutes;
    /// without a cache entry it stays unknown with no age.
    pub fn resolve(&mut self, subject_id: &str, merged: Merged, now: DateTime<Utc>) -> Resolved {
        let previous = self.get(subject_id).map(|c| c.severity);

        if merged.severity != Severity::Unknown {
            self.record(subject_id, merged.severity, now);
            return Resolved {
                severity: merged.severity,
                sources: merged.sources,
                cache_age_minutes: None,
                previous,
            };
        }

        match self.get(subject_id) {
            Some(cached) => Resolved {
                severity: cached.severity,
                sources: BTreeSet::new(),
                cache_age_minutes: Some((now - cached.ts).num_minutes().max(0)),
                previous,
            },
            None => Resolved {
                severity: Severity::Unknown,
                sources: BTreeSet::new(),
                cache_age_minutes: None,
                previous,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ev(source: &str, severity: Option<Severity>) -> Evidence {
        Evidence::new(source, severity)
    }

    #[test]
    fn test_quorum_ok_outweighs_warn() {
        let evidence = vec![
            ev("html", Some(Severity::Warn)),
            ev("json", Some(Severity::Ok)),
            ev("mirror", Some(Severity::Warn)),
        ];
        let merged = quorum_merge(&evidence);
        assert_eq!(merged.severity, Severity::Ok);
        assert_eq!(merged.sources, BTreeSet::from(["json".to_string()]));
    }

    #[test]
    fn test_quorum_info_before_warn() {
        let evidence = vec![ev("a", Some(Severity::Warn)), ev("b", Some(Severity::Info))];
        assert_eq!(quorum_merge(&evidence).severity, Severity::Info);
    }

    #[test]
    fn test_quorum_warn_only_when_uncontested() {
        let evidence = vec![ev("a", Some(Severity::Warn)), ev("b", None)];
        let merged = quorum_merge(&evidence);
        assert_eq!(merged.severity, Severity::Warn);
        assert_eq!(merged.sources.len(), 1);
    }

    #[test]
    fn test_quorum_nothing_resolved() {
        let evidence = vec![ev("a", None), ev("b", Some(Severity::Unknown))];
        assert_eq!(quorum_merge(&evidence), Merged::unknown());
        assert_eq!(quorum_merge(&[]), Merged::unknown());
    }

    #[test]
    fn test_quorum_order_independent() {
        let evidence = vec![
            ev("a", Some(Severity::Warn)),
            ev("b", None),
            ev("c", Some(Severity::Info)),
            ev("d", Some(Severity::Info)),
        ];
        let expected = quorum_merge(&evidence);

        let mut rotated = evidence.clone();
        for _ in 0..evidence.len() {
            rotated.rotate_left(1);
            assert_eq!(quorum_merge(&rotated), expected);
        }
        let reversed: Vec<_> = evidence.iter().rev().cloned().collect();
        assert_eq!(quorum_merge(&reversed), expected);
    }

    #[test]
    fn test_worst_state() {
        assert_eq!(worst_state([]), None);
        assert_eq!(
            worst_state([Severity::Ok, Severity::Warn, Severity::Info]),
            Some(Severity::Warn)
        );
        assert_eq!(
            worst_state([Severity::Critical, Severity::Unknown]),
            Some(Severity::Unknown)
        );
    }

    #[test]
    fn test_worst_state_associative_and_idempotent() {
        for a in Severity::ALL {
            assert_eq!(worst_state([a, a]), Some(a));
            for b in Severity::ALL {
                for c in Severity::ALL {
                    let ab = worst_state([a, b]).unwrap();
                    assert_eq!(worst_state([a, b, c]), worst_state([ab, c]));
                }
            }
        }
    }

    #[test]
    fn test_mean_latency() {
        assert_eq!(mean_latency([Some(10.0), None, Some(30.0)]), Some(20.0));
        assert_eq!(mean_latency([None, None]), None);
        assert_eq!(mean_latency([Some(f64::NAN), Some(4.0)]), Some(4.0));
    }

    #[test]
    fn test_cache_fallback_with_age() {
        let now = Utc::now();
        let mut cache = StatusCache::new();
        cache.record("PlayStation", Severity::Warn, now - Duration::minutes(42));

        let resolved = cache.resolve("PlayStation", Merged::unknown(), now);
        assert_eq!(resolved.severity, Severity::Warn);
        assert_eq!(resolved.cache_age_minutes, Some(42));
        assert_eq!(resolved.previous, Some(Severity::Warn));

        // the cache entry itself is untouched by a fallback
        assert_eq!(cache.get("PlayStation").unwrap().ts, now - Duration::minutes(42));
    }

    #[test]
    fn test_cache_miss_stays_unknown() {
        let mut cache = StatusCache::new();
        let resolved = cache.resolve("Xbox", Merged::unknown(), Utc::now());
        assert_eq!(resolved.severity, Severity::Unknown);
        assert_eq!(resolved.cache_age_minutes, None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_resolved_level_is_cached() {
        let now = Utc::now();
        let mut cache = StatusCache::new();
        cache.record("Switch", Severity::Ok, now - Duration::hours(3));

        let merged = Merged {
            severity: Severity::Info,
            sources: BTreeSet::from(["html".to_string()]),
        };
        let resolved = cache.resolve("Switch", merged, now);
        assert_eq!(resolved.severity, Severity::Info);
        assert_eq!(resolved.previous, Some(Severity::Ok));
        assert_eq!(
            cache.get("Switch"),
            Some(&CachedStatus {
                severity: Severity::Info,
                ts: now
            })
        );
    }

    #[test]
    fn test_unknown_is_never_cached() {
        let mut cache = StatusCache::new();
        cache.record("PC", Severity::Unknown, Utc::now());
        assert!(cache.get("PC").is_none());
    }
}
