//! One reporting run: probe, resolve, record, render, publish.

use crate::alerts::plan_alerts;
use crate::notifier::{Notifier, NotifyState, WebhookTransport};
use crate::plan::{Plan, SubjectPlan};
use crate::render::{RenderInput, render};
use crate::store::{PersistedState, StateStore};
use crate::types::{Changelog, ChangelogEntry, ReporterSettings, RunOutcome, Trend};
use chrono::{DateTime, Utc};
use common::Result;
use statuscheck::{
    Evidence, GroupSignals, History, HistoryEntry, Merged, Resolved, Severity, Signal,
    StatusCache, SubjectKind, SubjectStatus, classify, mean_latency, quorum_merge, sweep_groups,
    worst_state,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Subject id of the synthetic overall subject
pub const OVERALL_ID: &str = "PC";

const OVERALL_NOTE: &str = "Game server reachability";

/// Subject levels computed in one run
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub aggregate: Severity,
    /// Overall subject first, then regions, platforms and maintenance
    pub subjects: Vec<SubjectStatus>,
    pub trends: BTreeMap<String, Trend>,
}

/// Runs the pipeline against a webhook transport
pub struct Reporter<T> {
    settings: ReporterSettings,
    plan: Plan,
    store: StateStore,
    notifier: Notifier<T>,
}

fn note_for(label: &str, resolved: &Resolved) -> String {
    if resolved.cache_age_minutes.is_some() {
        format!("{} (cached)", label)
    } else if resolved.sources.is_empty() {
        label.to_string()
    } else {
        let sources: Vec<&str> = resolved.sources.iter().map(String::as_str).collect();
        format!("{} ({})", label, sources.join(", "))
    }
}

/// Turn a resolution into a subject status, logging any transition.
fn to_status(
    id: &str,
    kind: SubjectKind,
    note: String,
    resolved: Resolved,
    changelog: &mut Changelog,
    now: DateTime<Utc>,
) -> SubjectStatus {
    let fresh = resolved.cache_age_minutes.is_none() && resolved.severity != Severity::Unknown;

    if fresh {
        if let Some(previous) = resolved.previous.filter(|p| *p != resolved.severity) {
            info!(subject = id, from = %previous, to = %resolved.severity, "Subject changed level");
            changelog.push(ChangelogEntry {
                at: now,
                subject: id.to_string(),
                from: previous,
                to: resolved.severity,
            });
        }
    } else if let Some(age) = resolved.cache_age_minutes {
        debug!(subject = id, age_minutes = age, "Using cached level");
    }

    let mut status = SubjectStatus::new(id, kind, resolved.severity, fresh.then_some(now))
        .with_note(note);
    status.evidence_sources = resolved.sources;
    status.cache_age_minutes = resolved.cache_age_minutes;
    status
}

impl<T: WebhookTransport> Reporter<T> {
    pub fn new(
        settings: ReporterSettings,
        plan: Plan,
        store: StateStore,
        notifier: Notifier<T>,
    ) -> Self {
        Self {
            settings,
            plan,
            store,
            notifier,
        }
    }

    pub fn settings(&self) -> &ReporterSettings {
        &self.settings
    }

    fn region_status(
        &self,
        subject: &SubjectPlan,
        signals: &[Signal],
        state: &mut PersistedState,
        changelog: &mut Changelog,
        trends: &mut BTreeMap<String, Trend>,
        now: DateTime<Utc>,
    ) -> SubjectStatus {
        let id = subject.id();
        let latency = mean_latency(signals.iter().map(Signal::latency_ms));
        let merged = Merged {
            severity: classify(latency, &self.settings.thresholds),
            sources: signals
                .iter()
                .filter(|s| s.latency_ms().is_some())
                .map(|s| s.source.clone())
                .collect(),
        };

        trends.insert(
            id.to_string(),
            Trend::between(state.latency.get(id).copied(), latency),
        );
        if let Some(ms) = latency {
            state.latency.insert(id.to_string(), ms);
        }

        let resolved = state.status_cache.resolve(id, merged, now);
        let mut status = to_status(
            id,
            subject.kind,
            subject.label.clone(),
            resolved,
            changelog,
            now,
        );
        status.latency_ms = latency;
        status
    }

    fn page_status(
        &self,
        subject: &SubjectPlan,
        signals: &[Signal],
        cache: &mut StatusCache,
        changelog: &mut Changelog,
        now: DateTime<Utc>,
    ) -> SubjectStatus {
        let evidence: Vec<Evidence> = signals
            .iter()
            .map(|s| s.to_evidence(&self.settings.thresholds))
            .collect();
        let resolved = cache.resolve(subject.id(), quorum_merge(&evidence), now);
        let note = note_for(&subject.label, &resolved);
        let mut status = to_status(subject.id(), subject.kind, note, resolved, changelog, now);
        status.link = subject.link.clone();
        status
    }

    /// Resolve every subject from this run's signals.
    ///
    /// `signals` must follow the order of [`Plan::subjects`]. Updates the
    /// status and latency caches in `state` and appends transitions to
    /// `changelog`.
    pub fn evaluate(
        &self,
        signals: &[GroupSignals],
        state: &mut PersistedState,
        changelog: &mut Changelog,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let mut trends = BTreeMap::new();
        let mut regions = Vec::new();
        let mut others = Vec::new();

        for (subject, group) in self.plan.subjects().zip(signals) {
            debug_assert_eq!(subject.id(), group.subject_id);
            match subject.kind {
                SubjectKind::Region => regions.push(self.region_status(
                    subject,
                    &group.signals,
                    state,
                    changelog,
                    &mut trends,
                    now,
                )),
                _ => others.push(self.page_status(
                    subject,
                    &group.signals,
                    &mut state.status_cache,
                    changelog,
                    now,
                )),
            }
        }

        // The overall subject keeps the reduction below non-empty.
        let overall_merged = Merged {
            severity: worst_state(regions.iter().map(|r| r.severity)).unwrap_or_default(),
            sources: regions
                .iter()
                .filter(|r| r.severity != Severity::Unknown)
                .map(|r| r.subject_id.clone())
                .collect::<BTreeSet<_>>(),
        };
        let resolved = state.status_cache.resolve(OVERALL_ID, overall_merged, now);
        let note = if resolved.cache_age_minutes.is_some() {
            format!("{} (cached)", OVERALL_NOTE)
        } else {
            OVERALL_NOTE.to_string()
        };
        let overall = to_status(
            OVERALL_ID,
            SubjectKind::Overall,
            note,
            resolved,
            changelog,
            now,
        );

        let mut subjects = Vec::with_capacity(1 + regions.len() + others.len());
        subjects.push(overall);
        subjects.extend(regions);
        subjects.extend(others);

        let aggregate = worst_state(subjects.iter().map(|s| s.severity)).unwrap_or_default();
        Evaluation {
            aggregate,
            subjects,
            trends,
        }
    }

    /// Perform one run.
    ///
    /// State is saved whether or not publishing succeeds, so history and
    /// caches keep moving even while the webhook is unavailable.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let mut state = self.store.load();

        let groups = self.plan.groups();
        let signals = sweep_groups(&groups, self.settings.concurrency).await;

        let mut changelog = Changelog::from_entries(
            std::mem::take(&mut state.changelog),
            self.settings.changelog_capacity,
        );
        let evaluation = self.evaluate(&signals, &mut state, &mut changelog, now);
        info!(aggregate = %evaluation.aggregate, subjects = evaluation.subjects.len(), "Run evaluated");

        let mut history = History::from_entries(
            std::mem::take(&mut state.history),
            self.settings.history_capacity,
        );
        let mut entry = HistoryEntry::new(now, evaluation.aggregate.is_playable());
        entry.subjects = evaluation
            .subjects
            .iter()
            .map(|s| (s.subject_id.clone(), s.severity))
            .collect();
        history.append(entry);

        let uptime: Vec<(String, u8)> = self
            .settings
            .uptime_windows
            .iter()
            .map(|w| (w.label.clone(), history.uptime(w.samples)))
            .collect();

        let alerts_before = state.alerts.clone();
        let alerts = plan_alerts(
            evaluation.aggregate,
            &evaluation.subjects,
            &self.settings.alerts,
            &mut state.alerts,
            now,
        );

        let message = render(&RenderInput {
            settings: &self.settings,
            aggregate: evaluation.aggregate,
            subjects: &evaluation.subjects,
            trends: &evaluation.trends,
            uptime: &uptime,
            changelog: &changelog,
            alerts: &alerts,
            run_at: now,
        });

        let mut notify = NotifyState {
            handle: state.handle.take(),
            last_payload: state.last_payload.take(),
        };
        let published = self.notifier.publish(&mut notify, &message, now).await;
        if published.is_err() {
            // the ping never went out
            state.alerts = alerts_before;
        }

        state.handle = notify.handle;
        state.last_payload = notify.last_payload;
        state.history = history.to_vec();
        state.changelog = changelog.to_vec();

        let saved = self.store.save(&state);
        match (published, saved) {
            (Ok(outcome), Ok(())) => {
                info!(outcome = ?outcome, "Run complete");
                Ok(outcome)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), saved) => {
                if let Err(save_err) = saved {
                    warn!(error = %save_err, "Failed to save state after publish error");
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{MockWebhookTransport, RetryPolicy};
    use crate::plan::MAINTENANCE_ID;
    use chrono::{Duration, TimeZone};
    use statuscheck::{CachedStatus, ProbeGroup};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn subject(id: &str, kind: SubjectKind) -> SubjectPlan {
        SubjectPlan {
            kind,
            label: format!("{} label", id),
            link: None,
            group: ProbeGroup::new(id, Vec::new()),
        }
    }

    fn reporter(plan: Plan) -> Reporter<MockWebhookTransport> {
        Reporter::new(
            ReporterSettings::default(),
            plan,
            StateStore::new("unused"),
            Notifier::new(MockWebhookTransport::new(), RetryPolicy::default()),
        )
    }

    fn signals(id: &str, signals: Vec<Signal>) -> GroupSignals {
        GroupSignals {
            subject_id: id.to_string(),
            signals,
        }
    }

    fn plan() -> Plan {
        Plan {
            regions: vec![
                subject("Europe", SubjectKind::Region),
                subject("Asia", SubjectKind::Region),
            ],
            platforms: vec![subject("Xbox", SubjectKind::Platform)],
            maintenance: None,
        }
    }

    #[test]
    fn test_overall_is_worst_region() {
        let reporter = reporter(plan());
        let mut state = PersistedState::default();
        let mut changelog = Changelog::new(10);

        let evaluation = reporter.evaluate(
            &[
                signals("Europe", vec![Signal::latency("a", 40.0), Signal::latency("b", 60.0)]),
                signals("Asia", vec![Signal::latency("c", 120.0)]),
                signals("Xbox", vec![Signal::level("html", Severity::Ok)]),
            ],
            &mut state,
            &mut changelog,
            now(),
        );

        let overall = &evaluation.subjects[0];
        assert_eq!(overall.subject_id, OVERALL_ID);
        assert_eq!(overall.severity, Severity::Info);
        assert_eq!(evaluation.subjects[1].latency_ms, Some(50.0));
        assert_eq!(evaluation.subjects[1].severity, Severity::Ok);
        assert_eq!(evaluation.subjects[3].note, "Xbox label (html)");
        assert_eq!(evaluation.aggregate, Severity::Info);
        assert_eq!(state.latency.get("Asia"), Some(&120.0));
    }

    #[test]
    fn test_overall_present_without_regions() {
        let reporter = reporter(Plan::default());
        let mut state = PersistedState::default();
        let mut changelog = Changelog::new(10);

        let evaluation = reporter.evaluate(&[], &mut state, &mut changelog, now());
        assert_eq!(evaluation.subjects.len(), 1);
        assert_eq!(evaluation.subjects[0].subject_id, OVERALL_ID);
        assert_eq!(evaluation.aggregate, Severity::Unknown);
    }

    #[test]
    fn test_platform_cache_fallback() {
        let reporter = reporter(plan());
        let mut state = PersistedState::default();
        state.status_cache.record("Xbox", Severity::Warn, now() - Duration::minutes(45));
        let mut changelog = Changelog::new(10);

        let evaluation = reporter.evaluate(
            &[
                signals("Europe", vec![Signal::latency("a", 40.0)]),
                signals("Asia", vec![Signal::latency("b", 40.0)]),
                signals("Xbox", vec![Signal::unresolved("html")]),
            ],
            &mut state,
            &mut changelog,
            now(),
        );

        let xbox = &evaluation.subjects[3];
        assert_eq!(xbox.severity, Severity::Warn);
        assert_eq!(xbox.cache_age_minutes, Some(45));
        assert_eq!(xbox.note, "Xbox label (cached)");
        assert_eq!(xbox.observed_at, None);
        assert_eq!(evaluation.aggregate, Severity::Warn);
        assert!(changelog.is_empty());
    }

    #[test]
    fn test_transition_is_logged() {
        let reporter = reporter(plan());
        let mut state = PersistedState::default();
        state.status_cache.record("Europe", Severity::Ok, now() - Duration::hours(1));
        let mut changelog = Changelog::new(10);

        reporter.evaluate(
            &[
                signals("Europe", vec![Signal::latency("a", 200.0)]),
                signals("Asia", vec![Signal::unresolved("b")]),
                signals("Xbox", vec![Signal::unresolved("html")]),
            ],
            &mut state,
            &mut changelog,
            now(),
        );

        let entries: Vec<_> = changelog.newest(10).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subject, "Europe");
        assert_eq!(entries[0].from, Severity::Ok);
        assert_eq!(entries[0].to, Severity::Warn);
        assert_eq!(
            state.status_cache.get("Europe"),
            Some(&CachedStatus {
                severity: Severity::Warn,
                ts: now()
            })
        );
    }

    #[test]
    fn test_trend_uses_previous_latency() {
        let reporter = reporter(plan());
        let mut state = PersistedState::default();
        state.latency.insert("Europe".into(), 40.0);
        let mut changelog = Changelog::new(10);

        let evaluation = reporter.evaluate(
            &[
                signals("Europe", vec![Signal::latency("a", 60.0)]),
                signals("Asia", vec![Signal::unresolved("b")]),
                signals("Xbox", vec![]),
            ],
            &mut state,
            &mut changelog,
            now(),
        );

        assert_eq!(evaluation.trends.get("Europe"), Some(&Trend::Rising));
        assert_eq!(evaluation.trends.get("Asia"), Some(&Trend::Steady));
        // nothing is recorded without a sample
        assert_eq!(state.latency.get("Asia"), None);
        assert_eq!(state.latency.get("Europe"), Some(&60.0));
    }

    #[test]
    fn test_maintenance_subject_last() {
        let mut plan = plan();
        plan.maintenance = Some(subject(MAINTENANCE_ID, SubjectKind::Maintenance));
        let reporter = reporter(plan);
        let mut state = PersistedState::default();
        let mut changelog = Changelog::new(10);

        let evaluation = reporter.evaluate(
            &[
                signals("Europe", vec![Signal::latency("a", 40.0)]),
                signals("Asia", vec![Signal::latency("b", 40.0)]),
                signals("Xbox", vec![Signal::level("html", Severity::Ok)]),
                signals(MAINTENANCE_ID, vec![Signal::level("html", Severity::Info)]),
            ],
            &mut state,
            &mut changelog,
            now(),
        );

        let last = evaluation.subjects.last().unwrap();
        assert_eq!(last.kind, SubjectKind::Maintenance);
        assert_eq!(last.severity, Severity::Info);
        assert_eq!(evaluation.aggregate, Severity::Info);
    }
}
