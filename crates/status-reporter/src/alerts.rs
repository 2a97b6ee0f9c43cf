//! Deciding which roles to mention.

use crate::config::AlertSettings;
use crate::types::AlertState;
use chrono::{DateTime, Utc};
use statuscheck::{Severity, SubjectKind, SubjectStatus};
use std::time::Duration;
use tracing::info;

/// Mentions for the current incident.
///
/// `roles` and `escalated` only change when the incident does, so the
/// rendered content stays stable across runs with the same outcomes.
/// `ping` marks the runs that count as a ping for the cooldown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertPlan {
    pub roles: Vec<String>,
    pub escalated: bool,
    pub ping: bool,
}

impl AlertPlan {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// `<@&id>` mentions joined for the message content
    pub fn content(&self) -> Option<String> {
        if self.roles.is_empty() {
            return None;
        }
        let mentions: Vec<String> = self.roles.iter().map(|id| format!("<@&{}>", id)).collect();
        let prefix = if self.escalated { "Still ongoing: " } else { "" };
        Some(format!("{}{}", prefix, mentions.join(" ")))
    }
}

fn elapsed_at_least(since: DateTime<Utc>, now: DateTime<Utc>, span: Duration) -> bool {
    (now - since).to_std().is_ok_and(|elapsed| elapsed >= span)
}

/// Plan role mentions and update the bookkeeping.
///
/// Only explicit alarms (`warn`, `critical`) mention roles; an `unknown`
/// aggregate does not. The mentions last for the whole incident. Pings
/// are spaced by the cooldown, except for a single escalation ping once
/// an incident has lasted `escalate_after`, which also marks the content
/// as still ongoing.
pub fn plan_alerts(
    aggregate: Severity,
    subjects: &[SubjectStatus],
    settings: &AlertSettings,
    state: &mut AlertState,
    now: DateTime<Utc>,
) -> AlertPlan {
    if !aggregate.is_alarm() {
        if state.incident_since.take().is_some() {
            info!(%aggregate, "Incident cleared");
        }
        state.escalated = false;
        return AlertPlan::default();
    }

    let since = *state.incident_since.get_or_insert(now);

    let mut roles: Vec<String> = settings.role_id.iter().cloned().collect();
    for subject in subjects {
        if subject.kind != SubjectKind::Region || !subject.severity.is_alarm() {
            continue;
        }
        if let Some(role) = settings.region_roles.get(&subject.subject_id) {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
    }
    if roles.is_empty() {
        return AlertPlan::default();
    }

    let cooldown_over = state
        .last_ping_at
        .is_none_or(|last| elapsed_at_least(last, now, settings.cooldown));
    let escalation_due = !state.escalated
        && settings
            .escalate_after
            .is_some_and(|after| elapsed_at_least(since, now, after));

    // An escalation ping is the one that lands after escalate_after, even
    // if the cooldown happened to be over as well.
    if escalation_due {
        state.escalated = true;
    }
    let ping = cooldown_over || escalation_due;
    if ping {
        state.last_ping_at = Some(now);
        info!(roles = ?roles, escalated = escalation_due, "Mentioning alert roles");
    }

    AlertPlan {
        roles,
        escalated: state.escalated,
        ping,
    }
}
