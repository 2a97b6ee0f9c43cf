//! Building the status message from a run's results.

use crate::alerts::AlertPlan;
use crate::message::{ActionRow, AllowedMentions, Embed, Field, Footer, LinkButton, Media, Message};
use crate::types::{Changelog, ReporterSettings, Trend};
use chrono::{DateTime, Utc};
use statuscheck::{Severity, SubjectKind, SubjectStatus};
use std::collections::BTreeMap;

/// Embed color for a level
pub fn color(severity: Severity) -> u32 {
    match severity {
        Severity::Ok => 0x2E_CC_71,
        Severity::Info => 0xF1_C4_0F,
        Severity::Warn => 0xE7_4C_3C,
        Severity::Critical => 0x99_2D_22,
        Severity::Unknown => 0x95_A5_A6,
    }
}

fn headline(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "All systems operational.",
        Severity::Info => "Minor issues or maintenance reported.",
        Severity::Warn => "Service problems detected.",
        Severity::Critical => "Severe latency across the service.",
        Severity::Unknown => "Status could not be determined.",
    }
}

/// Everything the message shows
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub settings: &'a ReporterSettings,
    pub aggregate: Severity,
    pub subjects: &'a [SubjectStatus],
    pub trends: &'a BTreeMap<String, Trend>,
    pub uptime: &'a [(String, u8)],
    pub changelog: &'a Changelog,
    pub alerts: &'a AlertPlan,
    pub run_at: DateTime<Utc>,
}

fn cached_suffix(subject: &SubjectStatus) -> Option<String> {
    subject
        .cache_age_minutes
        .map(|age| format!("last seen {} min ago", age))
}

fn region_value(subject: &SubjectStatus, trend: Option<Trend>) -> String {
    let mut lines = Vec::new();
    match subject.latency_ms {
        Some(ms) => lines.push(format!(
            "{:.0} ms {}",
            ms,
            trend.unwrap_or(Trend::Steady).arrow()
        )),
        None => lines.push("no response".to_string()),
    }
    lines.extend(cached_suffix(subject));
    lines.join("\n")
}

fn page_value(subject: &SubjectStatus) -> String {
    let mut lines = Vec::new();
    if !subject.note.is_empty() {
        lines.push(subject.note.clone());
    }
    lines.extend(cached_suffix(subject));
    if let Some(link) = &subject.link {
        lines.push(format!("[Status page]({})", link));
    }
    if lines.is_empty() {
        lines.push(subject.severity.to_string());
    }
    lines.join("\n")
}

fn subject_field(subject: &SubjectStatus, trends: &BTreeMap<String, Trend>) -> Field {
    let name = format!("{} {}", subject.severity.icon(), subject.subject_id);
    match subject.kind {
        SubjectKind::Region => Field::inline(
            name,
            region_value(subject, trends.get(&subject.subject_id).copied()),
        ),
        SubjectKind::Platform => Field::inline(name, page_value(subject)),
        SubjectKind::Overall | SubjectKind::Maintenance => Field::new(name, page_value(subject)),
    }
}

fn kind_order(kind: SubjectKind) -> u8 {
    match kind {
        SubjectKind::Overall => 0,
        SubjectKind::Region => 1,
        SubjectKind::Platform => 2,
        SubjectKind::Maintenance => 3,
    }
}

fn changelog_field(changelog: &Changelog, shown: usize) -> Option<Field> {
    let lines: Vec<String> = changelog
        .newest(shown)
        .map(|e| {
            format!(
                "`{}` {} {} → {}",
                e.at.format("%d.%m %H:%M"),
                e.subject,
                e.from,
                e.to
            )
        })
        .collect();
    (!lines.is_empty()).then(|| Field::new("Recent changes", lines.join("\n")))
}

fn footer_text(uptime: &[(String, u8)]) -> String {
    if uptime.is_empty() {
        return "Status monitor".to_string();
    }
    let parts: Vec<String> = uptime
        .iter()
        .map(|(label, pct)| format!("{} {}%", label, pct))
        .collect();
    format!("Uptime {}", parts.join(" · "))
}

/// Render the message for one run.
pub fn render(input: &RenderInput<'_>) -> Message {
    let mut subjects: Vec<&SubjectStatus> = input.subjects.iter().collect();
    // stable: keeps configured order within a kind
    subjects.sort_by_key(|s| kind_order(s.kind));

    let mut fields: Vec<Field> = subjects
        .into_iter()
        .map(|s| subject_field(s, input.trends))
        .collect();
    fields.extend(changelog_field(
        input.changelog,
        input.settings.changelog_shown,
    ));

    let embed = Embed {
        title: format!("{} {}", input.aggregate.icon(), input.settings.title),
        description: Some(headline(input.aggregate).to_string()),
        color: color(input.aggregate),
        fields,
        footer: Some(Footer {
            text: footer_text(input.uptime),
        }),
        thumbnail: input
            .settings
            .thumbnail_url
            .as_ref()
            .map(|url| Media { url: url.clone() }),
        image: None,
        timestamp: Some(input.run_at),
    };

    let components = if input.settings.links.is_empty() {
        Vec::new()
    } else {
        vec![ActionRow::new(
            input
                .settings
                .links
                .iter()
                .map(|(label, url)| LinkButton::new(label.clone(), url.clone()))
                .collect(),
        )]
    };

    let allowed_mentions = Some(AllowedMentions::roles(input.alerts.roles.clone()));

    Message {
        content: input.alerts.content(),
        username: input.settings.username.clone(),
        embeds: vec![embed],
        components,
        allowed_mentions,
    }
}
