//! Turning configuration into probe groups.

use crate::config::{Config, SourceSettings};
use statuscheck::{
    HttpLatencyProbe, JsonProbe, KeywordProbe, Probe, ProbeError, ProbeGroup, SubjectKind,
    TcpLatencyProbe,
};
use std::sync::Arc;
use std::time::Duration;

/// Subject id of the maintenance notice
pub const MAINTENANCE_ID: &str = "Maintenance";

/// One subject and the probes that observe it
#[derive(Debug, Clone)]
pub struct SubjectPlan {
    pub kind: SubjectKind,
    /// Human readable name used in notes
    pub label: String,
    /// Status page linked from the message
    pub link: Option<String>,
    pub group: ProbeGroup,
}

impl SubjectPlan {
    pub fn id(&self) -> &str {
        &self.group.subject_id
    }
}

/// Every subject probed in a run, in display order
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub regions: Vec<SubjectPlan>,
    pub platforms: Vec<SubjectPlan>,
    pub maintenance: Option<SubjectPlan>,
}

fn region_probe(target: &str, timeout: Duration) -> Result<Arc<dyn Probe>, ProbeError> {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        Ok(Arc::new(HttpLatencyProbe::new(target, timeout)?))
    } else {
        Ok(Arc::new(TcpLatencyProbe::new(target, timeout)))
    }
}

fn source_probe(source: &SourceSettings, timeout: Duration) -> Result<Arc<dyn Probe>, ProbeError> {
    Ok(match source {
        SourceSettings::Html { url, keywords } => {
            Arc::new(KeywordProbe::new(url.clone(), keywords.clone(), timeout)?)
        }
        SourceSettings::Json {
            url,
            path,
            keywords,
        } => Arc::new(JsonProbe::new(
            url.clone(),
            path.clone(),
            keywords.clone(),
            timeout,
        )?),
    })
}

impl Plan {
    /// Build probes for every configured subject.
    ///
    /// Region targets are repeated `probe.attempts` times so the mean
    /// latency smooths out a single slow connect.
    pub fn from_config(config: &Config) -> Result<Self, ProbeError> {
        let timeout = config.probe.timeout;
        let attempts = config.probe.attempts.max(1);

        let regions = config
            .regions
            .iter()
            .map(|region| {
                let mut probes = Vec::new();
                for _ in 0..attempts {
                    for target in &region.targets {
                        probes.push(region_probe(target, timeout)?);
                    }
                }
                Ok(SubjectPlan {
                    kind: SubjectKind::Region,
                    label: region.name.clone(),
                    link: None,
                    group: ProbeGroup::new(region.name.clone(), probes),
                })
            })
            .collect::<Result<Vec<_>, ProbeError>>()?;

        let platforms = config
            .platforms
            .iter()
            .map(|platform| {
                let probes = platform
                    .sources
                    .iter()
                    .map(|source| source_probe(source, timeout))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SubjectPlan {
                    kind: SubjectKind::Platform,
                    label: platform.label.clone(),
                    link: Some(platform.url.clone()),
                    group: ProbeGroup::new(platform.id.clone(), probes),
                })
            })
            .collect::<Result<Vec<_>, ProbeError>>()?;

        let maintenance = config
            .maintenance
            .as_ref()
            .map(|m| {
                let probe: Arc<dyn Probe> =
                    Arc::new(KeywordProbe::new(m.url.clone(), m.keywords.clone(), timeout)?);
                Ok::<_, ProbeError>(SubjectPlan {
                    kind: SubjectKind::Maintenance,
                    label: m.label.clone(),
                    link: Some(m.url.clone()),
                    group: ProbeGroup::new(MAINTENANCE_ID, vec![probe]),
                })
            })
            .transpose()?;

        Ok(Self {
            regions,
            platforms,
            maintenance,
        })
    }

    /// All subjects that carry probes, regions first
    pub fn subjects(&self) -> impl Iterator<Item = &SubjectPlan> {
        self.regions
            .iter()
            .chain(self.platforms.iter())
            .chain(self.maintenance.iter())
    }

    /// Probe groups in the order of [`Plan::subjects`]
    pub fn groups(&self) -> Vec<ProbeGroup> {
        self.subjects().map(|s| s.group.clone()).collect()
    }
}
