//! Running probes concurrently.
//!
//! A sweep runs every probe once with at most `concurrency` in flight.
//! Each probe fills its own result slot, so results come back in input
//! order and no locking is needed. Failures become unresolved signals.

use crate::probes::{Probe, ProbeError};
use crate::types::Signal;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probes that all gather evidence about one subject.
#[derive(Clone)]
pub struct ProbeGroup {
    pub subject_id: String,
    pub probes: Vec<Arc<dyn Probe>>,
}

impl ProbeGroup {
    pub fn new(subject_id: impl Into<String>, probes: Vec<Arc<dyn Probe>>) -> Self {
        Self {
            subject_id: subject_id.into(),
            probes,
        }
    }
}

impl std::fmt::Debug for ProbeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeGroup")
            .field("subject_id", &self.subject_id)
            .field(
                "probes",
                &self.probes.iter().map(|p| p.source()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Signals gathered for one subject, in probe order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSignals {
    pub subject_id: String,
    pub signals: Vec<Signal>,
}

async fn run_one(probe: Arc<dyn Probe>) -> Signal {
    match probe.probe().await {
        Ok(signal) => signal,
        Err(ProbeError::NoMatch) => {
            debug!(source = probe.source(), "Probe found no known keyword");
            Signal::unresolved(probe.source())
        }
        Err(e) => {
            warn!(source = probe.source(), error = %e, "Probe failed");
            Signal::unresolved(probe.source())
        }
    }
}

/// Run every probe once, at most `concurrency` at a time.
pub async fn sweep(probes: &[Arc<dyn Probe>], concurrency: usize) -> Vec<Signal> {
    stream::iter(probes.iter().cloned().map(run_one))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Run the probes of several subjects in one bounded sweep.
pub async fn sweep_groups(groups: &[ProbeGroup], concurrency: usize) -> Vec<GroupSignals> {
    let flat: Vec<Arc<dyn Probe>> = groups
        .iter()
        .flat_map(|g| g.probes.iter().cloned())
        .collect();

    info!(
        subjects = groups.len(),
        probes = flat.len(),
        concurrency,
        "Starting probe sweep"
    );
    let mut signals = sweep(&flat, concurrency).await.into_iter();

    groups
        .iter()
        .map(|g| GroupSignals {
            subject_id: g.subject_id.clone(),
            signals: signals.by_ref().take(g.probes.len()).collect(),
        })
        .collect()
}
