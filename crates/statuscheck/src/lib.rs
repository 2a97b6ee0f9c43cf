//! Probing, classification and aggregation for the game status reporter.
//!
//! This crate turns external checks into per-subject severities:
//! - TCP connect and HTTP HEAD latency probes
//! - keyword probes over HTML status pages and JSON endpoints
//! - latency classification against configured thresholds
//! - quorum merge with cache fallback, worst-state reduction
//! - a bounded run history with uptime ratios
//!
//! # Example
//!
//! ```no_run
//! use statuscheck::{
//!     Probe, ProbeGroup, TcpLatencyProbe, Thresholds, classify, mean_latency, sweep_groups,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let probe: Arc<dyn Probe> =
//!     Arc::new(TcpLatencyProbe::new("eu.example.net:443", Duration::from_secs(3)));
//! let eu = ProbeGroup::new("EU", vec![probe]);
//! let results = sweep_groups(&[eu], 8).await;
//! let mean = mean_latency(results[0].signals.iter().map(|s| s.latency_ms()));
//! let severity = classify(mean, &Thresholds::default());
//! # let _ = severity;
//! # }
//! ```

pub mod aggregate;
pub mod classify;
pub mod history;
pub mod monitor;
pub mod probes;
pub mod types;

pub use aggregate::{
    CachedStatus, Merged, Resolved, StatusCache, mean_latency, quorum_merge, worst_state,
};
pub use classify::{KeywordSet, classify, classify_text};
pub use history::{History, HistoryEntry};
pub use monitor::{GroupSignals, ProbeGroup, sweep, sweep_groups};
pub use probes::{HttpLatencyProbe, JsonProbe, KeywordProbe, Probe, ProbeError, TcpLatencyProbe};
pub use types::{Evidence, Reading, Severity, Signal, SubjectKind, SubjectStatus, Thresholds};
