//! Status Reporter
//!
//! Probes a game's regions and platform status pages, resolves a level
//! per subject and keeps a single Discord webhook message up to date.
//!
//! # Architecture
//!
//! Each invocation is one run in a fresh process:
//! - Probes run concurrently through [`statuscheck`]
//! - Subjects are resolved with quorum merge and a cross-run cache
//! - The rendered message is diffed against the last one sent; only a
//!   changed message reaches the network
//! - All state lives in flat JSON documents between runs
//!
//! # Components
//!
//! - **Plan**: probe groups built from configuration
//! - **Reporter**: one run of the pipeline
//! - **Notifier**: create/edit/recreate with rate-limit retry
//! - **StateStore**: persisted history, caches and message handle

pub mod alerts;
pub mod config;
pub mod message;
pub mod notifier;
pub mod plan;
pub mod render;
pub mod reporter;
pub mod store;
pub mod types;
pub mod webhook;

pub use alerts::{AlertPlan, plan_alerts};
pub use config::{Config, ConfigError};
pub use message::{Message, MessageError};
pub use notifier::{Notifier, NotifyState, RetryPolicy, WebhookError, WebhookTransport};
pub use plan::{Plan, SubjectPlan};
pub use reporter::{Evaluation, OVERALL_ID, Reporter};
pub use store::{PersistedState, StateStore};
pub use types::{MessageHandle, MessageId, ReporterSettings, RunOutcome};
pub use webhook::DiscordWebhook;
