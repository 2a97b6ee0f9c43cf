//! Status reporter binary: one run per invocation.

use anyhow::Context;
use chrono::Utc;
use status_reporter::{
    Config, DiscordWebhook, Notifier, Plan, Reporter, RetryPolicy, StateStore,
};
use std::path::PathBuf;

const CONFIG_ENV: &str = "STATUS_REPORTER_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    // Logging is not initialized yet
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    common::logging::init_with_format(
        config.logging.format.as_deref(),
        config.logging.level.as_deref().unwrap_or("info"),
    );
    match &config.source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
        None => tracing::info!("No configuration file found, using defaults"),
    }
    for name in &config.unknown_regions {
        tracing::warn!(region = %name, "REGIONS names an unconfigured region");
    }

    let url = config.webhook_url()?;
    let webhook = DiscordWebhook::new(url, config.webhook.request_timeout)?;
    let retry = RetryPolicy {
        max_attempts: config.webhook.max_attempts,
        max_wait: config.webhook.max_wait,
        initial_backoff: config.webhook.initial_backoff,
    };
    let plan = Plan::from_config(&config).context("building probes")?;
    let store = StateStore::new(config.state.dir.clone());

    tracing::info!(
        regions = plan.regions.len(),
        platforms = plan.platforms.len(),
        state_dir = %config.state.dir.display(),
        "Status reporter starting"
    );

    let reporter = Reporter::new(
        config.to_reporter_settings(),
        plan,
        store,
        Notifier::new(webhook, retry),
    );

    let outcome = reporter.run_once(Utc::now()).await?;
    match outcome.message_id() {
        Some(id) => tracing::info!(message_id = %id, outcome = ?outcome, "Status published"),
        None => tracing::info!("Status unchanged, nothing sent"),
    }

    Ok(())
}
