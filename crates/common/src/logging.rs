//! Logging utilities for the status reporter components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the filter: `RUST_LOG` wins, otherwise the given default level.
fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize tracing with sensible defaults.
///
/// Uses the RUST_LOG environment variable to control log levels.
/// Default level is `default_level` (usually "info"). Output goes to stderr
/// so the scheduler hosting a run captures it alongside the exit code.
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter(default_level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json(default_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .with(filter(default_level))
        .init();
}

/// Initialize tracing from a format name ("json" or anything else for text).
pub fn init_with_format(format: Option<&str>, default_level: &str) {
    match format {
        Some(f) if f.eq_ignore_ascii_case("json") => init_json(default_level),
        _ => init(default_level),
    }
}
