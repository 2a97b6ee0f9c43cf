//! Common error types for the status reporter components.

use std::fmt;

/// A specialized Result type for status reporter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for status reporter operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new probe error.
    pub fn probe(msg: impl fmt::Display) -> Self {
        Error::Probe(msg.to_string())
    }

    /// Create a new notification error.
    pub fn notify(msg: impl fmt::Display) -> Self {
        Error::Notify(msg.to_string())
    }

    /// Create a new persisted-state error.
    pub fn state(msg: impl fmt::Display) -> Self {
        Error::State(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}
