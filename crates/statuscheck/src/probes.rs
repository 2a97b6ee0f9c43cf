//! Probe implementations.
//!
//! A probe performs exactly one bounded network operation. Transport
//! failures come back as [`ProbeError`]; nothing here panics or retries.

use crate::classify::{KeywordSet, classify_text};
use crate::types::Signal;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; status-reporter/0.1)";

/// Why a probe produced no signal.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("no configured keyword matched")]
    NoMatch,
}

impl ProbeError {
    /// Whether the failure is the benign "page said nothing we recognise" case.
    pub fn is_no_match(&self) -> bool {
        matches!(self, ProbeError::NoMatch)
    }
}

impl From<ProbeError> for common::Error {
    fn from(e: ProbeError) -> Self {
        common::Error::probe(e)
    }
}

/// A single external check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform the check
    async fn probe(&self) -> Result<Signal, ProbeError>;

    /// Identifier of this evidence source
    fn source(&self) -> &str;
}

fn http_client(timeout_duration: Duration) -> Result<reqwest::Client, ProbeError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout_duration)
        .user_agent(USER_AGENT)
        .build()?)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// TCP connect timing probe
pub struct TcpLatencyProbe {
    target: String,
    source: String,
    timeout_duration: Duration,
}

impl TcpLatencyProbe {
    /// Create a probe for `host:port`
    pub fn new(target: impl Into<String>, timeout_duration: Duration) -> Self {
        let target = target.into();
        Self {
            source: format!("tcp:{}", target),
            target,
            timeout_duration,
        }
    }
}

#[async_trait]
impl Probe for TcpLatencyProbe {
    async fn probe(&self) -> Result<Signal, ProbeError> {
        let start = Instant::now();

        match timeout(self.timeout_duration, TcpStream::connect(self.target.as_str())).await {
            Ok(Ok(_stream)) => {
                let latency = elapsed_ms(start);
                debug!(target = %self.target, latency_ms = latency, "TCP probe connected");
                Ok(Signal::latency(self.source.clone(), latency))
            }
            Ok(Err(e)) => Err(ProbeError::Connect(e)),
            Err(_) => Err(ProbeError::Timeout(self.timeout_duration)),
        }
    }

    fn source(&self) -> &str {
        &self.source
    }
}

/// HTTP HEAD timing probe
pub struct HttpLatencyProbe {
    url: String,
    source: String,
    timeout_duration: Duration,
    client: reqwest::Client,
}

impl HttpLatencyProbe {
    pub fn new(url: impl Into<String>, timeout_duration: Duration) -> Result<Self, ProbeError> {
        let url = url.into();
        Ok(Self {
            source: format!("head:{}", url),
            url,
            timeout_duration,
            client: http_client(timeout_duration)?,
        })
    }
}

#[async_trait]
impl Probe for HttpLatencyProbe {
    async fn probe(&self) -> Result<Signal, ProbeError> {
        let start = Instant::now();
        let response = timeout(self.timeout_duration, self.client.head(&self.url).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout_duration))??;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(ProbeError::UnexpectedStatus(status.as_u16()));
        }

        let latency = elapsed_ms(start);
        debug!(url = %self.url, status = status.as_u16(), latency_ms = latency, "HTTP probe answered");
        Ok(Signal::latency(self.source.clone(), latency))
    }

    fn source(&self) -> &str {
        &self.source
    }
}

async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    timeout_duration: Duration,
) -> Result<String, ProbeError> {
    let fetch = async {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::UnexpectedStatus(status.as_u16()));
        }
        Ok::<String, ProbeError>(response.text().await?)
    };

    timeout(timeout_duration, fetch)
        .await
        .map_err(|_| ProbeError::Timeout(timeout_duration))?
}

/// Status page keyword probe.
///
/// The page decides the level itself; see [`classify_text`] for the
/// bad-first priority.
pub struct KeywordProbe {
    url: String,
    keywords: KeywordSet,
    timeout_duration: Duration,
    client: reqwest::Client,
}

impl KeywordProbe {
    pub fn new(
        url: impl Into<String>,
        keywords: KeywordSet,
        timeout_duration: Duration,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            url: url.into(),
            keywords,
            timeout_duration,
            client: http_client(timeout_duration)?,
        })
    }
}

#[async_trait]
impl Probe for KeywordProbe {
    async fn probe(&self) -> Result<Signal, ProbeError> {
        let body = fetch_text(&self.client, &self.url, self.timeout_duration).await?;
        let severity = classify_text(&body, &self.keywords).ok_or(ProbeError::NoMatch)?;
        debug!(url = %self.url, %severity, "Keyword probe matched");
        Ok(Signal::level(self.source(), severity))
    }

    fn source(&self) -> &str {
        "html"
    }
}

/// JSON status endpoint probe.
///
/// Walks `path` (object keys, or indices into arrays) and applies the
/// keyword policy to the value found there.
pub struct JsonProbe {
    url: String,
    path: Vec<String>,
    keywords: KeywordSet,
    timeout_duration: Duration,
    client: reqwest::Client,
}

impl JsonProbe {
    pub fn new(
        url: impl Into<String>,
        path: Vec<String>,
        keywords: KeywordSet,
        timeout_duration: Duration,
    ) -> Result<Self, ProbeError> {
        Ok(Self {
            url: url.into(),
            path,
            keywords,
            timeout_duration,
            client: http_client(timeout_duration)?,
        })
    }
}

/// Follow a key path through a JSON document and stringify the leaf.
pub fn lookup_path(document: &serde_json::Value, path: &[String]) -> Option<String> {
    let mut current = document;
    for key in path {
        current = match current {
            serde_json::Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            serde_json::Value::Object(map) => map.get(key)?,
            _ => return None,
        };
    }
    Some(match current {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[async_trait]
impl Probe for JsonProbe {
    async fn probe(&self) -> Result<Signal, ProbeError> {
        let body = fetch_text(&self.client, &self.url, self.timeout_duration).await?;
        let document: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ProbeError::Decode(e.to_string()))?;
        let value = lookup_path(&document, &self.path)
            .ok_or_else(|| ProbeError::Decode(format!("path {:?} not found", self.path)))?;
        let severity = classify_text(value.trim(), &self.keywords).ok_or(ProbeError::NoMatch)?;
        debug!(url = %self.url, %severity, "JSON probe matched");
        Ok(Signal::level(self.source(), severity))
    }

    fn source(&self) -> &str {
        "json"
    }
}
