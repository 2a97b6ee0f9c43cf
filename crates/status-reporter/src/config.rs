//! Configuration loading and validation for the status reporter

use crate::types::{ReporterSettings, UptimeWindowSpec};
use serde::{Deserialize, Serialize};
use statuscheck::{KeywordSet, Thresholds};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid value for {key}: {reason}")]
    InvalidEnv { key: String, reason: String },

    #[error("No webhook URL configured (set DISCORD_WEBHOOK_URL)")]
    MissingWebhook,

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhook(String),
}

impl From<ConfigError> for common::Error {
    fn from(e: ConfigError) -> Self {
        common::Error::config(e)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub webhook: WebhookSettings,

    #[serde(default)]
    pub thresholds: ThresholdSettings,

    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default = "default_regions")]
    pub regions: Vec<RegionSettings>,

    #[serde(default = "default_platforms")]
    pub platforms: Vec<PlatformSettings>,

    #[serde(default)]
    pub maintenance: Option<MaintenanceSettings>,

    #[serde(default)]
    pub history: HistorySettings,

    #[serde(default)]
    pub alerts: AlertSettings,

    #[serde(default)]
    pub links: Vec<LinkSettings>,

    #[serde(default)]
    pub changelog: ChangelogSettings,

    #[serde(default)]
    pub state: StateSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,

    /// Names in `REGIONS` that match no configured region
    #[serde(skip)]
    pub unknown_regions: Vec<String>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.webhook.validate()?;
        self.thresholds.validate()?;
        self.probe.validate()?;
        for region in &self.regions {
            region.validate()?;
        }
        for platform in &self.platforms {
            platform.validate()?;
        }
        if let Some(ref maintenance) = self.maintenance {
            maintenance.validate()?;
        }
        self.history.validate()?;
        self.alerts.validate()?;
        for link in &self.links {
            link.validate()?;
        }
        if self.links.len() > 5 {
            let mut errors = validator::ValidationErrors::new();
            errors.add("links", ValidationError::new("too_many_links"));
            return Err(errors);
        }
        self.changelog.validate()?;
        Ok(())
    }
}

/// Webhook delivery settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookSettings {
    /// Secret; normally provided through DISCORD_WEBHOOK_URL
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[serde(default)]
    #[validate(custom = "validate_http_url")]
    pub thumbnail_url: Option<String>,

    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_max_wait")]
    pub max_wait: Duration,

    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_timeout")]
    pub request_timeout: Duration,
}

/// Latency thresholds in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_threshold_order"))]
pub struct ThresholdSettings {
    #[validate(range(min = 1.0))]
    pub info_ms: f64,

    #[validate(range(min = 1.0))]
    pub warn_ms: f64,

    #[serde(default)]
    pub critical_ms: Option<f64>,
}

/// Probe execution settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProbeSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_timeout")]
    pub timeout: Duration,

    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,

    /// Connects per region target per run
    #[validate(range(min = 1, max = 10))]
    pub attempts: u32,
}

/// A latency-probed region
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegionSettings {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// `host:port` for TCP timing or an http(s) URL for HEAD timing
    #[validate(length(min = 1), custom = "validate_targets")]
    pub targets: Vec<String>,
}

/// A platform status page checked with one or more sources
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlatformSettings {
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    #[validate(length(min = 1, max = 64))]
    pub label: String,

    /// Page linked from the message
    #[validate(custom = "validate_url")]
    pub url: String,

    #[validate(length(min = 1))]
    pub sources: Vec<SourceSettings>,
}

/// One evidence source for a platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSettings {
    Html {
        url: String,
        keywords: KeywordSet,
    },
    Json {
        url: String,
        path: Vec<String>,
        keywords: KeywordSet,
    },
}

/// Maintenance announcement page
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaintenanceSettings {
    #[validate(length(min = 1, max = 64))]
    pub label: String,

    #[validate(custom = "validate_url")]
    pub url: String,

    pub keywords: KeywordSet,
}

/// Rolling history settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HistorySettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_retention")]
    pub retention: Duration,

    #[validate(range(min = 1, max = 60))]
    pub samples_per_hour: u32,

    #[validate(length(max = 4))]
    pub uptime_windows: Vec<UptimeWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeWindow {
    pub label: String,
    #[serde(with = "humantime_serde")]
    pub span: Duration,
}

/// Role mentions for bad states
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AlertSettings {
    #[validate(custom = "validate_role_id")]
    pub role_id: Option<String>,

    /// Region name → role id
    pub region_roles: BTreeMap<String, String>,

    /// Minimum time between two pings
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,

    /// Ping again, ignoring the cooldown, once a bad state lasts this long
    #[serde(with = "humantime_serde")]
    pub escalate_after: Option<Duration>,
}

/// Link button under the message
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinkSettings {
    #[validate(length(min = 1, max = 80))]
    pub label: String,

    #[validate(custom = "validate_url")]
    pub url: String,
}

/// State transition log settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangelogSettings {
    #[validate(range(min = 1, max = 100))]
    pub max_entries: usize,

    /// Newest entries rendered into the message
    #[validate(range(max = 10))]
    pub shown: usize,
}

/// Where persisted state lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    pub dir: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            title: "Overwatch 2 Server Status".to_string(),
            thumbnail_url: None,
            max_attempts: 5,
            max_wait: Duration::from_secs(60),
            initial_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            info_ms: 80.0,
            warn_ms: 150.0,
            critical_ms: None,
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            concurrency: 8,
            attempts: 3,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 3600),
            samples_per_hour: 1,
            uptime_windows: vec![
                UptimeWindow {
                    label: "24h".to_string(),
                    span: Duration::from_secs(24 * 3600),
                },
                UptimeWindow {
                    label: "7d".to_string(),
                    span: Duration::from_secs(7 * 24 * 3600),
                },
            ],
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            role_id: None,
            region_roles: BTreeMap::new(),
            cooldown: Duration::from_secs(3600),
            escalate_after: None,
        }
    }
}

impl Default for ChangelogSettings {
    fn default() -> Self {
        Self {
            max_entries: 10,
            shown: 3,
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("state"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook: WebhookSettings::default(),
            thresholds: ThresholdSettings::default(),
            probe: ProbeSettings::default(),
            regions: default_regions(),
            platforms: default_platforms(),
            maintenance: None,
            history: HistorySettings::default(),
            alerts: AlertSettings::default(),
            links: Vec::new(),
            changelog: ChangelogSettings::default(),
            state: StateSettings::default(),
            logging: LoggingSettings::default(),
            source: None,
            unknown_regions: Vec::new(),
        }
    }
}

fn default_regions() -> Vec<RegionSettings> {
    [
        ("Americas", "us.actual.battle.net:1119"),
        ("Europe", "eu.actual.battle.net:1119"),
        ("Asia", "kr.actual.battle.net:1119"),
    ]
    .into_iter()
    .map(|(name, target)| RegionSettings {
        name: name.to_string(),
        targets: vec![target.to_string()],
    })
    .collect()
}

fn html_source(url: &str, ok: &[&str], warn: &[&str], bad: &[&str]) -> SourceSettings {
    SourceSettings::Html {
        url: url.to_string(),
        keywords: KeywordSet::new(ok.iter().copied(), warn.iter().copied(), bad.iter().copied()),
    }
}

fn default_platforms() -> Vec<PlatformSettings> {
    vec![
        PlatformSettings {
            id: "PlayStation".to_string(),
            label: "PSN".to_string(),
            url: "https://status.playstation.com".to_string(),
            sources: vec![html_source(
                "https://status.playstation.com",
                &["all services are up", "no issues", "up and running", "services are available"],
                &["limited", "degraded", "maintenance", "some services"],
                &["major outage", "outage", "down", "service is down"],
            )],
        },
        PlatformSettings {
            id: "Xbox".to_string(),
            label: "Xbox Live".to_string(),
            url: "https://support.xbox.com/en-US/xbox-live-status".to_string(),
            sources: vec![html_source(
                "https://support.xbox.com/en-US/xbox-live-status",
                &["all services up", "no problems", "up and running", "services are available"],
                &["limited", "degraded", "maintenance"],
                &["major outage", "outage", "down"],
            )],
        },
        PlatformSettings {
            id: "Switch".to_string(),
            label: "Nintendo Online".to_string(),
            url: "https://www.nintendo.co.jp/netinfo/en_US/index.html".to_string(),
            sources: vec![html_source(
                "https://www.nintendo.co.jp/netinfo/en_US/index.html",
                &["operating normally", "all servers are operating normally", "no issues"],
                &["maintenance", "under maintenance", "scheduled maintenance"],
                &["experiencing issues", "service outage", "outage", "down"],
            )],
        },
    ]
}

// Custom validators

fn is_http_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn validate_url(url: &str) -> Result<(), ValidationError> {
    if !is_http_url(url) {
        return Err(ValidationError::new("url_invalid"));
    }
    Ok(())
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    validate_url(url)
}

fn validate_targets(targets: &[String]) -> Result<(), ValidationError> {
    for target in targets {
        let target = target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            if !is_http_url(target) {
                return Err(ValidationError::new("target_url_invalid"));
            }
            continue;
        }
        // host:port
        let Some((host, port)) = target.rsplit_once(':') else {
            return Err(ValidationError::new("target_missing_port"));
        };
        if host.is_empty() || port.parse::<u16>().map_or(true, |p| p == 0) {
            return Err(ValidationError::new("target_invalid"));
        }
    }
    Ok(())
}

fn validate_threshold_order(t: &ThresholdSettings) -> Result<(), ValidationError> {
    if t.info_ms >= t.warn_ms {
        return Err(ValidationError::new("info_ms_not_below_warn_ms"));
    }
    if let Some(critical) = t.critical_ms {
        if critical <= t.warn_ms {
            return Err(ValidationError::new("critical_ms_not_above_warn_ms"));
        }
    }
    Ok(())
}

fn validate_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if !(100..=60_000).contains(&millis) {
        return Err(ValidationError::new("timeout_out_of_range"));
    }
    Ok(())
}

fn validate_max_wait(wait: &Duration) -> Result<(), ValidationError> {
    if wait.as_secs() > 600 {
        return Err(ValidationError::new("max_wait_out_of_range"));
    }
    Ok(())
}

fn validate_retention(retention: &Duration) -> Result<(), ValidationError> {
    let hours = retention.as_secs() / 3600;
    if !(1..=24 * 366).contains(&hours) {
        return Err(ValidationError::new("retention_out_of_range"));
    }
    Ok(())
}

fn validate_role_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("role_id_not_numeric"));
    }
    Ok(())
}

fn env_key_for_region(name: &str) -> String {
    let upper: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("REGION_ROLE_{}", upper)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_env_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidEnv {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

// Configuration loading implementation

impl Config {
    fn with_source(mut self, path: &Path) -> Self {
        self.source = Some(path.to_path_buf());
        self
    }

    /// Load configuration from an explicit path or the default search paths,
    /// then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Some(path) => Self::parse_file(path)?.with_source(path),
            None => match Self::find_config_file() {
                Some(path) => Self::parse_file(&path)?.with_source(&path),
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a specific file without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::parse_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/status-reporter/config.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./status-reporter.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/status-reporter/config.yaml"))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DISCORD_WEBHOOK_URL") {
            self.webhook.url = Some(url.trim().to_string());
        }
        if let Some(url) = get("THUMBNAIL_URL") {
            self.webhook.thumbnail_url = Some(url.trim().to_string());
        }
        if let Some(v) = get("INFO_MS") {
            self.thresholds.info_ms = parse_env("INFO_MS", &v)?;
        }
        if let Some(v) = get("WARN_MS") {
            self.thresholds.warn_ms = parse_env("WARN_MS", &v)?;
        }
        if let Some(v) = get("CRITICAL_MS") {
            self.thresholds.critical_ms = Some(parse_env("CRITICAL_MS", &v)?);
        }
        if let Some(v) = get("ALERT_ROLE_ID") {
            self.alerts.role_id = Some(v.trim().to_string());
        }
        if let Some(v) = get("ALERT_COOLDOWN") {
            self.alerts.cooldown = parse_env_duration("ALERT_COOLDOWN", &v)?;
        }
        if let Some(v) = get("ALERT_ESCALATE_AFTER") {
            self.alerts.escalate_after = Some(parse_env_duration("ALERT_ESCALATE_AFTER", &v)?);
        }
        if let Some(v) = get("STATE_DIR") {
            self.state.dir = PathBuf::from(v.trim());
        }

        if let Some(v) = get("REGIONS") {
            let wanted: Vec<&str> = v.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
            let mut kept = Vec::with_capacity(wanted.len());
            for name in wanted {
                match self.regions.iter().find(|r| r.name.eq_ignore_ascii_case(name)) {
                    Some(region) => kept.push(region.clone()),
                    None => self.unknown_regions.push(name.to_string()),
                }
            }
            self.regions = kept;
        }

        for region in &self.regions {
            let key = env_key_for_region(&region.name);
            if let Some(role) = get(&key) {
                self.alerts
                    .region_roles
                    .insert(region.name.clone(), role.trim().to_string());
            }
        }

        Ok(())
    }

    /// The webhook endpoint, checked for a usable http(s) URL.
    pub fn webhook_url(&self) -> Result<reqwest::Url, ConfigError> {
        let raw = self
            .webhook
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingWebhook)?;

        let url = reqwest::Url::parse(raw).map_err(|e| ConfigError::InvalidWebhook(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidWebhook(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidWebhook("missing host".to_string()));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidWebhook("not a hierarchical URL".to_string()));
        }
        Ok(url)
    }

    /// Threshold settings as the classifier type
    pub fn to_thresholds(&self) -> Thresholds {
        Thresholds {
            info_ms: self.thresholds.info_ms,
            warn_ms: self.thresholds.warn_ms,
            critical_ms: self.thresholds.critical_ms,
        }
    }

    /// Samples kept in the history buffer
    pub fn history_capacity(&self) -> usize {
        let hours = (self.history.retention.as_secs() / 3600).max(1) as usize;
        hours * self.history.samples_per_hour as usize
    }

    /// Convert to the settings consumed by a run
    pub fn to_reporter_settings(&self) -> ReporterSettings {
        let per_hour = self.history.samples_per_hour as u64;
        ReporterSettings {
            title: self.webhook.title.clone(),
            username: self.webhook.username.clone(),
            thumbnail_url: self.webhook.thumbnail_url.clone(),
            thresholds: self.to_thresholds(),
            concurrency: self.probe.concurrency,
            history_capacity: self.history_capacity(),
            uptime_windows: self
                .history
                .uptime_windows
                .iter()
                .map(|w| UptimeWindowSpec {
                    label: w.label.clone(),
                    samples: ((w.span.as_secs() * per_hour) / 3600).max(1) as usize,
                })
                .collect(),
            alerts: self.alerts.clone(),
            links: self
                .links
                .iter()
                .map(|l| (l.label.clone(), l.url.clone()))
                .collect(),
            changelog_capacity: self.changelog.max_entries,
            changelog_shown: self.changelog.shown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.platforms.len(), 3);
        assert_eq!(config.regions.len(), 3);
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
webhook:
  title: "Game Status"
  max_attempts: 3
  max_wait: 30s
  initial_backoff: 500ms
  request_timeout: 5s

thresholds:
  info_ms: 60
  warn_ms: 120
  critical_ms: 300

probe:
  timeout: 2s
  concurrency: 4
  attempts: 2

regions:
  - name: Europe
    targets: ["eu.example.net:1119", "https://eu.example.net/ping"]

platforms:
  - id: Steam
    label: Steam
    url: https://steamstat.us
    sources:
      - type: json
        url: https://steamstat.us/api/status
        path: ["services", "0", "status"]
        keywords:
          ok: ["normal"]
          warn: ["slow"]
          bad: ["offline"]

history:
  retention: 7days
  samples_per_hour: 2
  uptime_windows:
    - label: 24h
      span: 24h

links:
  - label: Forums
    url: https://example.com/forums
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.webhook.max_wait, Duration::from_secs(30));
        assert_eq!(config.thresholds.critical_ms, Some(300.0));
        assert_eq!(config.regions[0].targets.len(), 2);
        assert!(matches!(config.platforms[0].sources[0], SourceSettings::Json { .. }));
        assert_eq!(config.history_capacity(), 7 * 24 * 2);

        let settings = config.to_reporter_settings();
        assert_eq!(settings.uptime_windows[0].samples, 48);
        assert_eq!(settings.links, vec![("Forums".to_string(), "https://example.com/forums".to_string())]);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
probe:
  timeout: 1s
  concurrency: 2
  attempts: 1
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.warn_ms, 150.0);
        assert_eq!(config.platforms.len(), 3);
        assert_eq!(config.state.dir, PathBuf::from("state"));
    }

    #[test]
    fn test_invalid_threshold_order() {
        let yaml = r#"
thresholds:
  info_ms: 200
  warn_ms: 100
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
thresholds:
  info_ms: 50
  warn_ms: 100
  critical_ms: 90
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_probe_settings() {
        let yaml = r#"
probe:
  timeout: 10ms  # Invalid: < 100ms
  concurrency: 4
  attempts: 1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
probe:
  timeout: 1s
  concurrency: 0  # Invalid: < 1
  attempts: 1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_validation() {
        assert!(validate_targets(&["eu.example.net:1119".to_string()]).is_ok());
        assert!(validate_targets(&["https://eu.example.net/ping".to_string()]).is_ok());
        assert!(validate_targets(&["[::1]:443".to_string()]).is_ok());

        assert!(validate_targets(&["eu.example.net".to_string()]).is_err());
        assert!(validate_targets(&[":1119".to_string()]).is_err());
        assert!(validate_targets(&["host:0".to_string()]).is_err());
        assert!(validate_targets(&["host:http".to_string()]).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("DISCORD_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
                ("INFO_MS", "70"),
                ("WARN_MS", "140"),
                ("CRITICAL_MS", "500"),
                ("REGIONS", "europe, Asia, Mars"),
                ("ALERT_ROLE_ID", "123456"),
                ("REGION_ROLE_EUROPE", "777"),
                ("ALERT_COOLDOWN", "2h"),
                ("ALERT_ESCALATE_AFTER", "6h"),
                ("STATE_DIR", "/tmp/status"),
            ]))
            .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds.info_ms, 70.0);
        assert_eq!(config.thresholds.critical_ms, Some(500.0));
        let names: Vec<_> = config.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Europe", "Asia"]);
        assert_eq!(config.unknown_regions, vec!["Mars".to_string()]);
        assert_eq!(config.alerts.role_id.as_deref(), Some("123456"));
        assert_eq!(config.alerts.region_roles.get("Europe").map(String::as_str), Some("777"));
        assert_eq!(config.alerts.cooldown, Duration::from_secs(7200));
        assert_eq!(config.alerts.escalate_after, Some(Duration::from_secs(6 * 3600)));
        assert_eq!(config.state.dir, PathBuf::from("/tmp/status"));
        assert!(config.webhook_url().is_ok());
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env(&[("WARN_MS", "fast")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "WARN_MS"));

        let err = config
            .apply_env_overrides(env(&[("ALERT_COOLDOWN", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_webhook_url_validation() {
        let mut config = Config::default();
        assert!(matches!(config.webhook_url(), Err(ConfigError::MissingWebhook)));

        config.webhook.url = Some("not a url".to_string());
        assert!(matches!(config.webhook_url(), Err(ConfigError::InvalidWebhook(_))));

        config.webhook.url = Some("ftp://discord.com/api/webhooks/1/abc".to_string());
        assert!(matches!(config.webhook_url(), Err(ConfigError::InvalidWebhook(_))));

        config.webhook.url = Some("https://discord.com/api/webhooks/1/abc".to_string());
        assert_eq!(
            config.webhook_url().unwrap().as_str(),
            "https://discord.com/api/webhooks/1/abc"
        );
    }

    #[test]
    fn test_role_id_must_be_numeric() {
        assert!(validate_role_id("123").is_ok());
        assert!(validate_role_id("").is_err());
        assert!(validate_role_id("<@&123>").is_err());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/status-reporter.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status-reporter.yaml");
        std::fs::write(&path, "{}\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_into_common_error() {
        let err: common::Error = ConfigError::MissingWebhook.into();
        assert!(matches!(err, common::Error::Config(_)));
        assert!(err.to_string().contains("DISCORD_WEBHOOK_URL"));
    }
}
