//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::Topic;

/// Environment variable overriding `sink.webhook_url`.
pub const WEBHOOK_ENV: &str = "WEBHOOK_ENDPOINT";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Polling cycle behavior
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Notification delivery
    #[serde(default)]
    pub sink: SinkConfig,

    /// Watermark persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Monitored boards
    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(WEBHOOK_ENV) {
            let endpoint = endpoint.trim();
            if !endpoint.is_empty() {
                self.sink.webhook_url = Some(endpoint.to_string());
            }
        }
    }

    /// Find a topic by key.
    pub fn topic(&self, key: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.key == key)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.notifier.max_sequential_window == Some(0) {
            return Err(AppError::validation(
                "notifier.max_sequential_window must be > 0 when set",
            ));
        }
        if self.topics.is_empty() {
            return Err(AppError::validation("No topics defined"));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.key.trim().is_empty() {
                return Err(AppError::validation("topic key is empty"));
            }
            if !seen.insert(topic.key.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate topic key '{}'",
                    topic.key
                )));
            }
            let url = url::Url::parse(&topic.listing_url).map_err(|e| {
                AppError::validation(format!("topic '{}' listing_url: {e}", topic.key))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::validation(format!(
                    "topic '{}' listing_url must be http(s)",
                    topic.key
                )));
            }
        }

        if let Some(webhook) = &self.sink.webhook_url {
            url::Url::parse(webhook)
                .map_err(|e| AppError::validation(format!("sink.webhook_url: {e}")))?;
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent detail-page requests within a cycle
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// What to do with a new notice whose detail page could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailFailurePolicy {
    /// Emit the listing-level record with a failure marker
    #[default]
    Placeholder,
    /// Skip the record, still advance the watermark
    Drop,
    /// Abort the cycle without touching the watermark
    Hold,
}

impl DetailFailurePolicy {
    /// Whether a batch with failed records may still advance the watermark.
    pub fn accepts_partial(&self) -> bool {
        !matches!(self, DetailFailurePolicy::Hold)
    }
}

/// Polling cycle behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub detail_failure_policy: DetailFailurePolicy,

    /// Upper bound on sequential notices taken from one listing
    #[serde(default)]
    pub max_sequential_window: Option<usize>,
}

/// Payload shape posted to the webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormat {
    /// The notice record as JSON
    #[default]
    Json,
    /// A Slack message with one attachment
    Slack,
}

/// Notification delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Webhook endpoint; notices are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub format: WebhookFormat,
}

/// Watermark persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding per-topic watermarks
    #[serde(default = "defaults::watermark_file")]
    pub watermark_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            watermark_file: defaults::watermark_file(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; notifier/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn watermark_file() -> PathBuf {
        PathBuf::from("data/watermarks.json")
    }
}
