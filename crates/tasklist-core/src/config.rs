//! Client configuration.
//!
//! Sources, later wins: defaults -> TOML file -> environment -> CLI flags.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::cache::RetryPolicy;
use crate::domain::ClientError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
/// Freshness window for cached views and search results.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_SEARCH_MIN_QUERY_LEN: usize = 2;

/// HTTP verb used for task updates.
///
/// `PATCH` by default; some deployments only route `PUT /tasks/{id}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Patch,
    Put,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub stale_time_secs: u64,
    /// Transparent retries for reads. Mutations are never retried.
    pub query_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub search_debounce_ms: u64,
    pub search_min_query_len: usize,
    /// `None` leaves the HTTP client default in place.
    pub request_timeout_secs: Option<u64>,
    pub update_method: UpdateMethod,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default_query();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            stale_time_secs: DEFAULT_STALE_TIME.as_secs(),
            query_retries: retry.max_retries,
            retry_base_delay_ms: millis(retry.base_delay),
            retry_max_delay_ms: millis(retry.max_delay),
            search_debounce_ms: millis(DEFAULT_SEARCH_DEBOUNCE),
            search_min_query_len: DEFAULT_SEARCH_MIN_QUERY_LEN,
            request_timeout_secs: None,
            update_method: UpdateMethod::Patch,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ClientError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ClientError::Config(format!("toml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `TASKLIST_*` environment overrides.
    pub fn with_env(self) -> Result<Self, ClientError> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Like `with_env`, reading variables through `lookup`.
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        if let Some(url) = lookup("TASKLIST_API_URL") {
            self.api_url = url;
        }
        if let Some(raw) = lookup("TASKLIST_STALE_TIME_SECS") {
            self.stale_time_secs = parse_env("TASKLIST_STALE_TIME_SECS", &raw)?;
        }
        if let Some(raw) = lookup("TASKLIST_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(parse_env("TASKLIST_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| ClientError::Config(format!("api_url '{}': {e}", self.api_url)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "api_url '{}' cannot be used as a base url",
                self.api_url
            )));
        }
        if self.search_min_query_len == 0 {
            return Err(ClientError::Config(
                "search_min_query_len must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.query_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            multiplier: 2.0,
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ClientError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ClientError::Config(format!("{name}={raw}: {e}")))
}
