//! TaskClientBuilder - TaskClient の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;
use std::time::Duration;

use super::client::TaskClient;
use crate::cache::{QueryCache, RetryPolicy};
use crate::config::{ClientConfig, DEFAULT_STALE_TIME};
use crate::ports::TaskApi;

/// TaskClientBuilder は TaskClient を構築
///
/// # 使用例
/// ```ignore
/// let client = TaskClientBuilder::new()
///     .api(Arc::new(HttpTaskApi::new("http://localhost:8080/api/v1")?))
///     .stale_time(Duration::from_secs(60))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - `api()` を呼ばずに `build()` すると BuildError::MissingApi
pub struct TaskClientBuilder {
    api: Option<Arc<dyn TaskApi>>,
    stale_time: Duration,
    retry: RetryPolicy,
}

/// BuildError は TaskClient 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no TaskApi configured; call `.api(...)` before `.build()`")]
    MissingApi,
}

impl TaskClientBuilder {
    pub fn new() -> Self {
        Self {
            api: None,
            stale_time: DEFAULT_STALE_TIME,
            retry: RetryPolicy::default_query(),
        }
    }

    /// Stale time and read retries from `config`.
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.stale_time = config.stale_time();
        self.retry = config.retry_policy();
        self
    }

    pub fn api(mut self, api: Arc<dyn TaskApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<TaskClient, BuildError> {
        let api = self.api.ok_or(BuildError::MissingApi)?;
        Ok(TaskClient::new(
            api,
            QueryCache::new(self.stale_time),
            self.retry,
        ))
    }
}

impl Default for TaskClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
