//! Retry policy for reads: decides how many times and how long to wait.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::ClientError;

/// Retry policy for failed reads.
///
/// Mutations never go through this; only list and search queries do.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first failure (0 = fail immediately).
    pub max_retries: u32,

    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// One retry, 1s base, doubling, capped at 30s.
    pub fn default_query() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Calculate delay for the next retry based on attempt number.
    ///
    /// # Arguments
    /// * `attempts` - Number of attempts already made (1-indexed).
    ///
    /// delay = min(base_delay * multiplier^(attempts - 1), max_delay)
    ///
    /// Example with base_delay=1s, multiplier=2.0:
    /// - attempt 1 (first failure): 1s
    /// - attempt 2: 2s
    /// - attempt 3: 4s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Run `op`, retrying retryable errors up to `max_retries` times.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts <= self.max_retries => {
                    let delay = self.next_delay(attempts);
                    warn!(
                        operation,
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "read failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy_has_reasonable_values() {
        let policy = RetryPolicy::default_query();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 2.0);
    }

    #[test]
    fn exponential_backoff_increases_until_cap() {
        let policy = RetryPolicy::default_query();

        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(2));
        assert_eq!(policy.next_delay(3), Duration::from_secs(4));
        assert_eq!(policy.next_delay(10), Duration::from_secs(30));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_once() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::default_query()
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ClientError::Transport("reset".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default_query()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Transport("reset".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default_query()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::NotFound("t-1".into()))
            })
            .await;

        assert_eq!(result, Err(ClientError::NotFound("t-1".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
