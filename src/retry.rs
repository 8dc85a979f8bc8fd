//! Centralized retry policy for transient provider failures.
//!
//! Providers perform a single attempt per call; all backoff and retry
//! decisions live here so jitter and attempt budgets are controlled in one
//! place. Retries apply to call initiation only — a stream that has already
//! begun delivering tokens is never retried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::ProviderError;

/// Exponential backoff policy: `base_delay * 2^(attempt-1)` plus up to
/// 500ms of uniform jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_secs: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs_f64(base_delay_secs.max(f64::MIN_POSITIVE)),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay_secs)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let jitter = Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..0.5));
        exp + jitter
    }
}

/// Invoke `op` with exponential backoff on transient provider errors.
///
/// Terminal (`Other`) errors and retry exhaustion return the last error to
/// the caller unchanged.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "provider_retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 0.001)
    }

    #[tokio::test]
    async fn test_success_first_try_single_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = call_with_retry(&fast_policy(3), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>("ok")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success_makes_two_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = std::time::Instant::now();
        let result = call_with_retry(&fast_policy(3), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::rate_limited("slow down"))
                } else {
                    Ok("answer")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // One backoff sleep happened between the two calls.
        assert!(started.elapsed() >= Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_exhausts_retries_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = call_with_retry(&fast_policy(2), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::timeout("still down"))
            }
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("still down"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = call_with_retry(&fast_policy(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::other("bad request"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_coerces_zero_attempts_to_one() {
        let policy = RetryPolicy::new(0, 1.0);
        assert_eq!(policy.max_attempts, 1);
    }
}
