//! Bounded retry with exponential backoff for a single model call.
//!
//! Only "did the call complete at all" matters here. Whatever text comes
//! back is handed to the caller untouched, valid or not.

use std::future::Future;
use std::time::Duration;

use crate::providers::{classify_error, is_retryable, ProviderError};

/// How often and how patiently a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::constants::DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(crate::constants::DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(crate::constants::DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Compute the backoff duration before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(self.max_backoff)
    }
}

/// Result of driving one call through the retry loop.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    /// Number of calls made, including the first.
    pub calls: u32,
}

/// Run `call` until it succeeds, fails permanently, or retries run out.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut call: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    calls: attempt + 1,
                };
            }
            Err(e) if is_retryable(&e) && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    model = label,
                    attempt = attempt + 1,
                    max = policy.max_retries + 1,
                    reason = classify_error(&e).unwrap_or("Transient error"),
                    backoff_ms = backoff.as_millis() as u64,
                    "transient model error, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                return RetryOutcome {
                    result: Err(e),
                    calls: attempt + 1,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_is_exponential() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_capped_at_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(20), policy.max_backoff);
    }

    #[tokio::test]
    async fn success_on_first_call() {
        let outcome = call_with_retry(&fast_policy(2), "m", || async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(outcome.result.unwrap(), 7);
        assert_eq!(outcome.calls, 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_retry(&fast_policy(2), "m", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProviderError::ApiError("503 Service Unavailable".into()))
                } else {
                    Ok("text")
                }
            }
        })
        .await;
        assert_eq!(outcome.result.unwrap(), "text");
        assert_eq!(outcome.calls, 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = call_with_retry(&fast_policy(2), "m", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::ApiError("request timed out".into())) }
        })
        .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.calls, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = call_with_retry(&fast_policy(5), "m", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::ApiError("401 Unauthorized".into())) }
        })
        .await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.calls, 1);
    }

    #[tokio::test]
    async fn none_policy_makes_one_call() {
        let outcome: RetryOutcome<()> = call_with_retry(&RetryPolicy::none(), "m", || async {
            Err(ProviderError::ApiError("connection reset".into()))
        })
        .await;
        assert_eq!(outcome.calls, 1);
    }
}
