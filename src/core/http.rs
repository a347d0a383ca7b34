//! HTTP client construction and retry handling shared by the providers

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, ClientBuilder};

use crate::core::config::{ProviderConfig, RetryPolicy};
use crate::core::error::{Error, ProviderError, Result};

/// Build the HTTP client used for provider lookups
pub fn build_client(config: &ProviderConfig) -> Result<Client> {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(format!("butterfly-pairs/{}", env!("BUTTERFLY_VERSION")))
        .build()
        .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {e}")))
}

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Delay before retry number `attempt` (1-based), doubling up to [`MAX_BACKOFF`]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    policy.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Execute an operation, retrying transient failures with exponential backoff
///
/// Non-transient errors and the last transient error are returned as-is.
/// Once `cancel` resolves no further attempt is made; the error of the last
/// attempt is returned.
pub async fn retry_transient<F, Fut, T, C>(
    policy: &RetryPolicy,
    operation: F,
    cancel: C,
) -> std::result::Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, ProviderError>>,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = backoff_delay(policy, attempt);
                warn!("⚠️  {e} (attempt {attempt}). Retrying in {}ms...", delay.as_millis());

                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        debug!("Retry abandoned after attempt {attempt}");
                        return Err(e);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_network_errors() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = retry_transient(
            &fast_policy(3),
            || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= 2 {
                        Err(ProviderError::Network("connection reset".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            },
            std::future::pending(),
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_permanent_errors() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result: std::result::Result<(), _> = retry_transient(
            &fast_policy(3),
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Status("NoRoute".to_string()))
                }
            },
            std::future::pending(),
        )
        .await;

        assert_eq!(result, Err(ProviderError::Status("NoRoute".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_disabled_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result: std::result::Result<(), _> = retry_transient(
            &RetryPolicy::default(),
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Network("down".to_string()))
                }
            },
            std::future::pending(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_cuts_backoff_short() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(60),
        };

        let started = std::time::Instant::now();
        let result: std::result::Result<(), _> = retry_transient(
            &policy,
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Network("down".to_string()))
                }
            },
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await;

        assert_eq!(result, Err(ProviderError::Network("down".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_second_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result: std::result::Result<(), _> = retry_transient(
            &fast_policy(5),
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Timeout(Duration::from_millis(1)))
                }
            },
            std::future::ready(()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_is_capped() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            base_delay: Duration::from_millis(1000),
        };

        assert_eq!(backoff_delay(&policy, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&policy, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&policy, 4), Duration::from_millis(8000));
        assert_eq!(backoff_delay(&policy, 7), MAX_BACKOFF);
        // Large attempt counts must neither overflow nor exceed the cap
        assert_eq!(backoff_delay(&policy, 40), MAX_BACKOFF);
        assert_eq!(backoff_delay(&policy, u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(&ProviderConfig::default()).is_ok());
    }
}
