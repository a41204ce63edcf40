//! Retry with exponential back-off and jitter for third-party API calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx, 429). Everything else is
//! returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx responses and [`FetchError::RateLimited`].
///
/// **Not retriable:** not-found, malformed payloads, unrecognized URLs,
/// failed scrape runs, and poll exhaustion.
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FetchError::RateLimited { .. } => true,
        FetchError::UnexpectedStatus { status, .. } => *status >= 500,
        FetchError::Deserialize { .. }
        | FetchError::InvalidPayload { .. }
        | FetchError::NotFound { .. }
        | FetchError::UnrecognizedUrl { .. }
        | FetchError::ScrapeRunFailed { .. }
        | FetchError::PollTimeout { .. }
        | FetchError::TimedOut { .. }
        | FetchError::InvalidBaseUrl { .. }
        | FetchError::MissingCredential(_) => false,
    }
}

const MAX_DELAY_MS: u64 = 60_000;

/// Jittered exponential delay before retry `attempt` (1-based), raised to the
/// server's `Retry-After` for rate-limit errors. Never above [`MAX_DELAY_MS`].
fn backoff_delay_ms(err: &FetchError, attempt: u32, backoff_base_ms: u64) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;

    let floor = if let FetchError::RateLimited {
        retry_after_secs, ..
    } = err
    {
        retry_after_secs.saturating_mul(1_000)
    } else {
        0
    };
    jittered.max(floor).min(MAX_DELAY_MS)
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3       | 1 000 ms × 2² ± 25 % jitter     |
///
/// Delay is capped at 60 s. A [`FetchError::RateLimited`] waits at least its
/// `Retry-After` value. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(&err, attempt, backoff_base_ms);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn rate_limited() -> FetchError {
        FetchError::RateLimited {
            service: "test".to_owned(),
            retry_after_secs: 0,
        }
    }

    #[test]
    fn not_found_is_not_retriable() {
        assert!(!is_retriable(&FetchError::NotFound {
            url: "https://youtu.be/x".to_owned()
        }));
    }

    #[test]
    fn server_errors_are_retriable_client_errors_are_not() {
        assert!(is_retriable(&FetchError::UnexpectedStatus {
            status: 503,
            url: "u".to_owned()
        }));
        assert!(!is_retriable(&FetchError::UnexpectedStatus {
            status: 403,
            url: "u".to_owned()
        }));
    }

    #[test]
    fn poll_timeout_is_not_retriable() {
        assert!(!is_retriable(&FetchError::PollTimeout {
            run_id: "r".to_owned(),
            attempts: 3
        }));
    }

    #[test]
    fn rate_limit_delay_honors_retry_after() {
        let err = FetchError::RateLimited {
            service: "apify".to_owned(),
            retry_after_secs: 7,
        };
        assert!(backoff_delay_ms(&err, 1, 100) >= 7_000);

        let huge = FetchError::RateLimited {
            service: "apify".to_owned(),
            retry_after_secs: 3_600,
        };
        assert_eq!(backoff_delay_ms(&huge, 1, 0), MAX_DELAY_MS);
    }

    #[test]
    fn server_error_delay_is_jittered_exponential() {
        let err = FetchError::UnexpectedStatus {
            status: 502,
            url: "u".to_owned(),
        };
        let delay = backoff_delay_ms(&err, 3, 1_000);
        assert!((3_000..=5_000).contains(&delay), "delay was {delay}");
        assert!(backoff_delay_ms(&err, 30, 1_000) <= MAX_DELAY_MS);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, FetchError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, FetchError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, FetchError>(rate_limited())
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(FetchError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_deserialize_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                let e = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
                Err::<u32, FetchError>(FetchError::Deserialize {
                    context: "test".to_owned(),
                    source: e,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(FetchError::Deserialize { .. })));
    }
}
