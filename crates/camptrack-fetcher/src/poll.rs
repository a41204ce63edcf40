//! Bounded polling for long-running external jobs.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Fixed-interval poll bound: at most `max_attempts` status checks with
/// `interval` between consecutive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollConfig {
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Worst-case time spent sleeping between polls.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.interval
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 60)
    }
}

/// Outcome of one status check.
#[derive(Debug)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

/// Calls `check` until it reports [`PollStatus::Ready`], an error, or the
/// attempt budget runs out.
///
/// Returns `Ok(None)` when every attempt came back `Pending`; the caller turns
/// that into a typed timeout with its own context.
pub(crate) async fn poll_bounded<T, F, Fut>(
    config: PollConfig,
    mut check: F,
) -> Result<Option<T>, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, FetchError>>,
{
    for attempt in 1..=config.max_attempts {
        match check(attempt).await? {
            PollStatus::Ready(value) => return Ok(Some(value)),
            PollStatus::Pending => {
                if attempt < config.max_attempts {
                    tokio::time::sleep(config.interval).await;
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn fast(max_attempts: u32) -> PollConfig {
        PollConfig::new(Duration::ZERO, max_attempts)
    }

    #[tokio::test]
    async fn returns_value_once_ready() {
        let result = poll_bounded(fast(5), |attempt| async move {
            if attempt < 3 {
                Ok(PollStatus::Pending)
            } else {
                Ok(PollStatus::Ready(attempt))
            }
        })
        .await
        .unwrap();
        assert_eq!(result, Some(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: Option<()> = poll_bounded(fast(4), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(PollStatus::Pending)
            }
        })
        .await
        .unwrap();
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stops_on_first_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: Result<Option<()>, _> = poll_bounded(fast(10), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::ScrapeRunFailed {
                    run_id: "r1".to_owned(),
                    status: "FAILED".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(FetchError::ScrapeRunFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let config = PollConfig::new(Duration::from_secs(2), 0);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.max_wait(), Duration::ZERO);
    }

    #[test]
    fn max_wait_counts_gaps_between_polls() {
        let config = PollConfig::new(Duration::from_secs(5), 4);
        assert_eq!(config.max_wait(), Duration::from_secs(15));
    }
}
