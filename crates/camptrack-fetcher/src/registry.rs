//! Fetcher trait and platform dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camptrack_core::{AppConfig, ContentReference, MetricsResult, Platform};
use chrono::Utc;

use crate::apify::ApifyClient;
use crate::error::FetchError;
use crate::instagram::InstagramFetcher;
use crate::poll::PollConfig;
use crate::tiktok::TiktokFetcher;
use crate::types::RawEngagement;
use crate::youtube::YoutubeFetcher;

/// Error text for URLs that resolve to no known platform.
pub const UNSUPPORTED_PLATFORM: &str = "unsupported platform";

/// Retry settings shared by the HTTP-backed fetchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

/// Fetches engagement metrics for URLs of one platform.
///
/// Implementors provide [`MetricsFetcher::fetch_engagement`]; callers use
/// [`MetricsFetcher::fetch`], which never fails.
#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Calls the external capability and returns raw counts or a typed error.
    async fn fetch_engagement(&self, url: &str) -> Result<RawEngagement, FetchError>;

    /// Normalized metrics for `url`; any failure becomes the zeroed safe default.
    async fn fetch(&self, url: &str) -> MetricsResult {
        match self.fetch_engagement(url).await {
            Ok(raw) => raw.into_metrics(Utc::now()),
            Err(e) => {
                tracing::warn!(
                    platform = %self.platform(),
                    url,
                    error = %e,
                    "metrics fetch failed"
                );
                MetricsResult::failure(e.to_string(), Utc::now())
            }
        }
    }
}

/// Maps each platform to its fetcher and bounds every call with a timeout.
#[derive(Clone)]
pub struct FetcherRegistry {
    fetchers: HashMap<Platform, Arc<dyn MetricsFetcher>>,
    timeout: Duration,
}

impl FetcherRegistry {
    /// An empty registry; every fetch is capped at `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            fetchers: HashMap::new(),
            timeout,
        }
    }

    /// Registers `fetcher` for its platform, replacing any previous one.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn MetricsFetcher>) -> Self {
        self.fetchers.insert(fetcher.platform(), fetcher);
        self
    }

    /// Builds the production registry: `YouTube` via the Data API, Instagram
    /// and `TikTok` via Apify.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingCredential`] if `YOUTUBE_API_KEY` or
    /// `APIFY_TOKEN` is absent, or [`FetchError::Http`] /
    /// [`FetchError::InvalidBaseUrl`] if a client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let youtube_key = config
            .youtube_api_key
            .as_deref()
            .ok_or(FetchError::MissingCredential("YOUTUBE_API_KEY"))?;
        let apify_token = config
            .apify_token
            .as_deref()
            .ok_or(FetchError::MissingCredential("APIFY_TOKEN"))?;

        let retry = RetryPolicy {
            max_retries: config.fetch_max_retries,
            backoff_base_ms: config.fetch_retry_backoff_base_ms,
        };
        let poll = PollConfig::new(
            Duration::from_secs(config.scrape_poll_interval_secs),
            config.scrape_poll_max_attempts,
        );

        let youtube = YoutubeFetcher::with_base_url(
            youtube_key,
            &config.youtube_base_url,
            config.fetch_request_timeout_secs,
            &config.fetch_user_agent,
            retry,
        )?;
        let apify = Arc::new(ApifyClient::with_base_url(
            apify_token,
            &config.apify_base_url,
            config.fetch_request_timeout_secs,
            &config.fetch_user_agent,
            retry,
            poll,
        )?);

        Ok(Self::new(Duration::from_secs(config.fetch_timeout_secs))
            .with_fetcher(Arc::new(youtube))
            .with_fetcher(Arc::new(InstagramFetcher::new(Arc::clone(&apify))))
            .with_fetcher(Arc::new(TiktokFetcher::new(apify))))
    }

    /// Dispatches to the platform's fetcher.
    ///
    /// Unknown platforms and missing fetchers produce an error result without
    /// any external call. A fetch running past the registry timeout is
    /// reported as an error result; the underlying request is dropped.
    pub async fn fetch(&self, reference: &ContentReference) -> MetricsResult {
        if !reference.platform.is_supported() {
            return MetricsResult::failure(UNSUPPORTED_PLATFORM, Utc::now());
        }
        let Some(fetcher) = self.fetchers.get(&reference.platform) else {
            return MetricsResult::failure(
                format!("no fetcher configured for {}", reference.platform),
                Utc::now(),
            );
        };

        match tokio::time::timeout(self.timeout, fetcher.fetch(&reference.url)).await {
            Ok(result) => result,
            Err(_) => {
                let err = FetchError::TimedOut {
                    timeout_secs: self.timeout.as_secs(),
                };
                tracing::warn!(
                    platform = %reference.platform,
                    url = %reference.url,
                    error = %err,
                    "metrics fetch timed out"
                );
                MetricsResult::failure(err.to_string(), Utc::now())
            }
        }
    }
}

impl std::fmt::Debug for FetcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<&str> = self.fetchers.keys().map(|p| p.as_str()).collect();
        platforms.sort_unstable();
        f.debug_struct("FetcherRegistry")
            .field("platforms", &platforms)
            .field("timeout", &self.timeout)
            .finish()
    }
}
