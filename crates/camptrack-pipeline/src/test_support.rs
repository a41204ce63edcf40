//! Fakes shared by the pipeline unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camptrack_core::{MetricsResult, Platform};
use camptrack_fetcher::{FetchError, FetcherRegistry, MetricsFetcher, RawEngagement};

use crate::store::{ResponseCache, StoreError};

pub(crate) const YT_URL: &str = "https://www.youtube.com/watch?v=abc12345678";
pub(crate) const YT_URL_2: &str = "https://youtu.be/zzz98765432";
pub(crate) const TT_URL: &str = "https://www.tiktok.com/@brand/video/7301234567890";
pub(crate) const UNKNOWN_URL: &str = "https://notaplatform.example/x";

/// Answers from a fixed URL table and counts every call. URLs not in the
/// table fail with `NotFound`.
pub(crate) struct StubFetcher {
    platform: Platform,
    responses: HashMap<String, (u64, u64)>,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl StubFetcher {
    pub(crate) fn new(platform: Platform) -> Self {
        Self {
            platform,
            responses: HashMap::new(),
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn respond(mut self, url: &str, views: u64, engagement: u64) -> Self {
        self.responses.insert(url.to_owned(), (views, engagement));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsFetcher for StubFetcher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_engagement(&self, url: &str) -> Result<RawEngagement, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.get(url) {
            Some(&(views, engagement)) => Ok(RawEngagement {
                views,
                likes: engagement,
                ..RawEngagement::default()
            }),
            None => Err(FetchError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}

pub(crate) fn registry(fetchers: &[Arc<StubFetcher>]) -> Arc<FetcherRegistry> {
    let registry = fetchers
        .iter()
        .fold(FetcherRegistry::new(Duration::from_secs(5)), |registry, f| {
            registry.with_fetcher(Arc::clone(f) as Arc<dyn MetricsFetcher>)
        });
    Arc::new(registry)
}

/// A cache whose backing store is down.
pub(crate) struct BrokenCache;

#[async_trait]
impl ResponseCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<MetricsResult>, StoreError> {
        Err(StoreError::InvalidRow("cache unavailable".to_owned()))
    }

    async fn put(
        &self,
        _key: &str,
        _value: &MetricsResult,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::InvalidRow("cache unavailable".to_owned()))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Err(StoreError::InvalidRow("cache unavailable".to_owned()))
    }
}
