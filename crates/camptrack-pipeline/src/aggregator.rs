//! Batch Analytics Aggregator.
//!
//! Fans fetches out over a URL batch, consulting the response cache first.
//! Every input URL yields exactly one [`ContentMetrics`]; a failing URL
//! becomes an error item and never cancels the rest of the batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use camptrack_core::{
    aggregate, fingerprint, AppConfig, CampaignTotals, ContentMetrics, ContentReference,
    MetricsResult,
};
use camptrack_fetcher::FetcherRegistry;
use futures::stream::{self, StreamExt};

use crate::store::ResponseCache;

pub struct BatchAggregator {
    registry: Arc<FetcherRegistry>,
    cache: Arc<dyn ResponseCache>,
    ttl: Duration,
    max_concurrency: Option<usize>,
}

impl BatchAggregator {
    /// Unbounded fan-out; see [`BatchAggregator::with_max_concurrency`].
    #[must_use]
    pub fn new(
        registry: Arc<FetcherRegistry>,
        cache: Arc<dyn ResponseCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            ttl,
            max_concurrency: None,
        }
    }

    /// TTL and fan-out limit taken from `config`.
    #[must_use]
    pub fn from_config(
        registry: Arc<FetcherRegistry>,
        cache: Arc<dyn ResponseCache>,
        config: &AppConfig,
    ) -> Self {
        Self::new(registry, cache, Duration::from_secs(config.cache_ttl_secs))
            .with_max_concurrency(config.batch_max_concurrency)
    }

    /// Caps in-flight fetches per batch. `None` or `Some(0)` means unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency.filter(|&n| n > 0);
        self
    }

    /// Fetches metrics for every URL in `urls`.
    ///
    /// The output has one item per input URL, in input order. URLs that
    /// share a fingerprint are fetched once and the result is repeated.
    pub async fn fetch_batch<S: AsRef<str>>(&self, urls: &[S]) -> Vec<ContentMetrics> {
        let references: Vec<ContentReference> = urls
            .iter()
            .map(|u| ContentReference::new(u.as_ref()))
            .collect();

        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut distinct: Vec<&ContentReference> = Vec::new();
        let positions: Vec<usize> = references
            .iter()
            .map(|reference| {
                let key = fingerprint(reference.platform, &reference.url);
                *slots.entry(key).or_insert_with(|| {
                    distinct.push(reference);
                    distinct.len() - 1
                })
            })
            .collect();

        let limit = self
            .max_concurrency
            .unwrap_or(distinct.len())
            .clamp(1, distinct.len().max(1));

        let pending: Vec<_> = distinct
            .into_iter()
            .enumerate()
            .map(|(slot, reference)| async move { (slot, self.fetch_one(reference).await) })
            .collect();
        let mut fetched: Vec<(usize, MetricsResult)> = stream::iter(pending)
            .buffer_unordered(limit)
            .collect()
            .await;
        fetched.sort_unstable_by_key(|(slot, _)| *slot);

        let failed = fetched.iter().filter(|(_, r)| !r.is_success()).count();
        tracing::debug!(
            urls = references.len(),
            distinct = fetched.len(),
            failed,
            "batch fetch finished"
        );

        references
            .into_iter()
            .zip(positions)
            .map(|(reference, slot)| ContentMetrics::new(reference, fetched[slot].1.clone()))
            .collect()
    }

    /// Single-URL path: cache lookup, fetch on miss, cache successful results.
    ///
    /// Cache failures are logged and treated as a miss.
    pub async fn fetch_one(&self, reference: &ContentReference) -> MetricsResult {
        if !reference.platform.is_supported() {
            return self.registry.fetch(reference).await;
        }

        let key = fingerprint(reference.platform, &reference.url);
        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                tracing::debug!(cache_key = %key, "response cache hit");
                return hit;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "response cache read failed");
            }
        }

        let result = self.registry.fetch(reference).await;
        if result.is_success() {
            if let Err(e) = self.cache.put(&key, &result, self.ttl).await {
                tracing::warn!(cache_key = %key, error = %e, "response cache write failed");
            }
        }
        result
    }

    /// Campaign-level totals over a batch result.
    #[must_use]
    pub fn aggregate(results: &[ContentMetrics]) -> CampaignTotals {
        aggregate(results)
    }
}

impl std::fmt::Debug for BatchAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchAggregator")
            .field("registry", &self.registry)
            .field("ttl", &self.ttl)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;
