//! Campaign snapshot read model.

use camptrack_core::{CampaignAnalyticsSnapshot, ContentMetrics, MetricsResult};
use chrono::{DateTime, Utc};

use crate::store::{MetricsStore, RegisteredContent, StoreError};

/// Error shown for registered content that has no stored metrics yet.
pub const NOT_YET_FETCHED: &str = "metrics not fetched yet";

/// Recomputes a campaign's snapshot and persists it.
///
/// Every registered content reference appears in `per_item`: with its stored
/// metrics, or as an error item when its latest fetch failed or it has never
/// been fetched. Stored metrics without a registration are appended after.
///
/// # Errors
///
/// Returns [`StoreError`] if reading content or metrics, or writing the
/// snapshot, fails.
pub async fn refresh_snapshot(
    store: &dyn MetricsStore,
    campaign_id: &str,
) -> Result<CampaignAnalyticsSnapshot, StoreError> {
    let content = store.list_content(campaign_id).await?;
    let stored = store.list_metrics(campaign_id).await?;
    let now = Utc::now();
    let items = snapshot_items(content, stored, now);
    let snapshot = CampaignAnalyticsSnapshot::from_items(campaign_id, items, now);
    store.save_snapshot(&snapshot).await?;

    tracing::debug!(
        campaign_id,
        total_views = snapshot.totals.total_views,
        items = snapshot.totals.item_count,
        failed = snapshot.totals.failed_count,
        "campaign snapshot refreshed"
    );
    Ok(snapshot)
}

fn snapshot_items(
    content: Vec<RegisteredContent>,
    mut stored: Vec<ContentMetrics>,
    now: DateTime<Utc>,
) -> Vec<ContentMetrics> {
    let mut items = Vec::with_capacity(content.len() + stored.len());
    for entry in content {
        let prior = stored
            .iter()
            .position(|m| m.reference() == entry.reference)
            .map(|i| stored.remove(i));
        let item = match (entry.last_error, prior) {
            (Some(error), _) => ContentMetrics::new(
                entry.reference,
                MetricsResult::failure(error, entry.last_error_at.unwrap_or(now)),
            ),
            (None, Some(metrics)) => metrics,
            (None, None) => {
                ContentMetrics::new(entry.reference, MetricsResult::failure(NOT_YET_FETCHED, now))
            }
        };
        items.push(item);
    }
    items.extend(stored);
    items
}

/// The stored snapshot, or `None` if no refresh has run for the campaign.
///
/// # Errors
///
/// Returns [`StoreError`] if the read fails.
pub async fn campaign_snapshot(
    store: &dyn MetricsStore,
    campaign_id: &str,
) -> Result<Option<CampaignAnalyticsSnapshot>, StoreError> {
    store.snapshot(campaign_id).await
}

#[cfg(test)]
mod tests {
    use camptrack_core::{ContentMetrics, ContentReference, MetricsResult};

    use super::*;
    use crate::memory::MemoryStore;
    use crate::test_support::{TT_URL, YT_URL, YT_URL_2};

    fn ok(url: &str, views: u64, engagement: u64) -> ContentMetrics {
        ContentMetrics::new(
            ContentReference::new(url),
            MetricsResult::derived(views, engagement, Utc::now()),
        )
    }

    #[tokio::test]
    async fn refresh_sums_stored_items() {
        let store = MemoryStore::new();
        for item in [ok(YT_URL, 1000, 50), ok(YT_URL_2, 200, 20)] {
            store.upsert_metrics("c1", &item).await.unwrap();
        }

        let snapshot = refresh_snapshot(&store, "c1").await.unwrap();
        assert_eq!(snapshot.totals.total_views, 1200);
        assert_eq!(snapshot.totals.total_engagement, 70);
        assert!((snapshot.totals.average_rate - 7.5).abs() < 1e-9);
        assert_eq!(snapshot.per_item.len(), 2);

        let stored = campaign_snapshot(&store, "c1").await.unwrap().unwrap();
        assert_eq!(stored, snapshot);
    }

    #[tokio::test]
    async fn campaign_without_metrics_has_zero_snapshot() {
        let store = MemoryStore::new();
        assert!(campaign_snapshot(&store, "c1").await.unwrap().is_none());

        let snapshot = refresh_snapshot(&store, "c1").await.unwrap();
        assert_eq!(snapshot.totals.total_views, 0);
        assert!(snapshot.per_item.is_empty());
    }

    #[tokio::test]
    async fn registered_content_without_metrics_is_an_error_item() {
        let store = MemoryStore::new();
        for url in [YT_URL, TT_URL] {
            store
                .register_content("c1", &ContentReference::new(url))
                .await
                .unwrap();
        }
        store.upsert_metrics("c1", &ok(YT_URL, 1000, 50)).await.unwrap();

        let snapshot = refresh_snapshot(&store, "c1").await.unwrap();
        assert_eq!(snapshot.per_item.len(), 2);
        assert_eq!(snapshot.totals.failed_count, 1);
        assert_eq!(snapshot.totals.total_views, 1000);
        let pending = &snapshot.per_item[1];
        assert_eq!(pending.url, TT_URL);
        assert_eq!(pending.metrics.error.as_deref(), Some(NOT_YET_FETCHED));
    }

    #[tokio::test]
    async fn recorded_fetch_error_masks_prior_metrics_until_next_success() {
        let store = MemoryStore::new();
        let reference = ContentReference::new(YT_URL);
        store.register_content("c1", &reference).await.unwrap();
        store.upsert_metrics("c1", &ok(YT_URL, 1000, 50)).await.unwrap();
        store
            .record_fetch_error("c1", &reference, "quota exceeded", Utc::now())
            .await
            .unwrap();

        let snapshot = refresh_snapshot(&store, "c1").await.unwrap();
        assert_eq!(snapshot.per_item.len(), 1);
        assert_eq!(
            snapshot.per_item[0].metrics.error.as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(snapshot.totals.total_views, 0);
        // The stored row itself is untouched.
        assert_eq!(store.list_metrics("c1").await.unwrap()[0].metrics.views, 1000);

        store.upsert_metrics("c1", &ok(YT_URL, 1500, 60)).await.unwrap();
        let snapshot = refresh_snapshot(&store, "c1").await.unwrap();
        assert_eq!(snapshot.totals.failed_count, 0);
        assert_eq!(snapshot.totals.total_views, 1500);
    }
}
