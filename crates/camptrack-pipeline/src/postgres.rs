//! Postgres-backed [`ResponseCache`], [`JobStore`], and [`MetricsStore`].

use std::time::Duration;

use async_trait::async_trait;
use camptrack_core::{
    AnalyticsJob, CampaignAnalyticsSnapshot, CampaignTotals, ContentMetrics, ContentReference,
    JobStatus, MetricsResult, Platform,
};
use camptrack_db::{
    AnalyticsJobRow, CampaignAnalyticsRow, CampaignContentRow, ContentMetricsRow, DbError,
    NewContentMetrics, NewSnapshot,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::store::{
    expires_at, JobStore, MetricsStore, RegisteredContent, ResponseCache, StoreError,
};

#[derive(Debug, Clone)]
pub struct PgCache {
    pool: PgPool,
}

impl PgCache {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResponseCache for PgCache {
    async fn get(&self, key: &str) -> Result<Option<MetricsResult>, StoreError> {
        let Some(row) = camptrack_db::get_cached(&self.pool, key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_value(row.value)
            .map_err(|e| StoreError::InvalidRow(format!("cache entry {key}: {e}")))?;
        Ok(Some(value))
    }

    async fn put(&self, key: &str, value: &MetricsResult, ttl: Duration) -> Result<(), StoreError> {
        camptrack_db::put_cached(&self.pool, key, value, expires_at(Utc::now(), ttl)).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(camptrack_db::purge_expired_cache(&self.pool).await?)
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a guarded-update miss to the transition the caller attempted.
fn transition_error(err: DbError, to: JobStatus) -> StoreError {
    match err {
        DbError::InvalidJobTransition {
            id,
            expected_status,
        } => StoreError::InvalidTransition {
            id,
            expected: expected_status.parse().unwrap_or(JobStatus::Pending),
            to,
        },
        other => StoreError::Db(other),
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(
        &self,
        campaign_id: &str,
        platform: Platform,
    ) -> Result<AnalyticsJob, StoreError> {
        let row = camptrack_db::create_job(&self.pool, campaign_id, platform.as_str()).await?;
        job_from_row(row)
    }

    async fn list_jobs(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsJob>, StoreError> {
        camptrack_db::list_jobs_for_campaign(&self.pool, campaign_id, to_i64(limit))
            .await?
            .into_iter()
            .map(job_from_row)
            .collect()
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<AnalyticsJob>, StoreError> {
        camptrack_db::list_pending_jobs(&self.pool, to_i64(limit))
            .await?
            .into_iter()
            .map(job_from_row)
            .collect()
    }

    async fn claim(&self, id: i64) -> Result<AnalyticsJob, StoreError> {
        let row = camptrack_db::claim_job(&self.pool, id)
            .await
            .map_err(|e| transition_error(e, JobStatus::Running))?;
        job_from_row(row)
    }

    async fn complete(&self, id: i64) -> Result<(), StoreError> {
        camptrack_db::complete_job(&self.pool, id)
            .await
            .map_err(|e| transition_error(e, JobStatus::Completed))
    }

    async fn fail(&self, id: i64, message: &str) -> Result<(), StoreError> {
        camptrack_db::fail_job(&self.pool, id, message)
            .await
            .map_err(|e| transition_error(e, JobStatus::Failed))
    }

    async fn fail_stale(
        &self,
        started_before: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<i64>, StoreError> {
        Ok(camptrack_db::fail_stale_jobs(&self.pool, started_before, message).await?)
    }
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn register_content(
        &self,
        campaign_id: &str,
        reference: &ContentReference,
    ) -> Result<(), StoreError> {
        camptrack_db::upsert_content(
            &self.pool,
            campaign_id,
            reference.platform.as_str(),
            &reference.url,
        )
        .await?;
        Ok(())
    }

    async fn content_urls(
        &self,
        campaign_id: &str,
        platform: Platform,
    ) -> Result<Vec<String>, StoreError> {
        Ok(camptrack_db::list_content_urls(&self.pool, campaign_id, platform.as_str()).await?)
    }

    async fn list_content(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<RegisteredContent>, StoreError> {
        camptrack_db::list_campaign_content(&self.pool, campaign_id)
            .await?
            .into_iter()
            .map(content_from_row)
            .collect()
    }

    async fn upsert_metrics(
        &self,
        campaign_id: &str,
        item: &ContentMetrics,
    ) -> Result<(), StoreError> {
        camptrack_db::upsert_content_metrics(
            &self.pool,
            &NewContentMetrics {
                campaign_id,
                platform: item.platform.as_str(),
                url: &item.url,
                views: to_i64(item.metrics.views),
                engagement: to_i64(item.metrics.engagement),
                rate: rate_to_decimal(item.metrics.rate),
                fetched_at: item.metrics.fetched_at,
            },
        )
        .await?;
        camptrack_db::clear_content_error(
            &self.pool,
            campaign_id,
            item.platform.as_str(),
            &item.url,
        )
        .await?;
        Ok(())
    }

    async fn record_fetch_error(
        &self,
        campaign_id: &str,
        reference: &ContentReference,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        camptrack_db::record_content_error(
            &self.pool,
            campaign_id,
            reference.platform.as_str(),
            &reference.url,
            message,
            at,
        )
        .await?;
        Ok(())
    }

    async fn list_metrics(&self, campaign_id: &str) -> Result<Vec<ContentMetrics>, StoreError> {
        camptrack_db::list_content_metrics(&self.pool, campaign_id)
            .await?
            .into_iter()
            .map(metrics_from_row)
            .collect()
    }

    async fn save_snapshot(&self, snapshot: &CampaignAnalyticsSnapshot) -> Result<(), StoreError> {
        let totals = &snapshot.totals;
        camptrack_db::upsert_snapshot(
            &self.pool,
            &NewSnapshot {
                campaign_id: &snapshot.campaign_id,
                total_views: to_i64(totals.total_views),
                total_engagement: to_i64(totals.total_engagement),
                average_rate: rate_to_decimal(totals.average_rate),
                item_count: to_i32(totals.item_count),
                failed_count: to_i32(totals.failed_count),
                per_item: &snapshot.per_item,
                last_updated: snapshot.last_updated,
            },
        )
        .await?;
        Ok(())
    }

    async fn snapshot(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignAnalyticsSnapshot>, StoreError> {
        camptrack_db::get_snapshot(&self.pool, campaign_id)
            .await?
            .map(snapshot_from_row)
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Row conversions
// ---------------------------------------------------------------------------

fn job_from_row(row: AnalyticsJobRow) -> Result<AnalyticsJob, StoreError> {
    let platform: Platform = row
        .platform
        .parse()
        .map_err(|e| StoreError::InvalidRow(format!("analytics job {}: {e}", row.id)))?;
    let status: JobStatus = row
        .status
        .parse()
        .map_err(|e| StoreError::InvalidRow(format!("analytics job {}: {e}", row.id)))?;

    Ok(AnalyticsJob {
        id: row.id,
        public_id: row.public_id,
        campaign_id: row.campaign_id,
        platform,
        status,
        error_message: row.error_message,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
    })
}

fn content_from_row(row: CampaignContentRow) -> Result<RegisteredContent, StoreError> {
    let platform: Platform = row
        .platform
        .parse()
        .map_err(|e| StoreError::InvalidRow(format!("campaign content {}: {e}", row.id)))?;

    Ok(RegisteredContent {
        reference: ContentReference {
            url: row.url,
            platform,
        },
        last_error: row.last_error,
        last_error_at: row.last_error_at,
    })
}

fn metrics_from_row(row: ContentMetricsRow) -> Result<ContentMetrics, StoreError> {
    let platform: Platform = row
        .platform
        .parse()
        .map_err(|e| StoreError::InvalidRow(format!("content metrics {}: {e}", row.id)))?;

    Ok(ContentMetrics {
        url: row.url,
        platform,
        metrics: MetricsResult::success(
            to_u64(row.views),
            to_u64(row.engagement),
            decimal_to_rate(row.rate),
            row.fetched_at,
        ),
    })
}

fn snapshot_from_row(row: CampaignAnalyticsRow) -> Result<CampaignAnalyticsSnapshot, StoreError> {
    let per_item: Vec<ContentMetrics> = serde_json::from_value(row.per_item).map_err(|e| {
        StoreError::InvalidRow(format!("campaign analytics {}: {e}", row.campaign_id))
    })?;

    Ok(CampaignAnalyticsSnapshot {
        campaign_id: row.campaign_id,
        totals: CampaignTotals {
            total_views: to_u64(row.total_views),
            total_engagement: to_u64(row.total_engagement),
            average_rate: decimal_to_rate(row.average_rate),
            item_count: usize::try_from(row.item_count).unwrap_or(0),
            failed_count: usize::try_from(row.failed_count).unwrap_or(0),
        },
        per_item,
        last_updated: row.last_updated,
    })
}

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Rates are stored as `NUMERIC(12,4)`; values past its range saturate.
fn rate_to_decimal(rate: f64) -> Decimal {
    let max = Decimal::new(999_999_999_999, 4);
    Decimal::from_f64(rate)
        .map(|d| d.round_dp(4).min(max))
        .unwrap_or(Decimal::ZERO)
}

fn decimal_to_rate(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_round_trips_at_four_decimal_places() {
        let stored = rate_to_decimal(5.123_456);
        assert_eq!(stored.to_string(), "5.1235");
        assert!((decimal_to_rate(stored) - 5.1235).abs() < 1e-9);
    }

    #[test]
    fn oversized_rate_saturates_at_column_range() {
        // 2e6 engagements on a single view.
        let stored = rate_to_decimal(200_000_000.0);
        assert_eq!(stored.to_string(), "99999999.9999");
        assert_eq!(rate_to_decimal(99_999_999.0), Decimal::new(99_999_999, 0));
    }

    #[test]
    fn non_finite_rate_is_stored_as_zero() {
        assert_eq!(rate_to_decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn negative_counts_read_back_as_zero() {
        assert_eq!(to_u64(-1), 0);
        assert_eq!(to_i64(u64::MAX), i64::MAX);
    }

    #[test]
    fn job_row_with_unknown_status_is_invalid() {
        let row = AnalyticsJobRow {
            id: 3,
            public_id: uuid::Uuid::new_v4(),
            campaign_id: "c1".to_string(),
            platform: "youtube".to_string(),
            status: "queued".to_string(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        assert!(matches!(job_from_row(row), Err(StoreError::InvalidRow(_))));
    }

    #[test]
    fn guarded_update_miss_becomes_invalid_transition() {
        let err = transition_error(
            DbError::InvalidJobTransition {
                id: 9,
                expected_status: "running",
            },
            JobStatus::Completed,
        );
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                id: 9,
                expected: JobStatus::Running,
                to: JobStatus::Completed,
            }
        ));
    }
}
