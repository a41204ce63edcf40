//! Injectable cache and store abstractions.
//!
//! The aggregator and processor only see these traits, so tests substitute
//! [`crate::memory`] fakes for the Postgres-backed implementations.

use std::time::Duration;

use async_trait::async_trait;
use camptrack_core::{
    AnalyticsJob, CampaignAnalyticsSnapshot, ContentMetrics, ContentReference, JobStatus,
    MetricsResult, Platform,
};
use camptrack_db::DbError;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("job {id} cannot move to {to}: expected status {expected}")]
    InvalidTransition {
        id: i64,
        expected: JobStatus,
        to: JobStatus,
    },
    #[error("job {0} not found")]
    NotFound(i64),
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
}

/// A registered content reference with its most recent unresolved fetch error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredContent {
    pub reference: ContentReference,
    /// Set by a failed fetch; cleared by the next successful one.
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Fingerprint-keyed cache of successful fetch responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// The cached value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<MetricsResult>, StoreError>;

    /// Inserts or overwrites `key`, expiring `ttl` from now.
    async fn put(&self, key: &str, value: &MetricsResult, ttl: Duration) -> Result<(), StoreError>;

    /// Removes expired entries and returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// Durable job records and their guarded state transitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(
        &self,
        campaign_id: &str,
        platform: Platform,
    ) -> Result<AnalyticsJob, StoreError>;

    /// Newest first.
    async fn list_jobs(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsJob>, StoreError>;

    /// Oldest first.
    async fn list_pending(&self, limit: usize) -> Result<Vec<AnalyticsJob>, StoreError>;

    /// `pending -> running`. Fails with [`StoreError::InvalidTransition`] if
    /// the job is no longer pending.
    async fn claim(&self, id: i64) -> Result<AnalyticsJob, StoreError>;

    /// `running -> completed`.
    async fn complete(&self, id: i64) -> Result<(), StoreError>;

    /// `running -> failed` with `message`.
    async fn fail(&self, id: i64, message: &str) -> Result<(), StoreError>;

    /// Fails every `running` job started before `started_before`; returns their ids.
    async fn fail_stale(
        &self,
        started_before: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<i64>, StoreError>;
}

/// Campaign content, latest per-item metrics, and snapshots.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Idempotent.
    async fn register_content(
        &self,
        campaign_id: &str,
        reference: &ContentReference,
    ) -> Result<(), StoreError>;

    async fn content_urls(
        &self,
        campaign_id: &str,
        platform: Platform,
    ) -> Result<Vec<String>, StoreError>;

    /// Every registered reference of a campaign, across platforms.
    async fn list_content(&self, campaign_id: &str)
        -> Result<Vec<RegisteredContent>, StoreError>;

    /// Overwrites the row keyed by `(campaign_id, platform, url)` and clears
    /// any fetch error recorded for that content.
    async fn upsert_metrics(&self, campaign_id: &str, item: &ContentMetrics)
        -> Result<(), StoreError>;

    /// Records a failed fetch on registered content. Stored metrics for the
    /// URL are left as they are; unregistered URLs are ignored.
    async fn record_fetch_error(
        &self,
        campaign_id: &str,
        reference: &ContentReference,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn list_metrics(&self, campaign_id: &str) -> Result<Vec<ContentMetrics>, StoreError>;

    async fn save_snapshot(&self, snapshot: &CampaignAnalyticsSnapshot) -> Result<(), StoreError>;

    async fn snapshot(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignAnalyticsSnapshot>, StoreError>;
}

/// `now + ttl`, saturating at the latest representable instant.
pub(crate) fn expires_at(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_adds_ttl() {
        let now = Utc::now();
        assert_eq!(
            expires_at(now, Duration::from_secs(60)),
            now + chrono::Duration::seconds(60)
        );
        assert_eq!(expires_at(now, Duration::ZERO), now);
    }

    #[test]
    fn huge_ttl_saturates() {
        let at = expires_at(Utc::now(), Duration::from_secs(u64::MAX));
        assert_eq!(at, DateTime::<Utc>::MAX_UTC);
    }
}
