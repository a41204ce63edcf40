//! Database operations for `content_metrics`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `content_metrics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentMetricsRow {
    pub id: i64,
    pub campaign_id: String,
    pub platform: String,
    pub url: String,
    pub views: i64,
    pub engagement: i64,
    /// `NUMERIC(12,4)`.
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by [`upsert_content_metrics`].
#[derive(Debug, Clone)]
pub struct NewContentMetrics<'a> {
    pub campaign_id: &'a str,
    pub platform: &'a str,
    pub url: &'a str,
    pub views: i64,
    pub engagement: i64,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

/// Inserts or overwrites the metrics row keyed by `(campaign_id, platform, url)`.
///
/// A single atomic statement; concurrent writers to the same key resolve
/// last-write-wins and never produce a duplicate row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_content_metrics(
    pool: &PgPool,
    metrics: &NewContentMetrics<'_>,
) -> Result<ContentMetricsRow, DbError> {
    let row = sqlx::query_as::<_, ContentMetricsRow>(
        "INSERT INTO content_metrics \
             (campaign_id, platform, url, views, engagement, rate, fetched_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (campaign_id, platform, url) DO UPDATE SET \
             views = EXCLUDED.views, \
             engagement = EXCLUDED.engagement, \
             rate = EXCLUDED.rate, \
             fetched_at = EXCLUDED.fetched_at, \
             updated_at = NOW() \
         RETURNING id, campaign_id, platform, url, views, engagement, rate, \
                   fetched_at, created_at, updated_at",
    )
    .bind(metrics.campaign_id)
    .bind(metrics.platform)
    .bind(metrics.url)
    .bind(metrics.views)
    .bind(metrics.engagement)
    .bind(metrics.rate)
    .bind(metrics.fetched_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Every stored metrics row for a campaign.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_content_metrics(
    pool: &PgPool,
    campaign_id: &str,
) -> Result<Vec<ContentMetricsRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentMetricsRow>(
        "SELECT id, campaign_id, platform, url, views, engagement, rate, \
                fetched_at, created_at, updated_at \
         FROM content_metrics \
         WHERE campaign_id = $1 \
         ORDER BY platform ASC, id ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
