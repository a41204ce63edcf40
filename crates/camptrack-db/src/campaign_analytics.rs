//! Database operations for `campaign_analytics` snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `campaign_analytics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignAnalyticsRow {
    pub campaign_id: String,
    pub total_views: i64,
    pub total_engagement: i64,
    pub average_rate: Decimal,
    pub item_count: i32,
    pub failed_count: i32,
    /// JSON array of per-item metrics.
    pub per_item: serde_json::Value,
    pub last_updated: DateTime<Utc>,
}

/// Values written by [`upsert_snapshot`].
#[derive(Debug, Clone)]
pub struct NewSnapshot<'a, T: Serialize> {
    pub campaign_id: &'a str,
    pub total_views: i64,
    pub total_engagement: i64,
    pub average_rate: Decimal,
    pub item_count: i32,
    pub failed_count: i32,
    pub per_item: &'a T,
    pub last_updated: DateTime<Utc>,
}

/// Replaces the stored snapshot for a campaign.
///
/// # Errors
///
/// Returns [`DbError::Serialize`] if `per_item` cannot be encoded as JSON, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_snapshot<T: Serialize>(
    pool: &PgPool,
    snapshot: &NewSnapshot<'_, T>,
) -> Result<CampaignAnalyticsRow, DbError> {
    let per_item = serde_json::to_value(snapshot.per_item)?;

    let row = sqlx::query_as::<_, CampaignAnalyticsRow>(
        "INSERT INTO campaign_analytics \
             (campaign_id, total_views, total_engagement, average_rate, \
              item_count, failed_count, per_item, last_updated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (campaign_id) DO UPDATE SET \
             total_views = EXCLUDED.total_views, \
             total_engagement = EXCLUDED.total_engagement, \
             average_rate = EXCLUDED.average_rate, \
             item_count = EXCLUDED.item_count, \
             failed_count = EXCLUDED.failed_count, \
             per_item = EXCLUDED.per_item, \
             last_updated = EXCLUDED.last_updated \
         RETURNING campaign_id, total_views, total_engagement, average_rate, \
                   item_count, failed_count, per_item, last_updated",
    )
    .bind(snapshot.campaign_id)
    .bind(snapshot.total_views)
    .bind(snapshot.total_engagement)
    .bind(snapshot.average_rate)
    .bind(snapshot.item_count)
    .bind(snapshot.failed_count)
    .bind(per_item)
    .bind(snapshot.last_updated)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// The stored snapshot for a campaign, or `None` if it was never computed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_snapshot(
    pool: &PgPool,
    campaign_id: &str,
) -> Result<Option<CampaignAnalyticsRow>, DbError> {
    let row = sqlx::query_as::<_, CampaignAnalyticsRow>(
        "SELECT campaign_id, total_views, total_engagement, average_rate, \
                item_count, failed_count, per_item, last_updated \
         FROM campaign_analytics \
         WHERE campaign_id = $1",
    )
    .bind(campaign_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
