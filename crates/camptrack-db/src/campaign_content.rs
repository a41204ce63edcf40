//! Database operations for `campaign_content`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `campaign_content` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignContentRow {
    pub id: i64,
    pub campaign_id: String,
    pub platform: String,
    pub url: String,
    /// Message of the most recent failed fetch, cleared by a later success.
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Registers a content URL for a campaign. Re-registering is a no-op.
///
/// Returns the existing or newly inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_content(
    pool: &PgPool,
    campaign_id: &str,
    platform: &str,
    url: &str,
) -> Result<CampaignContentRow, DbError> {
    // DO UPDATE with a no-op assignment so RETURNING yields the row on conflict.
    let row = sqlx::query_as::<_, CampaignContentRow>(
        "INSERT INTO campaign_content (campaign_id, platform, url) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (campaign_id, platform, url) DO UPDATE \
         SET url = EXCLUDED.url \
         RETURNING id, campaign_id, platform, url, last_error, last_error_at, created_at",
    )
    .bind(campaign_id)
    .bind(platform)
    .bind(url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// URLs registered for `(campaign_id, platform)`, in registration order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_content_urls(
    pool: &PgPool,
    campaign_id: &str,
    platform: &str,
) -> Result<Vec<String>, DbError> {
    let urls = sqlx::query_scalar::<_, String>(
        "SELECT url FROM campaign_content \
         WHERE campaign_id = $1 AND platform = $2 \
         ORDER BY id ASC",
    )
    .bind(campaign_id)
    .bind(platform)
    .fetch_all(pool)
    .await?;

    Ok(urls)
}

/// Every content row registered for a campaign, across platforms.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_campaign_content(
    pool: &PgPool,
    campaign_id: &str,
) -> Result<Vec<CampaignContentRow>, DbError> {
    let rows = sqlx::query_as::<_, CampaignContentRow>(
        "SELECT id, campaign_id, platform, url, last_error, last_error_at, created_at \
         FROM campaign_content \
         WHERE campaign_id = $1 \
         ORDER BY platform ASC, id ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Records a failed fetch on a registered content row.
///
/// Returns `false` if no row matches (the URL was never registered).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn record_content_error(
    pool: &PgPool,
    campaign_id: &str,
    platform: &str,
    url: &str,
    message: &str,
    at: DateTime<Utc>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE campaign_content \
         SET last_error = $4, last_error_at = $5 \
         WHERE campaign_id = $1 AND platform = $2 AND url = $3",
    )
    .bind(campaign_id)
    .bind(platform)
    .bind(url)
    .bind(message)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Clears the recorded fetch error of a content row after a successful fetch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn clear_content_error(
    pool: &PgPool,
    campaign_id: &str,
    platform: &str,
    url: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE campaign_content \
         SET last_error = NULL, last_error_at = NULL \
         WHERE campaign_id = $1 AND platform = $2 AND url = $3 \
           AND last_error IS NOT NULL",
    )
    .bind(campaign_id)
    .bind(platform)
    .bind(url)
    .execute(pool)
    .await?;

    Ok(())
}
