//! Database operations for `analytics_jobs`.
//!
//! Every status change is a guarded `UPDATE ... WHERE status = <expected>`,
//! so two processors racing for the same job cannot both claim it and a
//! terminal job can never be reopened.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const JOB_COLUMNS: &str = "id, public_id, campaign_id, platform, status, error_message, \
                           created_at, started_at, completed_at";

/// A row from the `analytics_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalyticsJobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub campaign_id: String,
    pub platform: String,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Creates a new job in `pending` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_job(
    pool: &PgPool,
    campaign_id: &str,
    platform: &str,
) -> Result<AnalyticsJobRow, DbError> {
    let row = sqlx::query_as::<_, AnalyticsJobRow>(&format!(
        "INSERT INTO analytics_jobs (public_id, campaign_id, platform, status) \
         VALUES ($1, $2, $3, 'pending') \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(campaign_id)
    .bind(platform)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Moves a job from `pending` to `running` and sets `started_at = NOW()`.
///
/// Returns the claimed row.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `pending`
/// (already claimed by another pass, or terminal), or [`DbError::Sqlx`] if
/// the update fails.
pub async fn claim_job(pool: &PgPool, id: i64) -> Result<AnalyticsJobRow, DbError> {
    sqlx::query_as::<_, AnalyticsJobRow>(&format!(
        "UPDATE analytics_jobs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'pending' \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidJobTransition {
        id,
        expected_status: "pending",
    })
}

/// Marks a `running` job as `completed` and sets `completed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analytics_jobs \
         SET status = 'completed', completed_at = NOW() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a `running` job as `failed`, recording `error_message` and
/// `completed_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_job(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analytics_jobs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fails every `running` job whose `started_at` is before `started_before`.
///
/// Returns the ids of the jobs that were failed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_stale_jobs(
    pool: &PgPool,
    started_before: DateTime<Utc>,
    error_message: &str,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "UPDATE analytics_jobs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE status = 'running' AND started_at < $2 \
         RETURNING id",
    )
    .bind(error_message)
    .bind(started_before)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Fetches a single job by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_job(pool: &PgPool, id: i64) -> Result<AnalyticsJobRow, DbError> {
    sqlx::query_as::<_, AnalyticsJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analytics_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the oldest `limit` pending jobs, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_jobs(pool: &PgPool, limit: i64) -> Result<Vec<AnalyticsJobRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalyticsJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analytics_jobs \
         WHERE status = 'pending' \
         ORDER BY created_at ASC, id ASC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns up to `limit` jobs for a campaign, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs_for_campaign(
    pool: &PgPool,
    campaign_id: &str,
    limit: i64,
) -> Result<Vec<AnalyticsJobRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalyticsJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analytics_jobs \
         WHERE campaign_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(campaign_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
