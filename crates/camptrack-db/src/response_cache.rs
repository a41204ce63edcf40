//! Database operations for the `response_cache` table.
//!
//! Reads filter on `expires_at > NOW()`, so an expired entry is never
//! returned even if the purge has not run yet.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CacheEntryRow {
    pub cache_key: String,
    pub value: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

/// The live entry for `cache_key`, or `None` if absent or expired.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_cached(pool: &PgPool, cache_key: &str) -> Result<Option<CacheEntryRow>, DbError> {
    let row = sqlx::query_as::<_, CacheEntryRow>(
        "SELECT cache_key, value, expires_at \
         FROM response_cache \
         WHERE cache_key = $1 AND expires_at > NOW()",
    )
    .bind(cache_key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Writes `value` under `cache_key`, overwriting any previous entry.
///
/// # Errors
///
/// Returns [`DbError::Serialize`] if `value` cannot be encoded as JSON, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn put_cached<T: Serialize>(
    pool: &PgPool,
    cache_key: &str,
    value: &T,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let value = serde_json::to_value(value)?;

    sqlx::query(
        "INSERT INTO response_cache (cache_key, value, expires_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (cache_key) DO UPDATE SET \
             value = EXCLUDED.value, \
             expires_at = EXCLUDED.expires_at, \
             created_at = NOW()",
    )
    .bind(cache_key)
    .bind(value)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Deletes every entry with `expires_at <= NOW()`. Returns the number removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_expired_cache(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM response_cache WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
