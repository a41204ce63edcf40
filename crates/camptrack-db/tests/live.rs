//! Live integration tests for camptrack-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/camptrack-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use camptrack_db::{
    claim_job, clear_content_error, complete_job, create_job, fail_job, fail_stale_jobs,
    get_cached, get_job, get_snapshot, list_campaign_content, list_content_metrics, list_content_urls,
    list_jobs_for_campaign, list_pending_jobs, purge_expired_cache, put_cached,
    record_content_error, upsert_content,
    upsert_content_metrics, upsert_snapshot, DbError, NewContentMetrics, NewSnapshot,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;

fn metrics<'a>(url: &'a str, views: i64, engagement: i64) -> NewContentMetrics<'a> {
    NewContentMetrics {
        campaign_id: "c1",
        platform: "youtube",
        url,
        views,
        engagement,
        rate: Decimal::new(500, 2),
        fetched_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Section 1: Analytics Job Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn job_lifecycle_pending_to_completed(pool: sqlx::PgPool) {
    let job = create_job(&pool, "c1", "youtube")
        .await
        .expect("create_job failed");

    assert_eq!(job.status, "pending");
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());

    let claimed = claim_job(&pool, job.id).await.expect("claim_job failed");
    assert_eq!(claimed.status, "running");
    assert!(claimed.started_at.is_some(), "started_at should be set");

    complete_job(&pool, job.id).await.expect("complete_job failed");

    let fetched = get_job(&pool, job.id).await.expect("get_job failed");
    assert_eq!(fetched.status, "completed");
    assert!(fetched.completed_at.is_some(), "completed_at should be set");
    assert!(fetched.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn job_lifecycle_pending_to_failed(pool: sqlx::PgPool) {
    let job = create_job(&pool, "c1", "tiktok").await.expect("create failed");
    claim_job(&pool, job.id).await.expect("claim failed");
    fail_job(&pool, job.id, "rate limited by apify")
        .await
        .expect("fail failed");

    let fetched = get_job(&pool, job.id).await.expect("get failed");
    assert_eq!(fetched.status, "failed");
    assert!(fetched.completed_at.is_some());
    assert_eq!(fetched.error_message.as_deref(), Some("rate limited by apify"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn job_can_only_be_claimed_once(pool: sqlx::PgPool) {
    let job = create_job(&pool, "c1", "youtube").await.expect("create failed");
    claim_job(&pool, job.id).await.expect("first claim failed");

    let err = claim_job(&pool, job.id)
        .await
        .expect_err("second claim should fail");
    assert!(matches!(
        err,
        DbError::InvalidJobTransition {
            expected_status: "pending",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn job_cannot_complete_directly_from_pending(pool: sqlx::PgPool) {
    let job = create_job(&pool, "c1", "youtube").await.expect("create failed");

    let err = complete_job(&pool, job.id)
        .await
        .expect_err("completing a pending job should fail");
    assert!(matches!(
        err,
        DbError::InvalidJobTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_job_is_never_reopened(pool: sqlx::PgPool) {
    let job = create_job(&pool, "c1", "youtube").await.expect("create failed");
    claim_job(&pool, job.id).await.expect("claim failed");
    complete_job(&pool, job.id).await.expect("complete failed");

    assert!(claim_job(&pool, job.id).await.is_err());
    assert!(fail_job(&pool, job.id, "late failure").await.is_err());

    let fetched = get_job(&pool, job.id).await.expect("get failed");
    assert_eq!(fetched.status, "completed");
    assert!(fetched.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_job_unknown_id_is_not_found(pool: sqlx::PgPool) {
    let err = get_job(&pool, 999_999).await.expect_err("should be missing");
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn pending_jobs_are_listed_oldest_first_and_bounded(pool: sqlx::PgPool) {
    let first = create_job(&pool, "c1", "youtube").await.expect("create failed");
    let second = create_job(&pool, "c1", "instagram").await.expect("create failed");
    let third = create_job(&pool, "c2", "tiktok").await.expect("create failed");
    claim_job(&pool, second.id).await.expect("claim failed");

    let pending = list_pending_jobs(&pool, 10).await.expect("list failed");
    let ids: Vec<i64> = pending.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);

    let bounded = list_pending_jobs(&pool, 1).await.expect("list failed");
    assert_eq!(bounded.len(), 1);
    assert_eq!(bounded[0].id, first.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn campaign_jobs_are_listed_newest_first(pool: sqlx::PgPool) {
    let older = create_job(&pool, "c1", "youtube").await.expect("create failed");
    let newer = create_job(&pool, "c1", "youtube").await.expect("create failed");
    create_job(&pool, "other", "youtube").await.expect("create failed");

    let jobs = list_jobs_for_campaign(&pool, "c1", 50)
        .await
        .expect("list failed");
    let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_running_jobs_are_failed(pool: sqlx::PgPool) {
    let stale = create_job(&pool, "c1", "youtube").await.expect("create failed");
    let fresh = create_job(&pool, "c1", "tiktok").await.expect("create failed");
    claim_job(&pool, stale.id).await.expect("claim failed");
    claim_job(&pool, fresh.id).await.expect("claim failed");

    sqlx::query("UPDATE analytics_jobs SET started_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(stale.id)
        .execute(&pool)
        .await
        .expect("backdate failed");

    let failed = fail_stale_jobs(&pool, Utc::now() - Duration::hours(1), "job exceeded running timeout")
        .await
        .expect("sweep failed");
    assert_eq!(failed, vec![stale.id]);

    let stale = get_job(&pool, stale.id).await.expect("get failed");
    assert_eq!(stale.status, "failed");
    assert_eq!(stale.error_message.as_deref(), Some("job exceeded running timeout"));
    let fresh = get_job(&pool, fresh.id).await.expect("get failed");
    assert_eq!(fresh.status, "running");
}

// ---------------------------------------------------------------------------
// Section 2: Campaign Content
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn content_registration_is_idempotent(pool: sqlx::PgPool) {
    let url = "https://www.youtube.com/watch?v=abc12345678";
    let first = upsert_content(&pool, "c1", "youtube", url).await.expect("upsert failed");
    let second = upsert_content(&pool, "c1", "youtube", url).await.expect("upsert failed");
    assert_eq!(first.id, second.id);

    upsert_content(&pool, "c1", "tiktok", "https://www.tiktok.com/@a/video/1")
        .await
        .expect("upsert failed");

    let urls = list_content_urls(&pool, "c1", "youtube").await.expect("list failed");
    assert_eq!(urls, vec![url.to_string()]);

    let all = list_campaign_content(&pool, "c1").await.expect("list failed");
    assert_eq!(all.len(), 2);
}

// ---------------------------------------------------------------------------
// Section 3: Content Metrics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn content_error_is_recorded_then_cleared(pool: sqlx::PgPool) {
    let url = "https://youtu.be/abc12345678";
    upsert_content(&pool, "c1", "youtube", url).await.expect("upsert failed");

    let recorded =
        record_content_error(&pool, "c1", "youtube", url, "quota exceeded", Utc::now())
            .await
            .expect("record failed");
    assert!(recorded);
    let unregistered = "https://youtu.be/zzz";
    let missing = record_content_error(&pool, "c1", "youtube", unregistered, "x", Utc::now())
        .await
        .expect("record failed");
    assert!(!missing);

    let rows = list_campaign_content(&pool, "c1").await.expect("list failed");
    assert_eq!(rows[0].last_error.as_deref(), Some("quota exceeded"));
    assert!(rows[0].last_error_at.is_some());

    // Re-registering keeps the recorded error.
    let again = upsert_content(&pool, "c1", "youtube", url).await.expect("upsert failed");
    assert_eq!(again.last_error.as_deref(), Some("quota exceeded"));

    clear_content_error(&pool, "c1", "youtube", url).await.expect("clear failed");
    let rows = list_campaign_content(&pool, "c1").await.expect("list failed");
    assert!(rows[0].last_error.is_none());
    assert!(rows[0].last_error_at.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn metrics_upsert_overwrites_instead_of_duplicating(pool: sqlx::PgPool) {
    let url = "https://www.youtube.com/watch?v=abc12345678";
    let first = upsert_content_metrics(&pool, &metrics(url, 1000, 50))
        .await
        .expect("first upsert failed");
    let second = upsert_content_metrics(&pool, &metrics(url, 2000, 80))
        .await
        .expect("second upsert failed");

    assert_eq!(first.id, second.id);

    let rows = list_content_metrics(&pool, "c1").await.expect("list failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].views, 2000);
    assert_eq!(rows[0].engagement, 80);
    assert_eq!(rows[0].rate, Decimal::new(500, 2));
}

// ---------------------------------------------------------------------------
// Section 4: Snapshots
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn snapshot_upsert_replaces_previous(pool: sqlx::PgPool) {
    assert!(get_snapshot(&pool, "c1").await.expect("get failed").is_none());

    let items = vec![serde_json::json!({ "url": "u1", "views": 10 })];
    for total_views in [10_i64, 25] {
        upsert_snapshot(
            &pool,
            &NewSnapshot {
                campaign_id: "c1",
                total_views,
                total_engagement: 1,
                average_rate: Decimal::new(1000, 2),
                item_count: 1,
                failed_count: 0,
                per_item: &items,
                last_updated: Utc::now(),
            },
        )
        .await
        .expect("upsert failed");
    }

    let row = get_snapshot(&pool, "c1")
        .await
        .expect("get failed")
        .expect("snapshot should exist");
    assert_eq!(row.total_views, 25);
    assert_eq!(row.per_item, serde_json::json!([{ "url": "u1", "views": 10 }]));
}

// ---------------------------------------------------------------------------
// Section 5: Response Cache
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn cache_round_trip_and_expiry(pool: sqlx::PgPool) {
    let value = serde_json::json!({ "views": 1000, "engagement": 50 });
    put_cached(&pool, "youtube:https://youtube.com/watch?v=a", &value, Utc::now() + Duration::hours(1))
        .await
        .expect("put failed");
    put_cached(&pool, "tiktok:https://tiktok.com/@a/video/1", &value, Utc::now() - Duration::seconds(1))
        .await
        .expect("put failed");

    let live = get_cached(&pool, "youtube:https://youtube.com/watch?v=a")
        .await
        .expect("get failed")
        .expect("live entry should be returned");
    assert_eq!(live.value, value);

    let expired = get_cached(&pool, "tiktok:https://tiktok.com/@a/video/1")
        .await
        .expect("get failed");
    assert!(expired.is_none(), "expired entries must not be returned");

    let purged = purge_expired_cache(&pool).await.expect("purge failed");
    assert_eq!(purged, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cache_put_overwrites_existing_key(pool: sqlx::PgPool) {
    let key = "instagram:https://instagram.com/p/abc";
    let expires = Utc::now() + Duration::hours(1);
    put_cached(&pool, key, &serde_json::json!({ "views": 1 }), expires)
        .await
        .expect("put failed");
    put_cached(&pool, key, &serde_json::json!({ "views": 2 }), expires)
        .await
        .expect("put failed");

    let entry = get_cached(&pool, key).await.expect("get failed").expect("entry");
    assert_eq!(entry.value, serde_json::json!({ "views": 2 }));
}
