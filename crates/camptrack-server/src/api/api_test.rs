use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use camptrack_core::Platform;
use camptrack_fetcher::{FetchError, FetcherRegistry, MetricsFetcher, RawEngagement};
use camptrack_pipeline::{JobStore, MemoryCache, MemoryStore};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use super::*;

const YT_URL: &str = "https://www.youtube.com/watch?v=abc12345678";

/// Reports 1000 views and 50 likes for every URL.
struct FixedYoutube;

#[async_trait]
impl MetricsFetcher for FixedYoutube {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch_engagement(&self, _url: &str) -> Result<RawEngagement, FetchError> {
        Ok(RawEngagement {
            views: 1000,
            likes: 50,
            ..RawEngagement::default()
        })
    }
}

/// Memory-backed state. The pool never connects; only `/health` touches it.
fn test_app() -> (Router, Arc<MemoryStore>) {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://camptrack@127.0.0.1:1/unused")
        .expect("lazy pool");
    let store = Arc::new(MemoryStore::new());
    let registry =
        FetcherRegistry::new(Duration::from_secs(5)).with_fetcher(Arc::new(FixedYoutube));
    let aggregator = BatchAggregator::new(
        Arc::new(registry),
        Arc::new(MemoryCache::new()),
        Duration::from_secs(60),
    );
    let state = AppState {
        pool,
        aggregator: Arc::new(aggregator),
        queue: JobQueue::new(store.clone()),
        metrics: store.clone(),
    };
    (build_app(state, default_rate_limit_state()), store)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn pipeline_validation_errors_are_not_internal() {
    let err = map_pipeline_error("req-1".to_string(), &PipelineError::EmptyCampaignId);
    assert_eq!(err.error.code, "validation_error");

    let err = map_pipeline_error(
        "req-1".to_string(),
        &PipelineError::Store(StoreError::NotFound(4)),
    );
    assert_eq!(err.error.code, "internal_error");
    assert_eq!(err.error.message, "store operation failed");
}

#[tokio::test]
async fn batch_endpoint_returns_items_and_totals() {
    let (app, _) = test_app();
    let (status, json) = send(
        app,
        post_json(
            "/api/v1/analytics/batch",
            &serde_json::json!({ "urls": [YT_URL, "https://notaplatform.example/x"] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let items = json["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["platform"], "youtube");
    assert_eq!(items[0]["views"], 1000);
    assert_eq!(items[1]["platform"], "unknown");
    assert_eq!(items[1]["error"], "unsupported platform");
    assert_eq!(json["data"]["totals"]["total_views"], 1000);
    assert_eq!(json["data"]["totals"]["failed_count"], 1);
    assert!(json["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn register_content_rejects_unsupported_url() {
    let (app, store) = test_app();
    let (status, json) = send(
        app,
        post_json(
            "/api/v1/campaigns/c1/content",
            &serde_json::json!({ "urls": [YT_URL, "https://notaplatform.example/x"] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(store
        .content_urls("c1", Platform::Youtube)
        .await
        .expect("urls")
        .is_empty());
}

#[tokio::test]
async fn enqueue_without_body_creates_one_job_per_platform() {
    let (app, _) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/campaigns/c1/analytics/jobs")
        .body(Body::empty())
        .expect("request");
    let (status, json) = send(app.clone(), request).await;

    assert_eq!(status, StatusCode::CREATED);
    let jobs = json["data"].as_array().expect("jobs");
    assert_eq!(jobs.len(), Platform::SUPPORTED.len());
    assert!(jobs.iter().all(|j| j["status"] == "pending"));

    let (status, json) = send(app, get_req("/api/v1/campaigns/c1/analytics/jobs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn enqueue_unknown_platform_is_rejected() {
    let (app, store) = test_app();
    let (status, json) = send(
        app,
        post_json(
            "/api/v1/campaigns/c1/analytics/jobs",
            &serde_json::json!({ "platforms": ["youtube", "unknown"] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(store.list_pending(10).await.expect("pending").is_empty());
}

#[tokio::test]
async fn snapshot_is_not_found_before_first_refresh() {
    let (app, _) = test_app();
    let (status, json) = send(app, get_req("/api/v1/campaigns/c1/analytics")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn snapshot_reflects_refreshed_metrics() {
    let (app, store) = test_app();
    let (status, _) = send(
        app.clone(),
        post_json(
            "/api/v1/campaigns/c1/content",
            &serde_json::json!({ "urls": [YT_URL] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let item = camptrack_core::ContentMetrics::new(
        camptrack_core::ContentReference::new(YT_URL),
        camptrack_core::MetricsResult::derived(1000, 50, Utc::now()),
    );
    store.upsert_metrics("c1", &item).await.expect("upsert");
    camptrack_pipeline::refresh_snapshot(store.as_ref(), "c1")
        .await
        .expect("refresh");

    let (status, json) = send(app, get_req("/api/v1/campaigns/c1/analytics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["campaign_id"], "c1");
    assert_eq!(json["data"]["total_views"], 1000);
    assert_eq!(json["data"]["per_item"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let (app, _) = test_app();
    let (status, json) = send(app, get_req("/api/v1/health")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["data"]["status"], "degraded");
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_returns_ok_with_database(pool: sqlx::PgPool) {
    let store = Arc::new(camptrack_pipeline::PgStore::new(pool.clone()));
    let aggregator = BatchAggregator::new(
        Arc::new(FetcherRegistry::new(Duration::from_secs(5))),
        Arc::new(camptrack_pipeline::PgCache::new(pool.clone())),
        Duration::from_secs(60),
    );
    let state = AppState {
        pool,
        aggregator: Arc::new(aggregator),
        queue: JobQueue::new(store.clone()),
        metrics: store,
    };
    let app = build_app(state, default_rate_limit_state());

    let (status, json) = send(app, get_req("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["database"], "ok");
}
