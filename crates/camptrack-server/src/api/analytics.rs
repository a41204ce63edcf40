//! Ad-hoc batch analytics: fetch a URL list and aggregate it without
//! touching campaign storage.

use axum::{extract::State, Extension, Json};
use camptrack_core::{CampaignTotals, ContentMetrics};
use camptrack_pipeline::BatchAggregator;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct BatchRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct BatchResponse {
    pub items: Vec<ContentMetrics>,
    pub totals: CampaignTotals,
}

/// POST /api/v1/analytics/batch
///
/// Always 200 once the body parses: per-URL failures are reported inside
/// `items` and counted in `totals.failed_count`.
pub(super) async fn fetch_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<BatchRequest>,
) -> Json<ApiResponse<BatchResponse>> {
    let items = state.aggregator.fetch_batch(&body.urls).await;
    let totals = BatchAggregator::aggregate(&items);

    Json(ApiResponse::new(req_id.0, BatchResponse { items, totals }))
}
