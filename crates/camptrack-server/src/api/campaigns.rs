//! Campaign content registration, analytics jobs, and snapshot reads.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use camptrack_core::{AnalyticsJob, CampaignAnalyticsSnapshot, ContentReference, Platform};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_pipeline_error, map_store_error, ApiError, ApiResponse, AppState};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct RegisterContentRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct EnqueueRequest {
    /// Omitted or empty means every supported platform.
    #[serde(default)]
    pub platforms: Vec<String>,
}

fn parse_platforms(req_id: &str, raw: &[String]) -> Result<Vec<Platform>, ApiError> {
    if raw.is_empty() {
        return Ok(Platform::SUPPORTED.to_vec());
    }
    raw.iter()
        .map(|p| {
            p.parse::<Platform>()
                .map_err(|e| ApiError::new(req_id, "validation_error", e.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/campaigns/{campaign_id}/content
pub(super) async fn register_content(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<String>,
    Json(body): Json<RegisterContentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<ContentReference>>>), ApiError> {
    let references =
        camptrack_pipeline::register_content(state.metrics.as_ref(), &campaign_id, &body.urls)
            .await
            .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, references)),
    ))
}

/// POST /api/v1/campaigns/{campaign_id}/analytics/jobs
pub(super) async fn enqueue_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<String>,
    body: Option<Json<EnqueueRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<AnalyticsJob>>>), ApiError> {
    let Json(body) = body.unwrap_or_default();
    let platforms = parse_platforms(&req_id.0, &body.platforms)?;

    let jobs = state
        .queue
        .enqueue(&campaign_id, &platforms)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(req_id.0, jobs))))
}

/// GET /api/v1/campaigns/{campaign_id}/analytics/jobs
pub(super) async fn list_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<AnalyticsJob>>>, ApiError> {
    let jobs = state
        .queue
        .get_jobs(&campaign_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, jobs)))
}

/// GET /api/v1/campaigns/{campaign_id}/analytics
pub(super) async fn get_snapshot(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(campaign_id): Path<String>,
) -> Result<Json<ApiResponse<CampaignAnalyticsSnapshot>>, ApiError> {
    let snapshot = camptrack_pipeline::campaign_snapshot(state.metrics.as_ref(), &campaign_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no analytics snapshot for campaign {campaign_id}"),
            )
        })?;

    Ok(Json(ApiResponse::new(req_id.0, snapshot)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_platform_list_means_all_supported() {
        assert_eq!(
            parse_platforms("req", &[]).expect("platforms"),
            Platform::SUPPORTED.to_vec()
        );
    }

    #[test]
    fn platform_names_are_parsed_case_insensitively() {
        let parsed =
            parse_platforms("req", &["TikTok".to_string(), "youtube".to_string()]).expect("parse");
        assert_eq!(parsed, vec![Platform::Tiktok, Platform::Youtube]);
    }

    #[test]
    fn unrecognized_platform_is_a_validation_error() {
        let err = parse_platforms("req", &["myspace".to_string()]).expect_err("invalid");
        assert_eq!(err.error.code, "validation_error");
    }
}
