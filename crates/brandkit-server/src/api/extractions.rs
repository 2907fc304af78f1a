//! Extraction handlers.
//!
//! - `GET  /api/v1/brands/{brand_id}/extractions/{kind}` returns the fresh cached row.
//! - `POST /api/v1/brands/{brand_id}/extractions/{kind}` runs the pipeline.
//!
//! The caller's LLM key travels in the `x-llm-api-key` header; without it the
//! configured key is used.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use brandkit_core::ExtractionKind;
use brandkit_db::CachedExtractionRow;
use brandkit_extract::ExtractionOptions;
use brandkit_runs::TrackingPolicy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_extract_error, parse_uuid_or_validation_error, ApiError, ApiResponse,
    AppState,
};

pub(super) const LLM_API_KEY_HEADER: &str = "x-llm-api-key";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RunExtractionRequest {
    pub policy: TrackingPolicy,
    pub force_refresh: bool,
    pub parent_run_id: Option<String>,
    pub clerk_org_id: Option<String>,
    pub max_pages: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct ExtractionResponse {
    pub cached: bool,
    pub result: CachedExtractionRow,
    pub run_id: Option<String>,
}

fn parse_target(
    request_id: &str,
    brand_id: &str,
    kind: &str,
) -> Result<(Uuid, ExtractionKind), ApiError> {
    let brand_id = parse_uuid_or_validation_error(request_id, "brand_id", brand_id)?;
    let kind = kind
        .parse::<ExtractionKind>()
        .map_err(|e| ApiError::new(request_id, "validation_error", e.to_string()))?;
    Ok((brand_id, kind))
}

pub(super) async fn get_cached(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((brand_id, kind)): Path<(String, String)>,
) -> Result<Json<ApiResponse<CachedExtractionRow>>, ApiError> {
    let (brand_id, kind) = parse_target(&req_id.0, &brand_id, &kind)?;

    let row = brandkit_db::get_cached_extraction(&state.pool, brand_id, kind)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.as_str(),
                "not_found",
                format!("no fresh {kind} extraction for brand {brand_id}"),
            )
        })?;

    Ok(Json(ApiResponse::new(req_id.0, row)))
}

pub(super) async fn run_extraction(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((brand_id, kind)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<RunExtractionRequest>,
) -> Result<Json<ApiResponse<ExtractionResponse>>, ApiError> {
    let (brand_id, kind) = parse_target(&req_id.0, &brand_id, &kind)?;
    if body.max_pages == Some(0) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "max_pages must be at least 1",
        ));
    }

    let llm_api_key = headers
        .get(LLM_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let options = ExtractionOptions {
        policy: body.policy,
        force_refresh: body.force_refresh,
        parent_run_id: body.parent_run_id,
        clerk_org_id: body.clerk_org_id,
        max_pages: body.max_pages,
    };

    let outcome = brandkit_extract::run_extraction_pipeline(
        &state.extraction,
        brand_id,
        kind,
        llm_api_key,
        &options,
    )
    .await
    .map_err(|e| map_extract_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        ExtractionResponse {
            cached: outcome.cached,
            result: outcome.result,
            run_id: outcome.run_id,
        },
    )))
}
