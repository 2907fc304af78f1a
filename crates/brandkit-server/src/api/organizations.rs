//! `POST /api/v1/organizations/resolve`

use axum::{extract::State, Extension, Json};
use brandkit_db::OrganizationRow;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ResolveOrganizationRequest {
    /// Defaults to the server's configured app id.
    pub app_id: Option<String>,
    pub external_org_id: String,
}

pub(super) async fn resolve_organization(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ResolveOrganizationRequest>,
) -> Result<Json<ApiResponse<OrganizationRow>>, ApiError> {
    let external_org_id = body.external_org_id.trim();
    if external_org_id.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "external_org_id must not be empty",
        ));
    }
    let app_id = body
        .app_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(state.app_id.as_str());

    let org = brandkit_db::resolve_or_create_organization(&state.pool, app_id, external_org_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, org)))
}
