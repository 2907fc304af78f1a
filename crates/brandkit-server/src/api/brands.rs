//! Brand resolution handlers.
//!
//! - `POST /api/v1/brands/resolve` resolves a brand for an organization by url.
//! - `POST /api/v1/brands/merge` resolves or merges a brand by tenant id.

use axum::{extract::State, Extension, Json};
use brandkit_db::{BrandRow, DbError, ResolvedBrand, TenantBrandInput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, parse_uuid_or_validation_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ResolveBrandRequest {
    pub organization_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct MergeBrandRequest {
    pub tenant_external_id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub external_organization_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct MergeBrandResponse {
    pub brand_id: Uuid,
}

pub(super) async fn resolve_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ResolveBrandRequest>,
) -> Result<Json<ApiResponse<BrandRow>>, ApiError> {
    let organization_id =
        parse_uuid_or_validation_error(&req_id.0, "organization_id", &body.organization_id)?;

    match brandkit_db::get_organization(&state.pool, organization_id).await {
        Ok(_) => {}
        Err(DbError::NotFound) => {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("organization {organization_id} not found"),
            ))
        }
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    }

    let resolved = brandkit_db::resolve_or_create_brand(&state.pool, organization_id, &body.url)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    match resolved {
        ResolvedBrand::Owned(brand) => Ok(Json(ApiResponse::new(req_id.0, brand))),
        ResolvedBrand::ForeignOwned { brand, .. } => Err(ApiError::new(
            req_id.0,
            "domain_conflict",
            format!(
                "domain '{}' belongs to brand {} owned by another organization",
                brand.domain.as_deref().unwrap_or_default(),
                brand.id
            ),
        )),
    }
}

pub(super) async fn merge_brand(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<MergeBrandRequest>,
) -> Result<Json<ApiResponse<MergeBrandResponse>>, ApiError> {
    let tenant_external_id = body.tenant_external_id.trim();
    if tenant_external_id.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "tenant_external_id must not be empty",
        ));
    }

    let input = TenantBrandInput {
        tenant_external_id,
        name: body.name.as_deref(),
        url: body.url.as_deref(),
        external_organization_id: body.external_organization_id.as_deref(),
    };
    let brand_id = brandkit_db::resolve_or_merge_brand_by_tenant_id(&state.pool, &input)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        MergeBrandResponse { brand_id },
    )))
}
