//! `POST /api/v1/organizations/{organization_id}/brand-imports`
//!
//! Resolves a list of brand urls for one organization on a background job.
//! Each entry becomes one job file; progress is read from
//! `GET /api/v1/jobs/{job_id}`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use brandkit_db::{DbError, ResolvedBrand};
use brandkit_extract::{FileOutcome, FileProcessor, ImportFile, ProcessError};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, parse_uuid_or_validation_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct BrandImportRequest {
    pub brands: Vec<BrandImportEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BrandImportEntry {
    /// Label recorded against the job file; defaults to the url.
    pub name: Option<String>,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct BrandImportResponse {
    pub job_id: Uuid,
    pub total_files: usize,
}

/// Resolves each file's `source` as a brand url owned by `organization_id`.
pub(crate) struct BrandUrlImporter {
    pool: PgPool,
    organization_id: Uuid,
}

impl BrandUrlImporter {
    pub(crate) fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self {
            pool,
            organization_id,
        }
    }
}

impl FileProcessor for BrandUrlImporter {
    async fn process(&self, file: &ImportFile) -> Result<FileOutcome, ProcessError> {
        match brandkit_db::resolve_or_create_brand(&self.pool, self.organization_id, &file.source)
            .await
        {
            Ok(ResolvedBrand::Owned(brand)) => Ok(FileOutcome::Imported {
                message: Some(format!("brand {}", brand.id)),
            }),
            Ok(ResolvedBrand::ForeignOwned { brand, .. }) => Ok(FileOutcome::Skipped {
                reason: format!("domain owned by brand {} of another organization", brand.id),
            }),
            Err(e @ (DbError::InvalidBrandUrl(_) | DbError::ContentionExhausted { .. })) => {
                Err(ProcessError::File(e.to_string()))
            }
            // The store is gone; the remaining entries would fail the same way.
            Err(e) => Err(ProcessError::Fatal(e.to_string())),
        }
    }
}

pub(super) async fn import_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(organization_id): Path<String>,
    Json(body): Json<BrandImportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BrandImportResponse>>), ApiError> {
    let organization_id =
        parse_uuid_or_validation_error(&req_id.0, "organization_id", &organization_id)?;
    if body.brands.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "brands must not be empty",
        ));
    }

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

    let files: Vec<ImportFile> = body
        .brands
        .into_iter()
        .map(|entry| ImportFile {
            name: entry
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| entry.url.clone()),
            source: entry.url,
        })
        .collect();
    let total_files = files.len();

    let importer = BrandUrlImporter::new(state.pool.clone(), organization_id);
    let import = brandkit_extract::spawn_bulk_import(state.jobs.clone(), files, Arc::new(importer));
    tracing::info!(
        job_id = %import.job_id,
        %organization_id,
        total_files,
        "brand import started"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            req_id.0,
            BrandImportResponse {
                job_id: import.job_id,
                total_files,
            },
        )),
    ))
}
