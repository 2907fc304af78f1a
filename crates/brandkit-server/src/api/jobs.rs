//! `GET /api/v1/jobs/{job_id}`: bulk-import progress.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use brandkit_extract::Job;

use crate::middleware::RequestId;

use super::{parse_uuid_or_validation_error, ApiError, ApiResponse, AppState};

pub(super) async fn get_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<Job>>, ApiError> {
    let job_id = parse_uuid_or_validation_error(&req_id.0, "job_id", &job_id)?;
    match state.jobs.get_job(job_id) {
        Some(job) => Ok(Json(ApiResponse::new(req_id.0, job))),
        None => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("job {job_id} not found"),
        )),
    }
}
