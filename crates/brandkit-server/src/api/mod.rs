mod brands;
mod extractions;
mod imports;
mod jobs;
mod organizations;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use brandkit_extract::{ExtractError, ExtractionContext, JobTracker};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub extraction: ExtractionContext,
    pub jobs: JobTracker,
    /// Default `app_id` for organization resolution.
    pub app_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "validation_error" => StatusCode::BAD_REQUEST,
            "domain_conflict" => StatusCode::CONFLICT,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &brandkit_db::DbError) -> ApiError {
    match error {
        brandkit_db::DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        brandkit_db::DbError::InvalidBrandUrl(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

pub(super) fn map_extract_error(request_id: String, error: &ExtractError) -> ApiError {
    match error {
        ExtractError::BrandNotFound(_) => ApiError::new(request_id, "not_found", error.to_string()),
        ExtractError::MissingBrandUrl(_) | ExtractError::UnattributedRun(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        ExtractError::Db(db) => map_db_error(request_id, db),
        e if e.is_upstream() => {
            tracing::warn!(error = %e, "extraction upstream failure");
            ApiError::new(request_id, "upstream_error", e.to_string())
        }
        e => {
            tracing::error!(error = %e, "extraction failed");
            ApiError::new(request_id, "internal_error", e.to_string())
        }
    }
}

pub(super) fn parse_uuid_or_validation_error(
    request_id: &str,
    field: &str,
    value: &str,
) -> Result<uuid::Uuid, ApiError> {
    value.parse().map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("{field} must be a UUID, got '{value}'"),
        )
    })
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(extractions::LLM_API_KEY_HEADER),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/organizations/resolve",
            post(organizations::resolve_organization),
        )
        .route(
            "/api/v1/organizations/{organization_id}/brand-imports",
            post(imports::import_brands),
        )
        .route("/api/v1/brands/resolve", post(brands::resolve_brand))
        .route("/api/v1/brands/merge", post(brands::merge_brand))
        .route(
            "/api/v1/brands/{brand_id}/extractions/{kind}",
            get(extractions::get_cached).post(extractions::run_extraction),
        )
        .route("/api/v1/jobs/{job_id}", get(jobs::get_job))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match brandkit_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                req_id.0,
                HealthData {
                    status: "ok",
                    database: "ok",
                },
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    req_id.0,
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                )),
            )
        }
    }
}

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests {
    use super::test_support::{app, body_json, send};
    use super::*;
    use axum::http::Request;
    use axum::body::Body;

    #[test]
    fn error_codes_map_to_statuses() {
        for (code, status) in [
            ("not_found", StatusCode::NOT_FOUND),
            ("validation_error", StatusCode::BAD_REQUEST),
            ("domain_conflict", StatusCode::CONFLICT),
            ("upstream_error", StatusCode::BAD_GATEWAY),
            ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let response = ApiError::new("req-1", code, "message").into_response();
            assert_eq!(response.status(), status, "code {code}");
        }
    }

    #[test]
    fn store_failures_hide_details() {
        let err = map_db_error("req-1".to_string(), &brandkit_db::DbError::MissingDatabaseUrl);
        assert_eq!(err.error.code, "internal_error");
        assert_eq!(err.error.message, "database query failed");
    }

    #[test]
    fn extraction_errors_follow_the_taxonomy() {
        let id = uuid::Uuid::new_v4();
        let cases = [
            (ExtractError::BrandNotFound(id), "not_found"),
            (ExtractError::MissingBrandUrl(id), "validation_error"),
            (
                ExtractError::NoContent {
                    attempted: 3,
                    last_error: None,
                },
                "upstream_error",
            ),
            (
                ExtractError::Llm(brandkit_extract::LlmError::EmptyResponse),
                "upstream_error",
            ),
            (
                ExtractError::Db(brandkit_db::DbError::NotFound),
                "not_found",
            ),
        ];
        for (error, code) in cases {
            assert_eq!(map_extract_error("req".to_string(), &error).error.code, code);
        }
    }

    #[test]
    fn invalid_uuid_is_a_validation_error() {
        let err = parse_uuid_or_validation_error("req", "brand_id", "nope").expect_err("invalid");
        assert_eq!(err.error.code, "validation_error");
        assert!(err.error.message.contains("brand_id"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_database_ok(pool: sqlx::PgPool) {
        let response = send(
            app(pool),
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-health")
                .body(Body::empty())
                .expect("request"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").map(|v| v.to_str().ok()),
            Some(Some("req-health"))
        );
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["meta"]["request_id"], "req-health");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn protected_routes_require_a_bearer_token(pool: sqlx::PgPool) {
        let auth = AuthState::from_keys("secret-key", false).expect("auth");
        let app = build_app(test_support::state(pool), auth);

        let denied = send(
            app.clone(),
            Request::builder()
                .uri(format!("/api/v1/jobs/{}", uuid::Uuid::new_v4()))
                .header("x-request-id", "req-denied")
                .header(extractions::LLM_API_KEY_HEADER, "secret-key")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(denied).await;
        assert_eq!(json["error"]["code"], "unauthorized");
        assert_eq!(json["meta"]["request_id"], "req-denied");

        let allowed = send(
            app,
            Request::builder()
                .uri(format!("/api/v1/jobs/{}", uuid::Uuid::new_v4()))
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(allowed.status(), StatusCode::NOT_FOUND);
    }
}
