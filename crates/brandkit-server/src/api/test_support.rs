//! Shared fixtures for route tests.

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use brandkit_extract::{
    ExtractionContext, ExtractionSettings, JobTracker, LlmClient, ScrapeClient,
};
use brandkit_runs::RunsClient;
use sqlx::PgPool;
use tower::ServiceExt;

use super::{build_app, AppState};
use crate::middleware::AuthState;

/// Nothing listens here; routes that reach upstream in a test fail fast.
const UNREACHABLE: &str = "http://127.0.0.1:9";

pub(super) fn state(pool: PgPool) -> AppState {
    state_with_upstream(pool, UNREACHABLE)
}

/// State whose scraper, LLM and run tracker all point at `upstream`.
pub(super) fn state_with_upstream(pool: PgPool, upstream: &str) -> AppState {
    let extraction = ExtractionContext {
        pool: pool.clone(),
        scraper: ScrapeClient::new(upstream, None, 5, 0, 1).expect("scrape client"),
        llm: LlmClient::new(upstream, "claude-sonnet-4-5", Some("llm-key"), 5)
            .expect("llm client"),
        runs: RunsClient::new(upstream, None, "brandkit", "brandkit", 5).expect("runs client"),
        settings: ExtractionSettings {
            max_pages: 3,
            scrape_concurrency: 2,
            cache_ttl: chrono::Duration::days(30),
        },
    };
    AppState {
        pool,
        extraction,
        jobs: JobTracker::new(),
        app_id: "brandkit".to_string(),
    }
}

pub(super) fn app(pool: PgPool) -> Router {
    build_app(state(pool), AuthState::disabled())
}

pub(super) async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("response")
}

pub(super) fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(super) fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub(super) async fn body_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}
