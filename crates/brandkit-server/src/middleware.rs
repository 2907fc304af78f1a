//! Request-scoped layers for the brandkit API.
//!
//! Every request gets a [`RequestId`] that handlers echo in their response
//! envelope. Routes under `/api/v1` other than health also require one of the
//! bearer keys listed in `BRANDKIT_API_KEYS`. That key only admits the caller;
//! it is unrelated to the per-request `x-llm-api-key` header, which this layer
//! neither inspects nor logs and which the extraction handlers forward to the
//! model provider.

use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::api::ApiError;

const API_KEYS_VAR: &str = "BRANDKIT_API_KEYS";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id for one request, reused from `x-request-id` when the caller
/// sends one.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Which bearer keys the protected routes accept.
#[derive(Debug, Clone)]
pub enum AuthState {
    /// Every request is admitted. Only reachable in development.
    Disabled,
    Keys(Arc<HashSet<String>>),
}

impl AuthState {
    /// Reads `BRANDKIT_API_KEYS`. An unset or blank list disables auth in
    /// development and is a startup error anywhere else.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Builds from a comma-separated key list.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let keys = parse_key_list(raw);
        match (keys.is_empty(), is_development) {
            (false, _) => Ok(Self::Keys(Arc::new(keys))),
            (true, true) => {
                tracing::warn!("{API_KEYS_VAR} is empty; API routes are unauthenticated");
                Ok(Self::Disabled)
            }
            (true, false) => anyhow::bail!(
                "{API_KEYS_VAR} must list at least one bearer key outside development"
            ),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::Disabled
    }

    fn admits(&self, headers: &HeaderMap) -> bool {
        match self {
            Self::Disabled => true,
            Self::Keys(keys) => bearer_token(headers).is_some_and(|token| keys.contains(token)),
        }
    }
}

fn parse_key_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Rejects the request with the standard `unauthorized` error envelope
/// unless it carries an accepted bearer key.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if auth.admits(req.headers()) {
        return next.run(req).await;
    }

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    tracing::debug!(%request_id, path = %req.uri().path(), "rejected unauthenticated request");
    ApiError::new(request_id, "unauthorized", "missing or invalid bearer token").into_response()
}
