//! HTTP client for the run-tracking service.
//!
//! Every endpoint shares one request path: optional bearer auth, a 2xx check
//! that keeps the response body for the error, and typed deserialization.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::RunsError;
use crate::types::{
    AddCostsBody, AddCostsResponse, CostItem, CreateRunBody, CreateRunParams, Run, RunStatus,
    UpdateRunBody,
};

/// Client for the `/v1/runs` API.
#[derive(Debug, Clone)]
pub struct RunsClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    app_id: String,
    service_name: String,
}

impl RunsClient {
    /// # Errors
    ///
    /// Returns [`RunsError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`RunsError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        app_id: &str,
        service_name: &str,
        timeout_secs: u64,
    ) -> Result<Self, RunsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalised).map_err(|_| RunsError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RunsError::InvalidBaseUrl(normalised));
        }

        Ok(Self {
            client,
            base_url,
            api_key: api_key.map(str::to_owned),
            app_id: app_id.to_owned(),
            service_name: service_name.to_owned(),
        })
    }

    /// Build from the `BRANDKIT_RUNS_*` settings.
    ///
    /// # Errors
    ///
    /// See [`RunsClient::new`].
    pub fn from_app_config(config: &brandkit_core::AppConfig) -> Result<Self, RunsError> {
        Self::new(
            &config.runs_url,
            config.runs_api_key.as_deref(),
            &config.app_id,
            &config.service_name,
            config.http_timeout_secs,
        )
    }

    /// `POST /v1/runs`.
    ///
    /// # Errors
    ///
    /// - [`RunsError::Http`] on network failure.
    /// - [`RunsError::Status`] on a non-2xx response.
    /// - [`RunsError::Deserialize`] if the body is not a run.
    pub async fn create_run(&self, params: &CreateRunParams) -> Result<Run, RunsError> {
        let url = self.endpoint(&["v1", "runs"]);
        let body = CreateRunBody::new(params, &self.app_id, &self.service_name);
        self.send_json(self.client.post(url).json(&body), "create run")
            .await
    }

    /// `PATCH /v1/runs/:id` with a terminal status.
    ///
    /// # Errors
    ///
    /// Same as [`RunsClient::create_run`].
    pub async fn update_run(&self, run_id: &str, status: RunStatus) -> Result<Run, RunsError> {
        let url = self.endpoint(&["v1", "runs", run_id]);
        self.send_json(
            self.client.patch(url).json(&UpdateRunBody { status }),
            "update run",
        )
        .await
    }

    /// `POST /v1/runs/:id/costs`. Returns the cost records echoed back.
    ///
    /// # Errors
    ///
    /// Same as [`RunsClient::create_run`].
    pub async fn add_costs(
        &self,
        run_id: &str,
        items: &[CostItem],
    ) -> Result<Vec<serde_json::Value>, RunsError> {
        let url = self.endpoint(&["v1", "runs", run_id, "costs"]);
        let response: AddCostsResponse = self
            .send_json(
                self.client.post(url).json(&AddCostsBody { items }),
                "add costs",
            )
            .await?;
        Ok(response.costs)
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, RunsError> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RunsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| RunsError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}
