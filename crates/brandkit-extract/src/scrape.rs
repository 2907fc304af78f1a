//! Client for the site-mapping and scraping service.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::retry::retry_with_backoff;

/// Attribution fields forwarded with each scrape so the service can bill and
/// trace the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeTracking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct MapRequest<'a> {
    url: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    success: bool,
    #[serde(default)]
    urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    #[serde(flatten)]
    tracking: &'a ScrapeTracking,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    result: ScrapeResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeResult {
    #[serde(default)]
    raw_markdown: Option<String>,
}

/// HTTP client for `POST /map` and `POST /scrape`.
///
/// Rate limits (429) and refused connections are retried with exponential
/// backoff up to `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct ScrapeClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ScrapeClient {
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`ScrapeError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|_| ScrapeError::InvalidBaseUrl(base_url.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.map(str::to_owned),
            max_retries,
            backoff_base_ms,
        })
    }

    /// # Errors
    ///
    /// See [`ScrapeClient::new`].
    pub fn from_app_config(config: &brandkit_core::AppConfig) -> Result<Self, ScrapeError> {
        Self::new(
            &config.scraper_url,
            config.scraper_api_key.as_deref(),
            config.http_timeout_secs,
            config.http_max_retries,
            config.http_retry_backoff_ms,
        )
    }

    /// List up to `limit` URLs discovered on the site rooted at `url`.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::MapUnsuccessful`] if the service reports `success: false`.
    /// - [`ScrapeError::RateLimited`] / [`ScrapeError::Http`] after retries.
    /// - [`ScrapeError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`ScrapeError::Deserialize`] if the body is not a map response.
    pub async fn map_site(&self, url: &str, limit: usize) -> Result<Vec<String>, ScrapeError> {
        let endpoint = self.endpoint("map")?;
        let body = &MapRequest { url, limit };

        let response: MapResponse =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                let endpoint = endpoint.clone();
                async move { self.post_json(endpoint, body, "map").await }
            })
            .await?;

        if !response.success {
            return Err(ScrapeError::MapUnsuccessful {
                url: url.to_string(),
            });
        }
        Ok(response.urls)
    }

    /// Scrape one page and return its markdown (empty when the service found
    /// nothing to render).
    ///
    /// # Errors
    ///
    /// Same transport errors as [`ScrapeClient::map_site`].
    pub async fn scrape_page(
        &self,
        url: &str,
        tracking: &ScrapeTracking,
    ) -> Result<String, ScrapeError> {
        let endpoint = self.endpoint("scrape")?;
        let body = &ScrapeRequest { url, tracking };

        let response: ScrapeResponse =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                let endpoint = endpoint.clone();
                async move { self.post_json(endpoint, body, "scrape").await }
            })
            .await?;

        Ok(response.result.raw_markdown.unwrap_or_default())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ScrapeError> {
        self.base_url
            .join(path)
            .map_err(|_| ScrapeError::InvalidBaseUrl(self.base_url.to_string()))
    }

    async fn post_json<B, T>(&self, url: Url, body: &B, context: &str) -> Result<T, ScrapeError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ScrapeError::RateLimited { retry_after_secs });
        }

        let text = response.text().await?;
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ScrapeError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}
