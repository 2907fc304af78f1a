//! Client for the Anthropic Messages API.

use std::time::Duration;

use brandkit_core::TokenUsage;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4_096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [WireMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Text and accounting from one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmCompletion {
    pub text: String,
    /// Model that actually served the request, as reported by the provider.
    pub model: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    base_url: Url,
    model: String,
    default_api_key: Option<String>,
    max_tokens: u32,
}

impl LlmClient {
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`LlmError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        model: &str,
        default_api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalised).map_err(|_| LlmError::InvalidBaseUrl(base_url.to_string()))?;

        Ok(Self {
            client,
            base_url,
            model: model.to_owned(),
            default_api_key: default_api_key.map(str::to_owned),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// # Errors
    ///
    /// See [`LlmClient::new`].
    pub fn from_app_config(config: &brandkit_core::AppConfig) -> Result<Self, LlmError> {
        Self::new(
            &config.llm_base_url,
            &config.llm_model,
            config.llm_api_key.as_deref(),
            config.llm_timeout_secs,
        )
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user prompt. `api_key` overrides the configured key.
    ///
    /// # Errors
    ///
    /// - [`LlmError::MissingApiKey`] if neither key is available.
    /// - [`LlmError::Http`] on network failure or timeout.
    /// - [`LlmError::Status`] on a non-2xx response.
    /// - [`LlmError::Deserialize`] if the body is not a messages response.
    /// - [`LlmError::EmptyResponse`] if no text block came back.
    pub async fn complete(
        &self,
        api_key: Option<&str>,
        system: &str,
        prompt: &str,
    ) -> Result<LlmCompletion, LlmError> {
        let api_key = api_key
            .or(self.default_api_key.as_deref())
            .ok_or(LlmError::MissingApiKey)?;
        let url = self
            .base_url
            .join("v1/messages")
            .map_err(|_| LlmError::InvalidBaseUrl(self.base_url.to_string()))?;

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: [WireMessage {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "LLM request");

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Deserialize {
                context: "messages".to_owned(),
                source: e,
            })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(LlmCompletion {
            text,
            model: parsed.model,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}
