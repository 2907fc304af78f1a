use thiserror::Error;

/// Errors returned by the run-tracking client.
#[derive(Debug, Error)]
pub enum RunsError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracking service answered with a non-2xx status.
    #[error("run tracker returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid run tracker base URL '{0}'")]
    InvalidBaseUrl(String),
}
