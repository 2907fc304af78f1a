use thiserror::Error;
use uuid::Uuid;

/// Errors from the site-mapping / scraping service.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by scraping service (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("unexpected HTTP status {status} from scraping service: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("site map for {url} reported failure")]
    MapUnsuccessful { url: String },

    #[error("invalid scraping service base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Errors from the LLM provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no LLM API key supplied or configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("LLM response contained no text")]
    EmptyResponse,

    #[error("invalid LLM base URL '{0}'")]
    InvalidBaseUrl(String),
}

/// Errors from the in-memory job tracker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} cannot {action} while {status}")]
    InvalidTransition {
        id: Uuid,
        action: &'static str,
        status: &'static str,
    },

    #[error("job {id} has processed {processed} of {total} files")]
    Incomplete {
        id: Uuid,
        processed: usize,
        total: usize,
    },
}

/// Errors from [`crate::run_extraction_pipeline`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("brand {0} not found")]
    BrandNotFound(Uuid),

    #[error("brand {0} has no url to extract from")]
    MissingBrandUrl(Uuid),

    #[error("brand {0} has no organization to attribute the run to")]
    UnattributedRun(Uuid),

    #[error("run tracking failed: {0}")]
    Tracking(#[from] brandkit_runs::RunsError),

    #[error("no page could be scraped ({attempted} attempted)")]
    NoContent {
        attempted: usize,
        #[source]
        last_error: Option<ScrapeError>,
    },

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("extraction payload rejected: {0}")]
    Payload(#[from] brandkit_core::CoreError),

    #[error("could not encode extraction payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] brandkit_db::DbError),
}

impl ExtractError {
    /// Whether the failure came from a collaborator outside the process.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ExtractError::Tracking(_)
                | ExtractError::NoContent { .. }
                | ExtractError::Llm(_)
                | ExtractError::Payload(_)
        )
    }
}
