pub mod app_config;
pub mod config;
pub mod domain;
pub mod extraction;
pub mod pricing;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{extract_domain, is_same_site};
pub use extraction::{
    parse_extraction_payload, ExtractionKind, ExtractionPayload, IcpSuggestion, SalesProfile,
    SocialProof,
};
pub use pricing::{cost_usd, ModelPricing, TokenUsage, DEFAULT_MODEL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown extraction kind: {0}")]
    UnknownExtractionKind(String),

    #[error("LLM response contained no JSON object")]
    MissingJsonObject,

    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: ExtractionKind, reason: String },
}
