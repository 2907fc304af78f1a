//! Extraction kinds and their typed payloads.
//!
//! LLM output is loosely shaped, so every payload field defaults to an empty
//! collection or `None` when absent. Only the top level is strict: the
//! response must contain a JSON object that deserializes into the kind's
//! payload type.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::CoreError;

/// First `{` through last `}` across newlines.
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    SalesProfile,
    IcpSuggestion,
}

impl ExtractionKind {
    pub const ALL: [ExtractionKind; 2] = [ExtractionKind::SalesProfile, ExtractionKind::IcpSuggestion];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionKind::SalesProfile => "sales_profile",
            ExtractionKind::IcpSuggestion => "icp_suggestion",
        }
    }

    /// Task name reported to the run tracker.
    #[must_use]
    pub fn task_name(self) -> &'static str {
        match self {
            ExtractionKind::SalesProfile => "extract-sales-profile",
            ExtractionKind::IcpSuggestion => "suggest-icp",
        }
    }
}

impl std::fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sales_profile" => Ok(ExtractionKind::SalesProfile),
            "icp_suggestion" | "icp" => Ok(ExtractionKind::IcpSuggestion),
            _ => Err(CoreError::UnknownExtractionKind(s.to_string())),
        }
    }
}

/// LLMs emit `null` for lists they found nothing for; read it as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialProof {
    #[serde(deserialize_with = "null_as_default")]
    pub case_studies: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub testimonials: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub metrics: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub customer_logos: Vec<String>,
}

/// Sales-oriented summary of a company extracted from its public pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SalesProfile {
    pub company_name: Option<String>,
    pub company_overview: Option<String>,
    pub value_proposition: Option<String>,
    pub target_audience: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub key_features: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub product_offerings: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub customer_pain_points: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub differentiators: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub competitors: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub social_proof: SocialProof,
    pub pricing: Option<String>,
    pub call_to_action: Option<String>,
}

/// Suggested ideal-customer-profile filters for prospecting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IcpSuggestion {
    #[serde(deserialize_with = "null_as_default")]
    pub target_industries: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub target_job_titles: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub company_sizes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub target_locations: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ExtractionPayload {
    SalesProfile(SalesProfile),
    IcpSuggestion(IcpSuggestion),
}

impl ExtractionPayload {
    #[must_use]
    pub fn kind(&self) -> ExtractionKind {
        match self {
            ExtractionPayload::SalesProfile(_) => ExtractionKind::SalesProfile,
            ExtractionPayload::IcpSuggestion(_) => ExtractionKind::IcpSuggestion,
        }
    }

    /// The kind-specific body as stored in the cache `payload` column.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            ExtractionPayload::SalesProfile(p) => serde_json::to_value(p),
            ExtractionPayload::IcpSuggestion(p) => serde_json::to_value(p),
        }
    }

    /// Rebuild a payload from a stored cache body.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedPayload`] if `value` is not an object of
    /// the expected shape.
    pub fn from_value(kind: ExtractionKind, value: serde_json::Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::MalformedPayload {
                kind,
                reason: "top-level value is not a JSON object".to_string(),
            });
        }
        let malformed = |e: serde_json::Error| CoreError::MalformedPayload {
            kind,
            reason: e.to_string(),
        };
        match kind {
            ExtractionKind::SalesProfile => serde_json::from_value(value)
                .map(ExtractionPayload::SalesProfile)
                .map_err(malformed),
            ExtractionKind::IcpSuggestion => serde_json::from_value(value)
                .map(ExtractionPayload::IcpSuggestion)
                .map_err(malformed),
        }
    }
}

/// Parse raw LLM text into the payload for `kind`.
///
/// The span from the first `{` to the last `}` is treated as the JSON object.
///
/// # Errors
///
/// - [`CoreError::MissingJsonObject`] if the text has no `{...}` span.
/// - [`CoreError::MalformedPayload`] if the span is not valid JSON or its
///   fields have the wrong types.
pub fn parse_extraction_payload(
    kind: ExtractionKind,
    text: &str,
) -> Result<ExtractionPayload, CoreError> {
    let span = JSON_OBJECT
        .find(text)
        .ok_or(CoreError::MissingJsonObject)?
        .as_str();

    let value: serde_json::Value =
        serde_json::from_str(span).map_err(|e| CoreError::MalformedPayload {
            kind,
            reason: e.to_string(),
        })?;

    ExtractionPayload::from_value(kind, value)
}

#[cfg(test)]
#[path = "extraction_test.rs"]
mod tests;
