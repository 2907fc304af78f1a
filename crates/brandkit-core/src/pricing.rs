//! Token-rate table used to price LLM extractions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Token counts reported by the LLM provider for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// USD price per million tokens, stored in cents to keep the table exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPricing {
    pub input_cents_per_mtok: i64,
    pub output_cents_per_mtok: i64,
}

const SONNET: ModelPricing = ModelPricing {
    input_cents_per_mtok: 300,
    output_cents_per_mtok: 1_500,
};

const HAIKU: ModelPricing = ModelPricing {
    input_cents_per_mtok: 100,
    output_cents_per_mtok: 500,
};

const OPUS: ModelPricing = ModelPricing {
    input_cents_per_mtok: 1_500,
    output_cents_per_mtok: 7_500,
};

impl ModelPricing {
    /// Rates for a known model family, matched on the model name.
    #[must_use]
    pub fn for_model(model: &str) -> Option<Self> {
        let model = model.to_ascii_lowercase();
        if model.contains("haiku") {
            Some(HAIKU)
        } else if model.contains("opus") {
            Some(OPUS)
        } else if model.contains("sonnet") {
            Some(SONNET)
        } else {
            None
        }
    }

    /// Rates for `model`, falling back to the default model's rates.
    #[must_use]
    pub fn for_model_or_default(model: &str) -> Self {
        Self::for_model(model).unwrap_or(SONNET)
    }
}

/// USD cost of `usage` on `model`, rounded to six decimal places.
#[must_use]
pub fn cost_usd(model: &str, usage: TokenUsage) -> Decimal {
    let pricing = ModelPricing::for_model_or_default(model);
    let per_mtok_cents = Decimal::from(usage.input_tokens) * Decimal::from(pricing.input_cents_per_mtok)
        + Decimal::from(usage.output_tokens) * Decimal::from(pricing.output_cents_per_mtok);
    // cents * tokens / (100 cents * 1_000_000 tokens)
    (per_mtok_cents / Decimal::from(100_000_000_i64)).round_dp(6)
}
