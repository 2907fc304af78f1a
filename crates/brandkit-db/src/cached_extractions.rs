//! Database operations for the `cached_extractions` table.
//!
//! One row per `(brand_id, kind)`. A row is fresh while `expires_at` is in the
//! future; stale rows stay in the table until the next write replaces them.

use brandkit_core::{cost_usd, ExtractionKind, TokenUsage};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `cached_extractions` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, serde::Serialize)]
pub struct CachedExtractionRow {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub extraction_model: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub cost_usd: Decimal,
    pub extracted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedExtractionRow {
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Input for [`upsert_cached_extraction`].
#[derive(Debug, Clone)]
pub struct NewCachedExtraction {
    pub brand_id: Uuid,
    pub kind: ExtractionKind,
    pub payload: serde_json::Value,
    pub extraction_model: String,
    pub usage: TokenUsage,
}

/// Return the fresh cached extraction for `(brand_id, kind)`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_cached_extraction(
    pool: &PgPool,
    brand_id: Uuid,
    kind: ExtractionKind,
) -> Result<Option<CachedExtractionRow>, DbError> {
    Ok(sqlx::query_as::<_, CachedExtractionRow>(
        "SELECT id, brand_id, kind, payload, extraction_model, input_tokens, output_tokens, \
                cost_usd, extracted_at, expires_at \
         FROM cached_extractions \
         WHERE brand_id = $1 AND kind = $2 AND expires_at > NOW()",
    )
    .bind(brand_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?)
}

/// Insert or replace the cached extraction for `(brand_id, kind)`.
///
/// The stored cost is derived from the model's token rates. `expires_at` is
/// `extracted_at + ttl`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the write fails (including a dangling
/// `brand_id`).
pub async fn upsert_cached_extraction(
    pool: &PgPool,
    new: &NewCachedExtraction,
    ttl: Duration,
) -> Result<CachedExtractionRow, DbError> {
    let extracted_at = Utc::now();
    let expires_at = extracted_at + ttl;
    let cost = cost_usd(&new.extraction_model, new.usage);

    let row = sqlx::query_as::<_, CachedExtractionRow>(
        "INSERT INTO cached_extractions \
             (id, brand_id, kind, payload, extraction_model, input_tokens, output_tokens, \
              cost_usd, extracted_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (brand_id, kind) DO UPDATE SET \
             payload          = EXCLUDED.payload, \
             extraction_model = EXCLUDED.extraction_model, \
             input_tokens     = EXCLUDED.input_tokens, \
             output_tokens    = EXCLUDED.output_tokens, \
             cost_usd         = EXCLUDED.cost_usd, \
             extracted_at     = EXCLUDED.extracted_at, \
             expires_at       = EXCLUDED.expires_at \
         RETURNING id, brand_id, kind, payload, extraction_model, input_tokens, output_tokens, \
                   cost_usd, extracted_at, expires_at",
    )
    .bind(Uuid::new_v4())
    .bind(new.brand_id)
    .bind(new.kind.as_str())
    .bind(&new.payload)
    .bind(&new.extraction_model)
    .bind(token_count(new.usage.input_tokens))
    .bind(token_count(new.usage.output_tokens))
    .bind(cost)
    .bind(extracted_at)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        brand_id = %new.brand_id,
        kind = %new.kind,
        cost_usd = %row.cost_usd,
        "cached extraction stored"
    );
    Ok(row)
}

fn token_count(tokens: u32) -> i32 {
    i32::try_from(tokens).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_is_strictly_before_expiry() {
        let now = Utc::now();
        let row = CachedExtractionRow {
            id: Uuid::new_v4(),
            brand_id: Uuid::new_v4(),
            kind: "sales_profile".to_string(),
            payload: serde_json::json!({}),
            extraction_model: "claude-sonnet-4-5".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: Decimal::ZERO,
            extracted_at: now - Duration::days(1),
            expires_at: now,
        };
        assert!(!row.is_fresh_at(now));
        assert!(row.is_fresh_at(now - Duration::seconds(1)));
    }

    #[test]
    fn token_counts_saturate() {
        assert_eq!(token_count(12), 12);
        assert_eq!(token_count(u32::MAX), i32::MAX);
    }
}
