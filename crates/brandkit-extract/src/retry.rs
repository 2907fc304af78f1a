//! Retry with exponential back-off and jitter for the scraping client.

use std::future::Future;
use std::time::Duration;

use crate::error::ScrapeError;

/// Rate limits and refused connections are transient. Timeouts are not
/// retried: a page that timed out once is dropped from the run.
pub(crate) fn is_retriable(err: &ScrapeError) -> bool {
    match err {
        ScrapeError::RateLimited { .. } => true,
        ScrapeError::Http(e) => e.is_connect() && !e.is_timeout(),
        ScrapeError::UnexpectedStatus { .. }
        | ScrapeError::Deserialize { .. }
        | ScrapeError::MapUnsuccessful { .. }
        | ScrapeError::InvalidBaseUrl(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors. The n-th retry sleeps `backoff_base_ms * 2^(n-1)` ± 25 %, capped
/// at 30 s; a server-supplied `Retry-After` wins when it is longer.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                let delay_ms = match &err {
                    ScrapeError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => jittered.max(secs.saturating_mul(1_000).min(MAX_DELAY_MS)),
                    _ => jittered,
                };
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "scraping service transient error; retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
