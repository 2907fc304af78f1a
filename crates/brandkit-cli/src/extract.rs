//! Extraction commands: run the pipeline or read the cache.

use brandkit_core::ExtractionKind;
use brandkit_extract::{
    ExtractionContext, ExtractionOptions, ExtractionSettings, LlmClient, ScrapeClient,
};
use brandkit_runs::{RunsClient, TrackingPolicy};
use clap::Args;
use uuid::Uuid;

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Brand id
    #[arg(long)]
    pub brand_id: Uuid,
    /// Extraction kind (`sales_profile` or `icp_suggestion`)
    #[arg(long)]
    pub kind: ExtractionKind,
    /// Ignore a fresh cached row and extract again
    #[arg(long)]
    pub force_refresh: bool,
    /// Continue when the run tracker is unavailable
    #[arg(long)]
    pub best_effort: bool,
    /// Attribute the run to this identity-provider organization
    #[arg(long)]
    pub clerk_org_id: Option<String>,
    #[arg(long)]
    pub parent_run_id: Option<String>,
    /// Cap on scraped pages (defaults to `BRANDKIT_EXTRACTION_MAX_PAGES`)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_pages: Option<u16>,
    /// LLM API key for this run (defaults to `BRANDKIT_LLM_API_KEY`)
    #[arg(long)]
    pub llm_api_key: Option<String>,
}

impl ExtractArgs {
    pub(crate) fn options(&self) -> ExtractionOptions {
        ExtractionOptions {
            policy: if self.best_effort {
                TrackingPolicy::BestEffort
            } else {
                TrackingPolicy::Mandatory
            },
            force_refresh: self.force_refresh,
            parent_run_id: self.parent_run_id.clone(),
            clerk_org_id: self.clerk_org_id.clone(),
            max_pages: self.max_pages.map(usize::from),
        }
    }
}

/// Run the extraction pipeline once and print the outcome.
///
/// # Errors
///
/// Returns an error if a client cannot be built or the pipeline fails.
pub(crate) async fn run_extract(
    pool: sqlx::PgPool,
    config: &brandkit_core::AppConfig,
    args: ExtractArgs,
) -> anyhow::Result<()> {
    tracing::info!(brand_id = %args.brand_id, kind = %args.kind, "running extraction");
    let ctx = ExtractionContext {
        pool,
        scraper: ScrapeClient::from_app_config(config)?,
        llm: LlmClient::from_app_config(config)?,
        runs: RunsClient::from_app_config(config)?,
        settings: ExtractionSettings::from_app_config(config),
    };

    let outcome = brandkit_extract::run_extraction_pipeline(
        &ctx,
        args.brand_id,
        args.kind,
        args.llm_api_key.as_deref(),
        &args.options(),
    )
    .await?;

    if outcome.cached {
        println!("cache hit (expires {})", outcome.result.expires_at);
    } else {
        println!(
            "extracted with {} ({} in / {} out tokens, ${}); run {}",
            outcome.result.extraction_model,
            outcome.result.input_tokens,
            outcome.result.output_tokens,
            outcome.result.cost_usd,
            outcome.run_id.as_deref().unwrap_or("untracked"),
        );
    }
    super::print_json(&outcome.result.payload)
}

/// Print the fresh cached extraction, if any.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_cached(
    pool: &sqlx::PgPool,
    brand_id: Uuid,
    kind: ExtractionKind,
) -> anyhow::Result<()> {
    match brandkit_db::get_cached_extraction(pool, brand_id, kind).await? {
        Some(row) => super::print_json(&row),
        None => {
            println!("no fresh {kind} extraction for brand {brand_id}; run `extract` first");
            Ok(())
        }
    }
}
