//! The extraction pipeline: cache check, run tracking, scrape, LLM, store.

use brandkit_core::{extract_domain, parse_extraction_payload, AppConfig, ExtractionKind, TokenUsage};
use brandkit_db::{
    get_brand, get_cached_extraction, upsert_cached_extraction, BrandRow, CachedExtractionRow,
    DbError, NewCachedExtraction,
};
use brandkit_runs::{CostItem, CreateRunParams, RunOwner, RunsClient, TrackingPolicy};
use futures::{stream, StreamExt};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ExtractError, ScrapeError};
use crate::llm::LlmClient;
use crate::prompt::{build_prompt, system_prompt, ScrapedPage};
use crate::scrape::{ScrapeClient, ScrapeTracking};
use crate::select::select_pages;

/// URLs requested from the site map; selection narrows this down.
const MAP_LIMIT: usize = 100;

/// Tunables shared by every pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionSettings {
    pub max_pages: usize,
    pub scrape_concurrency: usize,
    pub cache_ttl: chrono::Duration,
}

impl ExtractionSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_pages: config.extraction_max_pages,
            scrape_concurrency: config.scrape_concurrency,
            cache_ttl: chrono::Duration::days(config.cache_ttl_days),
        }
    }
}

/// Collaborators for the pipeline.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub pool: PgPool,
    pub scraper: ScrapeClient,
    pub llm: LlmClient,
    pub runs: RunsClient,
    pub settings: ExtractionSettings,
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOptions {
    pub policy: TrackingPolicy,
    /// Skip the cache read and always extract.
    pub force_refresh: bool,
    pub parent_run_id: Option<String>,
    /// Attribute the run to this identity-provider organization.
    pub clerk_org_id: Option<String>,
    /// Overrides [`ExtractionSettings::max_pages`].
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    /// `true` when `result` came from the cache and no run was started.
    pub cached: bool,
    pub result: CachedExtractionRow,
    pub run_id: Option<String>,
}

/// Cost lines for one successful extraction.
#[must_use]
pub fn cost_items(
    model: &str,
    usage: TokenUsage,
    pages_scraped: usize,
    site_mapped: bool,
) -> Vec<CostItem> {
    let mut items = vec![
        CostItem::new(format!("{model}-tokens-input"), u64::from(usage.input_tokens)),
        CostItem::new(format!("{model}-tokens-output"), u64::from(usage.output_tokens)),
        CostItem::new(
            "scrape-pages",
            u64::try_from(pages_scraped).unwrap_or(u64::MAX),
        ),
    ];
    if site_mapped {
        items.push(CostItem::new("site-map", 1));
    }
    items
}

/// Produce (or reuse) the `kind` extraction for a brand.
///
/// A fresh cached row short-circuits everything unless
/// `options.force_refresh` is set. Otherwise a run is started under
/// `options.policy`; under [`TrackingPolicy::Mandatory`] a tracker failure
/// aborts here, before any scrape or LLM spend. Any failure after the run
/// starts marks it `failed` (best-effort) and returns the original error.
///
/// # Errors
///
/// - [`ExtractError::BrandNotFound`] / [`ExtractError::MissingBrandUrl`] for
///   an unusable brand.
/// - [`ExtractError::Tracking`] for mandatory tracking failures.
/// - [`ExtractError::NoContent`] when no page could be scraped.
/// - [`ExtractError::Llm`] / [`ExtractError::Payload`] for LLM failures or
///   unparseable output.
/// - [`ExtractError::Db`] for store failures.
pub async fn run_extraction_pipeline(
    ctx: &ExtractionContext,
    brand_id: Uuid,
    kind: ExtractionKind,
    llm_api_key: Option<&str>,
    options: &ExtractionOptions,
) -> Result<ExtractionOutcome, ExtractError> {
    let brand = match get_brand(&ctx.pool, brand_id).await {
        Ok(brand) => brand,
        Err(DbError::NotFound) => return Err(ExtractError::BrandNotFound(brand_id)),
        Err(e) => return Err(e.into()),
    };

    if !options.force_refresh {
        if let Some(row) = get_cached_extraction(&ctx.pool, brand_id, kind).await? {
            tracing::info!(%brand_id, %kind, "extraction cache hit");
            return Ok(ExtractionOutcome {
                cached: true,
                result: row,
                run_id: None,
            });
        }
        tracing::info!(%brand_id, %kind, "extraction cache miss");
    }

    let run_id = start_tracked_run(ctx, &brand, kind, options).await?;

    match extract_and_store(ctx, &brand, kind, llm_api_key, options, run_id.as_deref()).await {
        Ok(row) => {
            ctx.runs
                .complete_run(run_id.as_deref(), options.policy)
                .await?;
            Ok(ExtractionOutcome {
                cached: false,
                result: row,
                run_id,
            })
        }
        Err(e) => {
            tracing::warn!(%brand_id, %kind, error = %e, "extraction failed");
            ctx.runs.fail_run_best_effort(run_id.as_deref()).await;
            Err(e)
        }
    }
}

fn run_owner(brand: &BrandRow, options: &ExtractionOptions) -> Option<RunOwner> {
    options
        .clerk_org_id
        .clone()
        .map(RunOwner::ClerkOrg)
        .or_else(|| brand.organization_id.map(|id| RunOwner::Organization(id.to_string())))
        .or_else(|| brand.external_organization_id.clone().map(RunOwner::ClerkOrg))
}

async fn start_tracked_run(
    ctx: &ExtractionContext,
    brand: &BrandRow,
    kind: ExtractionKind,
    options: &ExtractionOptions,
) -> Result<Option<String>, ExtractError> {
    let Some(owner) = run_owner(brand, options) else {
        return match options.policy {
            TrackingPolicy::Mandatory => Err(ExtractError::UnattributedRun(brand.id)),
            TrackingPolicy::BestEffort => {
                tracing::warn!(brand_id = %brand.id, "no organization to attribute run; continuing untracked");
                Ok(None)
            }
        };
    };

    let params = CreateRunParams {
        owner,
        brand_id: Some(brand.id.to_string()),
        task_name: kind.task_name().to_string(),
        parent_run_id: options.parent_run_id.clone(),
    };
    let run = ctx.runs.start_run(&params, options.policy).await?;
    Ok(run.map(|run| run.id))
}

async fn extract_and_store(
    ctx: &ExtractionContext,
    brand: &BrandRow,
    kind: ExtractionKind,
    llm_api_key: Option<&str>,
    options: &ExtractionOptions,
    run_id: Option<&str>,
) -> Result<CachedExtractionRow, ExtractError> {
    let homepage = brand
        .url
        .as_deref()
        .ok_or(ExtractError::MissingBrandUrl(brand.id))?;
    let domain = brand
        .domain
        .clone()
        .or_else(|| extract_domain(homepage))
        .ok_or(ExtractError::MissingBrandUrl(brand.id))?;
    let max_pages = options.max_pages.unwrap_or(ctx.settings.max_pages);

    let (mapped, site_mapped) = match ctx.scraper.map_site(homepage, MAP_LIMIT).await {
        Ok(urls) => (urls, true),
        Err(e) => {
            tracing::warn!(brand_id = %brand.id, error = %e, "site map failed; using homepage only");
            (Vec::new(), false)
        }
    };

    let pages = select_pages(homepage, &domain, &mapped, kind, max_pages);
    let tracking = ScrapeTracking {
        org_id: options.clerk_org_id.clone().or_else(|| brand.organization_id.map(|id| id.to_string())),
        brand_id: Some(brand.id.to_string()),
        parent_run_id: run_id.map(str::to_owned),
    };
    let scraped = scrape_pages(&ctx.scraper, &pages, &tracking, ctx.settings.scrape_concurrency).await?;

    let prompt = build_prompt(brand.name.as_deref(), &domain, &scraped);
    let completion = ctx
        .llm
        .complete(llm_api_key, system_prompt(kind), &prompt)
        .await?;
    let payload = parse_extraction_payload(kind, &completion.text)?;

    let row = upsert_cached_extraction(
        &ctx.pool,
        &NewCachedExtraction {
            brand_id: brand.id,
            kind,
            payload: payload.to_value()?,
            extraction_model: completion.model.clone(),
            usage: completion.usage,
        },
        ctx.settings.cache_ttl,
    )
    .await?;

    tracing::info!(
        brand_id = %brand.id,
        %kind,
        pages = scraped.len(),
        input_tokens = completion.usage.input_tokens,
        output_tokens = completion.usage.output_tokens,
        "extraction stored"
    );

    let costs = cost_items(&completion.model, completion.usage, scraped.len(), site_mapped);
    ctx.runs.record_costs(run_id, &costs, options.policy).await?;
    Ok(row)
}

async fn scrape_one<'a>(
    scraper: &ScrapeClient,
    url: &'a String,
    tracking: &ScrapeTracking,
) -> (&'a String, Result<String, ScrapeError>) {
    (url, scraper.scrape_page(url, tracking).await)
}

/// Scrape `urls` with at most `concurrency` requests in flight, keeping page
/// order. Failed or empty pages are dropped; zero survivors is an error.
async fn scrape_pages(
    scraper: &ScrapeClient,
    urls: &[String],
    tracking: &ScrapeTracking,
    concurrency: usize,
) -> Result<Vec<ScrapedPage>, ExtractError> {
    let futures: Vec<_> = urls
        .iter()
        .map(|url| scrape_one(scraper, url, tracking))
        .collect();
    let results: Vec<(&String, Result<String, ScrapeError>)> = stream::iter(futures)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut pages = Vec::with_capacity(results.len());
    let mut last_error = None;
    for (url, result) in results {
        match result {
            Ok(markdown) if !markdown.trim().is_empty() => pages.push(ScrapedPage {
                url: url.clone(),
                markdown,
            }),
            Ok(_) => tracing::debug!(url = %url, "scraped page was empty"),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "page scrape failed");
                last_error = Some(e);
            }
        }
    }

    if pages.is_empty() {
        return Err(ExtractError::NoContent {
            attempted: urls.len(),
            last_error,
        });
    }
    Ok(pages)
}
