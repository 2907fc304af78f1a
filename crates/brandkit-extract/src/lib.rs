//! Extraction pipeline and bulk-import job tracking.
//!
//! The pipeline turns a brand's website into a typed, cached extraction:
//! map the site, pick pages, scrape them, ask the LLM, parse, cache, bill.
//! Run tracking wraps the whole thing under a caller-chosen policy.

pub mod error;
pub mod import;
pub mod jobs;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub(crate) mod retry;
pub mod scrape;
pub mod select;

pub use error::{ExtractError, JobError, LlmError, ScrapeError};
pub use import::{spawn_bulk_import, BulkImport, FileOutcome, FileProcessor, ImportFile, ProcessError};
pub use jobs::{FileResult, FileStatus, Job, JobProgress, JobStatus, JobTracker};
pub use llm::{LlmClient, LlmCompletion};
pub use pipeline::{
    cost_items, run_extraction_pipeline, ExtractionContext, ExtractionOptions, ExtractionOutcome,
    ExtractionSettings,
};
pub use scrape::{ScrapeClient, ScrapeTracking};
pub use select::select_pages;
