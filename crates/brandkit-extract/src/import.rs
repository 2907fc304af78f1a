//! Background bulk-import driver.
//!
//! Files are handed to a [`FileProcessor`] one at a time; the job tracker
//! records one result per file. Fetching and converting the files is the
//! processor's business.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::jobs::{FileResult, FileStatus, JobTracker};

/// A file queued for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub name: String,
    /// Opaque locator understood by the processor (storage key, URL, ...).
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Imported { message: Option<String> },
    Skipped { reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// This file failed; the import continues with the next one.
    #[error("{0}")]
    File(String),
    /// The processor cannot continue; the job fails.
    #[error("{0}")]
    Fatal(String),
}

pub trait FileProcessor: Send + Sync + 'static {
    fn process(
        &self,
        file: &ImportFile,
    ) -> impl Future<Output = Result<FileOutcome, ProcessError>> + Send;
}

/// Handle to a running import.
#[derive(Debug)]
pub struct BulkImport {
    pub job_id: Uuid,
    pub handle: JoinHandle<()>,
}

/// Create a job for `files` and drive it on a background task. The job id is
/// available immediately.
pub fn spawn_bulk_import<P: FileProcessor>(
    tracker: JobTracker,
    files: Vec<ImportFile>,
    processor: Arc<P>,
) -> BulkImport {
    let job_id = tracker.create_job(files.len()).id;
    let handle = tokio::spawn(async move {
        if let Err(e) = drive_import(&tracker, job_id, &files, processor.as_ref()).await {
            // Usually the sweep evicted the job mid-import.
            tracing::warn!(%job_id, error = %e, "bulk import stopped");
        }
    });
    BulkImport { job_id, handle }
}

async fn drive_import<P: FileProcessor>(
    tracker: &JobTracker,
    job_id: Uuid,
    files: &[ImportFile],
    processor: &P,
) -> Result<(), crate::error::JobError> {
    tracker.mark_processing(job_id)?;

    for file in files {
        tracker.set_current_file(job_id, &file.name)?;

        let (status, message) = match processor.process(file).await {
            Ok(FileOutcome::Imported { message }) => (FileStatus::Completed, message),
            Ok(FileOutcome::Skipped { reason }) => (FileStatus::Skipped, Some(reason)),
            Err(ProcessError::File(reason)) => {
                tracing::warn!(%job_id, file = %file.name, reason, "file import failed");
                (FileStatus::Failed, Some(reason))
            }
            Err(ProcessError::Fatal(reason)) => {
                tracing::error!(%job_id, file = %file.name, reason, "bulk import aborted");
                return tracker.fail_job(job_id, &reason);
            }
        };

        tracker.record_file_result(
            job_id,
            FileResult {
                name: file.name.clone(),
                status,
                message,
            },
        )?;
    }

    tracker.complete_job(job_id)
}
