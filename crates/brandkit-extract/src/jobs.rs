//! Process-local job tracker for bulk imports.
//!
//! Jobs live only in memory: they are lost on restart and are not shared
//! between instances. A periodic sweep evicts jobs older than the retention
//! window in any state. Moving to multiple instances means replacing
//! [`JobTracker`] with a durable store behind the same methods.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub name: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub current_file: Option<String>,
    pub results: Vec<FileResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Shared handle to the job map. Clones share the same jobs.
///
/// Every method takes the lock once and never holds it across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
}

impl JobTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Job>> {
        // Every mutation completes under the lock, so a poisoned map is still consistent.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to job `id` if it is currently in `expected`.
    fn transition<T>(
        &self,
        id: Uuid,
        action: &'static str,
        expected: JobStatus,
        f: impl FnOnce(&mut Job) -> Result<T, JobError>,
    ) -> Result<T, JobError> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if job.status != expected {
            return Err(JobError::InvalidTransition {
                id,
                action,
                status: job.status.as_str(),
            });
        }
        f(job)
    }

    /// Register a `pending` job expecting `total_files` results.
    pub fn create_job(&self, total_files: usize) -> Job {
        let job = Job {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            progress: JobProgress {
                total: total_files,
                ..JobProgress::default()
            },
            current_file: None,
            results: Vec::new(),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.lock().insert(job.id, job.clone());
        tracing::info!(job_id = %job.id, total_files, "job created");
        job
    }

    #[must_use]
    pub fn get_job(&self, id: Uuid) -> Option<Job> {
        self.lock().get(&id).cloned()
    }

    /// `pending → processing`.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] or [`JobError::InvalidTransition`].
    pub fn mark_processing(&self, id: Uuid) -> Result<(), JobError> {
        self.transition(id, "start processing", JobStatus::Pending, |job| {
            job.status = JobStatus::Processing;
            Ok(())
        })?;
        tracing::info!(job_id = %id, "job processing");
        Ok(())
    }

    /// Advisory pointer to the file being worked on.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`], or [`JobError::InvalidTransition`] unless processing.
    pub fn set_current_file(&self, id: Uuid, name: &str) -> Result<(), JobError> {
        self.transition(id, "set current file", JobStatus::Processing, |job| {
            job.current_file = Some(name.to_string());
            Ok(())
        })
    }

    /// Append a per-file result and bump `processed` plus the matching
    /// counter. The job status is unchanged.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`], or [`JobError::InvalidTransition`] unless processing.
    pub fn record_file_result(&self, id: Uuid, result: FileResult) -> Result<(), JobError> {
        self.transition(id, "record a file result", JobStatus::Processing, |job| {
            let progress = &mut job.progress;
            progress.processed += 1;
            match result.status {
                FileStatus::Completed => progress.succeeded += 1,
                FileStatus::Failed => progress.failed += 1,
                FileStatus::Skipped => progress.skipped += 1,
            }
            job.results.push(result);
            Ok(())
        })
    }

    /// `processing → completed`, once every file has a result.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`], [`JobError::InvalidTransition`], or
    /// [`JobError::Incomplete`] while `processed < total`.
    pub fn complete_job(&self, id: Uuid) -> Result<(), JobError> {
        let progress = self.transition(id, "complete", JobStatus::Processing, |job| {
            if job.progress.processed != job.progress.total {
                return Err(JobError::Incomplete {
                    id,
                    processed: job.progress.processed,
                    total: job.progress.total,
                });
            }
            finish(job, JobStatus::Completed);
            Ok(job.progress)
        })?;
        tracing::info!(
            job_id = %id,
            succeeded = progress.succeeded,
            failed = progress.failed,
            skipped = progress.skipped,
            "job completed"
        );
        Ok(())
    }

    /// `processing → failed`.
    ///
    /// # Errors
    ///
    /// [`JobError::NotFound`] or [`JobError::InvalidTransition`].
    pub fn fail_job(&self, id: Uuid, reason: &str) -> Result<(), JobError> {
        self.transition(id, "fail", JobStatus::Processing, |job| {
            job.error = Some(reason.to_string());
            finish(job, JobStatus::Failed);
            Ok(())
        })?;
        tracing::warn!(job_id = %id, reason, "job failed");
        Ok(())
    }

    /// Evict every job created more than `retention` ago, in any state.
    /// Returns how many were removed.
    pub fn sweep_expired(&self, retention: Duration) -> usize {
        self.sweep_expired_at(Utc::now(), retention)
    }

    fn sweep_expired_at(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return 0;
        };
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| job.created_at > cutoff);
        let evicted = before - jobs.len();
        drop(jobs);

        if evicted > 0 {
            tracing::info!(evicted, "swept expired jobs");
        }
        evicted
    }
}

fn finish(job: &mut Job, status: JobStatus) {
    job.status = status;
    job.current_file = None;
    job.completed_at = Some(Utc::now());
}
