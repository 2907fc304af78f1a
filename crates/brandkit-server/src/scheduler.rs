//! Background job scheduler.
//!
//! Registers the recurring sweep that evicts finished and abandoned
//! bulk-import jobs from the in-memory [`JobTracker`].

use std::{sync::Arc, time::Duration};

use brandkit_extract::JobTracker;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the sweep cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    jobs: JobTracker,
    config: Arc<brandkit_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_job_sweep(&scheduler, jobs, &config).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_job_sweep(
    scheduler: &JobScheduler,
    jobs: JobTracker,
    config: &brandkit_core::AppConfig,
) -> Result<(), JobSchedulerError> {
    let interval = Duration::from_secs(config.job_sweep_interval_secs.max(1));
    let retention = retention_window(config.job_retention_secs);

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let jobs = jobs.clone();
        Box::pin(async move {
            let evicted = jobs.sweep_expired(retention);
            tracing::debug!(evicted, "scheduler: job sweep complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(
        interval_secs = interval.as_secs(),
        "scheduler: registered job sweep"
    );
    Ok(())
}

fn retention_window(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
