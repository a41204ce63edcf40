//! Background job scheduler.
//!
//! Drives the Job Processor on `processor_cron`, and purges expired cache
//! entries plus sweeps stale `running` jobs on `cache_purge_cron`.

use std::sync::Arc;

use camptrack_pipeline::{JobProcessor, ResponseCache};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    processor: Arc<JobProcessor>,
    cache: Arc<dyn ResponseCache>,
    config: &camptrack_core::AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_processor_job(&scheduler, &config.processor_cron, Arc::clone(&processor)).await?;
    register_maintenance_job(&scheduler, &config.cache_purge_cron, processor, cache).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring processor pass.
///
/// tokio-cron-scheduler starts a new run on every tick even if the previous
/// one is still going; overlapping passes are safe because every claim is a
/// guarded transition.
async fn register_processor_job(
    scheduler: &JobScheduler,
    schedule: &str,
    processor: Arc<JobProcessor>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let processor = Arc::clone(&processor);

        Box::pin(async move {
            if let Err(e) = processor.run_pass().await {
                tracing::error!(error = %e, "scheduler: analytics processor pass failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register cache purge and stale-job sweep.
async fn register_maintenance_job(
    scheduler: &JobScheduler,
    schedule: &str,
    processor: Arc<JobProcessor>,
    cache: Arc<dyn ResponseCache>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let processor = Arc::clone(&processor);
        let cache = Arc::clone(&cache);

        Box::pin(async move {
            match cache.purge_expired().await {
                Ok(purged) => tracing::info!(purged, "scheduler: purged expired cache entries"),
                Err(e) => tracing::error!(error = %e, "scheduler: cache purge failed"),
            }
            if let Err(e) = processor.sweep_stale().await {
                tracing::error!(error = %e, "scheduler: stale job sweep failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
