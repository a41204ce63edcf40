//! Analytics job commands: enqueue, process, list.

use std::sync::Arc;

use camptrack_core::{AnalyticsJob, Platform};
use camptrack_fetcher::FetcherRegistry;
use camptrack_pipeline::{
    BatchAggregator, JobProcessor, JobQueue, PgCache, PgStore, ProcessorConfig,
};

/// Parse `--platform` values; none means every supported platform.
pub(crate) fn parse_platforms(raw: &[String]) -> anyhow::Result<Vec<Platform>> {
    if raw.is_empty() {
        return Ok(Platform::SUPPORTED.to_vec());
    }
    raw.iter()
        .map(|p| p.parse::<Platform>().map_err(anyhow::Error::from))
        .collect()
}

/// Enqueue one pending job per platform for a campaign.
///
/// # Errors
///
/// Returns an error for unknown platform names or an empty campaign id, or
/// if an insert fails.
pub(crate) async fn run_enqueue(
    pool: &sqlx::PgPool,
    campaign_id: &str,
    platforms: &[String],
) -> anyhow::Result<()> {
    let platforms = parse_platforms(platforms)?;
    let queue = JobQueue::new(Arc::new(PgStore::new(pool.clone())));
    let jobs = queue.enqueue(campaign_id, &platforms).await?;

    println!("enqueued {} jobs for campaign {campaign_id}", jobs.len());
    print_jobs(&jobs);
    Ok(())
}

/// Run one processor pass (and optionally the stale-job sweep first).
///
/// # Errors
///
/// Returns an error if fetcher credentials are missing or pending jobs
/// cannot be listed. Individual job failures are recorded on the job.
pub(crate) async fn run_process(
    pool: &sqlx::PgPool,
    config: &camptrack_core::AppConfig,
    sweep: bool,
) -> anyhow::Result<()> {
    let registry = Arc::new(FetcherRegistry::from_config(config)?);
    let cache = Arc::new(PgCache::new(pool.clone()));
    let store = Arc::new(PgStore::new(pool.clone()));
    let aggregator = Arc::new(BatchAggregator::from_config(registry, cache, config));
    let processor = JobProcessor::new(
        store.clone(),
        store,
        aggregator,
        ProcessorConfig::from_app_config(config),
    );

    if sweep {
        let swept = processor.sweep_stale().await?;
        println!("failed {} stale running jobs", swept.len());
    }

    let report = processor.run_pass().await?;
    println!(
        "claimed: {}  completed: {}  failed: {}  skipped: {}",
        report.claimed, report.completed, report.failed, report.skipped
    );
    Ok(())
}

/// List a campaign's jobs, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_list_jobs(pool: &sqlx::PgPool, campaign_id: &str) -> anyhow::Result<()> {
    let queue = JobQueue::new(Arc::new(PgStore::new(pool.clone())));
    let jobs = queue.get_jobs(campaign_id).await?;

    if jobs.is_empty() {
        println!("no jobs for campaign {campaign_id}; run `enqueue` first");
        return Ok(());
    }
    print_jobs(&jobs);
    Ok(())
}

fn print_jobs(jobs: &[AnalyticsJob]) {
    println!(
        "{:<8}{:<11}{:<11}{:<21}ERROR",
        "ID", "PLATFORM", "STATUS", "CREATED"
    );
    for job in jobs {
        println!(
            "{:<8}{:<11}{:<11}{:<21}{}",
            job.id,
            job.platform.as_str(),
            job.status.as_str(),
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.error_message.as_deref().unwrap_or("")
        );
    }
}
