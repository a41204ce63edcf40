//! Job Processor: claims pending jobs and runs fetch, persist, and
//! aggregate for each.
//!
//! Within a job the order is fixed: claim, read content URLs, fetch, upsert
//! successful metrics and record failed fetches on their content, refresh
//! the campaign snapshot, then complete or fail.
//! A failure in one job is recorded on that job and never stops the pass.

use std::sync::Arc;
use std::time::Duration;

use camptrack_core::{AnalyticsJob, AppConfig, Platform};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::aggregator::BatchAggregator;
use crate::snapshot::refresh_snapshot;
use crate::store::{JobStore, MetricsStore, StoreError};

/// Error message recorded on jobs failed by [`JobProcessor::sweep_stale`].
pub const STALE_JOB_MESSAGE: &str = "job exceeded running timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Pending jobs selected per pass.
    pub batch_size: usize,
    /// Campaigns processed concurrently within a pass.
    pub max_concurrency: usize,
    /// Running jobs older than this are failed by the sweep.
    pub stale_after: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrency: 4,
            stale_after: Duration::from_secs(30 * 60),
        }
    }
}

impl ProcessorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.job_batch_size.max(1),
            max_concurrency: config.job_max_concurrency.max(1),
            stale_after: Duration::from_secs(config.job_stale_after_secs),
        }
    }
}

/// Outcome counts for one processor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Jobs this pass moved to `running`.
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs another worker claimed first.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Error)]
enum JobError {
    #[error("no content URLs registered for campaign {campaign_id} on {platform}")]
    NoContent {
        campaign_id: String,
        platform: Platform,
    },
    #[error("{failed} of {total} fetches failed: {messages}")]
    Fetch {
        failed: usize,
        total: usize,
        messages: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    metrics: Arc<dyn MetricsStore>,
    aggregator: Arc<BatchAggregator>,
    config: ProcessorConfig,
}

impl JobProcessor {
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        metrics: Arc<dyn MetricsStore>,
        aggregator: Arc<BatchAggregator>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            jobs,
            metrics,
            aggregator,
            config,
        }
    }

    /// Runs one pass over up to `batch_size` pending jobs.
    ///
    /// Jobs of the same campaign run one after another so each snapshot
    /// refresh sees the previous job's metrics; distinct campaigns run
    /// concurrently up to `max_concurrency`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the pending jobs cannot be listed.
    /// Per-job failures are recorded on the job and counted in the report.
    pub async fn run_pass(&self) -> Result<PassReport, StoreError> {
        let pending = self.jobs.list_pending(self.config.batch_size).await?;
        if pending.is_empty() {
            tracing::debug!("no pending analytics jobs");
            return Ok(PassReport::default());
        }

        let mut campaigns: Vec<(String, Vec<AnalyticsJob>)> = Vec::new();
        for job in pending {
            match campaigns.iter_mut().find(|(c, _)| *c == job.campaign_id) {
                Some((_, group)) => group.push(job),
                None => campaigns.push((job.campaign_id.clone(), vec![job])),
            }
        }

        let outcomes: Vec<Vec<JobOutcome>> = stream::iter(campaigns)
            .map(|(_, group)| async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for job in group {
                    outcomes.push(self.process_job(job).await);
                }
                outcomes
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = PassReport::default();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                JobOutcome::Completed => {
                    report.claimed += 1;
                    report.completed += 1;
                }
                JobOutcome::Failed => {
                    report.claimed += 1;
                    report.failed += 1;
                }
                JobOutcome::Skipped => report.skipped += 1,
            }
        }

        tracing::info!(
            claimed = report.claimed,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "analytics processor pass finished"
        );
        Ok(report)
    }

    /// Fails `running` jobs whose claim is older than `stale_after`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn sweep_stale(&self) -> Result<Vec<i64>, StoreError> {
        let cutoff = chrono::Duration::from_std(self.config.stale_after)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let failed = self.jobs.fail_stale(cutoff, STALE_JOB_MESSAGE).await?;
        if !failed.is_empty() {
            tracing::warn!(count = failed.len(), job_ids = ?failed, "failed stale running jobs");
        }
        Ok(failed)
    }

    async fn process_job(&self, job: AnalyticsJob) -> JobOutcome {
        let job = match self.jobs.claim(job.id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::debug!(job_id = job.id, error = %e, "job not claimed, skipping");
                return JobOutcome::Skipped;
            }
        };

        match self.execute(&job).await {
            Ok(()) => match self.jobs.complete(job.id).await {
                Ok(()) => {
                    tracing::info!(
                        job_id = job.id,
                        campaign_id = %job.campaign_id,
                        platform = %job.platform,
                        "analytics job completed"
                    );
                    JobOutcome::Completed
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(
                        job_id = job.id,
                        error = %message,
                        "failed to mark job completed"
                    );
                    if let Err(e) = self.jobs.fail(job.id, &message).await {
                        tracing::error!(job_id = job.id, error = %e, "failed to mark job failed");
                    }
                    JobOutcome::Failed
                }
            },
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    job_id = job.id,
                    campaign_id = %job.campaign_id,
                    platform = %job.platform,
                    error = %message,
                    "analytics job failed"
                );
                if let Err(e) = self.jobs.fail(job.id, &message).await {
                    tracing::error!(job_id = job.id, error = %e, "failed to mark job failed");
                }
                JobOutcome::Failed
            }
        }
    }

    async fn execute(&self, job: &AnalyticsJob) -> Result<(), JobError> {
        let urls = self
            .metrics
            .content_urls(&job.campaign_id, job.platform)
            .await?;
        if urls.is_empty() {
            return Err(JobError::NoContent {
                campaign_id: job.campaign_id.clone(),
                platform: job.platform,
            });
        }

        let results = self.aggregator.fetch_batch(&urls).await;

        let mut errors: Vec<String> = Vec::new();
        for item in &results {
            match &item.metrics.error {
                None => self.metrics.upsert_metrics(&job.campaign_id, item).await?,
                Some(message) => {
                    self.metrics
                        .record_fetch_error(
                            &job.campaign_id,
                            &item.reference(),
                            message,
                            item.metrics.fetched_at,
                        )
                        .await?;
                    errors.push(format!("{}: {message}", item.url));
                }
            }
        }

        refresh_snapshot(self.metrics.as_ref(), &job.campaign_id).await?;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(JobError::Fetch {
                failed: errors.len(),
                total: results.len(),
                messages: errors.join("; "),
            })
        }
    }
}

impl std::fmt::Debug for JobProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobProcessor")
            .field("aggregator", &self.aggregator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod tests;
