//! Job Queue: creates analytics jobs and reads them back.

use std::sync::Arc;

use camptrack_core::{AnalyticsJob, Platform};

use crate::store::JobStore;
use crate::{validate_campaign_id, PipelineError};

/// Upper bound on jobs returned by [`JobQueue::get_jobs`].
pub const MAX_JOBS_LISTED: usize = 100;

#[derive(Clone)]
pub struct JobQueue {
    jobs: Arc<dyn JobStore>,
}

impl JobQueue {
    #[must_use]
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    /// Creates one `pending` job per distinct platform.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedPlatform`] for `unknown` (before
    /// any job is created), [`PipelineError::EmptyCampaignId`], or
    /// [`PipelineError::Store`] if an insert fails.
    pub async fn enqueue(
        &self,
        campaign_id: &str,
        platforms: &[Platform],
    ) -> Result<Vec<AnalyticsJob>, PipelineError> {
        let campaign_id = validate_campaign_id(campaign_id)?;
        if let Some(&bad) = platforms.iter().find(|p| !p.is_supported()) {
            return Err(PipelineError::UnsupportedPlatform(bad));
        }

        let mut distinct: Vec<Platform> = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            if !distinct.contains(&platform) {
                distinct.push(platform);
            }
        }

        let mut jobs = Vec::with_capacity(distinct.len());
        for platform in distinct {
            let job = self.jobs.create_job(campaign_id, platform).await?;
            tracing::info!(job_id = job.id, campaign_id, %platform, "analytics job enqueued");
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Jobs for a campaign, newest first. The id is trimmed the same way
    /// [`JobQueue::enqueue`] trims it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyCampaignId`], or [`PipelineError::Store`]
    /// if the read fails.
    pub async fn get_jobs(&self, campaign_id: &str) -> Result<Vec<AnalyticsJob>, PipelineError> {
        let campaign_id = validate_campaign_id(campaign_id)?;
        Ok(self.jobs.list_jobs(campaign_id, MAX_JOBS_LISTED).await?)
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue").finish_non_exhaustive()
    }
}
