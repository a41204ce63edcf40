//! In-process cache and store. Used by tests and by callers that do not need
//! durability.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use camptrack_core::{
    AnalyticsJob, CampaignAnalyticsSnapshot, ContentMetrics, ContentReference, JobStatus,
    MetricsResult, Platform,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::{
    expires_at, JobStore, MetricsStore, RegisteredContent, ResponseCache, StoreError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (MetricsResult, DateTime<Utc>)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<MetricsResult>, StoreError> {
        let now = Utc::now();
        Ok(lock(&self.entries)
            .get(key)
            .filter(|(_, expires)| now < *expires)
            .map(|(value, _)| value.clone()))
    }

    async fn put(&self, key: &str, value: &MetricsResult, ttl: Duration) -> Result<(), StoreError> {
        let expires = expires_at(Utc::now(), ttl);
        lock(&self.entries).insert(key.to_owned(), (value.clone(), expires));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, (_, expires)| now < *expires);
        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Default)]
struct State {
    next_job_id: i64,
    jobs: Vec<AnalyticsJob>,
    content: Vec<(String, RegisteredContent)>,
    metrics: Vec<(String, ContentMetrics)>,
    snapshots: HashMap<String, CampaignAnalyticsSnapshot>,
}

/// Jobs, content, metrics, and snapshots held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn job(&self, id: i64) -> Option<AnalyticsJob> {
        lock(&self.state).jobs.iter().find(|j| j.id == id).cloned()
    }

    /// Overrides `started_at` of a job, e.g. to simulate a long-running claim.
    pub fn set_started_at(&self, id: i64, started_at: DateTime<Utc>) {
        if let Some(job) = lock(&self.state).jobs.iter_mut().find(|j| j.id == id) {
            job.started_at = Some(started_at);
        }
    }

    fn transition(
        &self,
        id: i64,
        expected: JobStatus,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> Result<AnalyticsJob, StoreError> {
        let mut state = lock(&self.state);
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if job.status != expected || !expected.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { id, expected, to });
        }

        let now = Utc::now();
        job.status = to;
        match to {
            JobStatus::Running => job.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed => job.completed_at = Some(now),
            JobStatus::Pending => {}
        }
        if let Some(message) = error_message {
            job.error_message = Some(message.to_owned());
        }
        Ok(job.clone())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(
        &self,
        campaign_id: &str,
        platform: Platform,
    ) -> Result<AnalyticsJob, StoreError> {
        let mut state = lock(&self.state);
        state.next_job_id += 1;
        let job = AnalyticsJob {
            id: state.next_job_id,
            public_id: Uuid::new_v4(),
            campaign_id: campaign_id.to_owned(),
            platform,
            status: JobStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn list_jobs(
        &self,
        campaign_id: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsJob>, StoreError> {
        Ok(lock(&self.state)
            .jobs
            .iter()
            .rev()
            .filter(|j| j.campaign_id == campaign_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<AnalyticsJob>, StoreError> {
        Ok(lock(&self.state)
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn claim(&self, id: i64) -> Result<AnalyticsJob, StoreError> {
        self.transition(id, JobStatus::Pending, JobStatus::Running, None)
    }

    async fn complete(&self, id: i64) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Running, JobStatus::Completed, None)
            .map(|_| ())
    }

    async fn fail(&self, id: i64, message: &str) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Running, JobStatus::Failed, Some(message))
            .map(|_| ())
    }

    async fn fail_stale(
        &self,
        started_before: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<i64>, StoreError> {
        let now = Utc::now();
        let mut failed = Vec::new();
        for job in &mut lock(&self.state).jobs {
            let stale = job.status == JobStatus::Running
                && job.started_at.is_some_and(|at| at < started_before);
            if stale {
                job.status = JobStatus::Failed;
                job.completed_at = Some(now);
                job.error_message = Some(message.to_owned());
                failed.push(job.id);
            }
        }
        Ok(failed)
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn register_content(
        &self,
        campaign_id: &str,
        reference: &ContentReference,
    ) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        let exists = state
            .content
            .iter()
            .any(|(c, r)| c == campaign_id && r.reference == *reference);
        if !exists {
            state.content.push((
                campaign_id.to_owned(),
                RegisteredContent {
                    reference: reference.clone(),
                    last_error: None,
                    last_error_at: None,
                },
            ));
        }
        Ok(())
    }

    async fn content_urls(
        &self,
        campaign_id: &str,
        platform: Platform,
    ) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.state)
            .content
            .iter()
            .filter(|(c, r)| c == campaign_id && r.reference.platform == platform)
            .map(|(_, r)| r.reference.url.clone())
            .collect())
    }

    async fn list_content(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<RegisteredContent>, StoreError> {
        Ok(lock(&self.state)
            .content
            .iter()
            .filter(|(c, _)| c == campaign_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn upsert_metrics(
        &self,
        campaign_id: &str,
        item: &ContentMetrics,
    ) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        let existing = state.metrics.iter_mut().find(|(c, m)| {
            c == campaign_id && m.platform == item.platform && m.url == item.url
        });
        match existing {
            Some((_, row)) => *row = item.clone(),
            None => state.metrics.push((campaign_id.to_owned(), item.clone())),
        }

        let reference = item.reference();
        if let Some((_, content)) = state
            .content
            .iter_mut()
            .find(|(c, r)| c == campaign_id && r.reference == reference)
        {
            content.last_error = None;
            content.last_error_at = None;
        }
        Ok(())
    }

    async fn record_fetch_error(
        &self,
        campaign_id: &str,
        reference: &ContentReference,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some((_, content)) = lock(&self.state)
            .content
            .iter_mut()
            .find(|(c, r)| c == campaign_id && r.reference == *reference)
        {
            content.last_error = Some(message.to_owned());
            content.last_error_at = Some(at);
        }
        Ok(())
    }

    async fn list_metrics(&self, campaign_id: &str) -> Result<Vec<ContentMetrics>, StoreError> {
        Ok(lock(&self.state)
            .metrics
            .iter()
            .filter(|(c, _)| c == campaign_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn save_snapshot(&self, snapshot: &CampaignAnalyticsSnapshot) -> Result<(), StoreError> {
        lock(&self.state)
            .snapshots
            .insert(snapshot.campaign_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn snapshot(
        &self,
        campaign_id: &str,
    ) -> Result<Option<CampaignAnalyticsSnapshot>, StoreError> {
        Ok(lock(&self.state).snapshots.get(campaign_id).cloned())
    }
}
