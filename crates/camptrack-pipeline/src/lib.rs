//! Analytics retrieval pipeline: the Batch Analytics Aggregator, the Job
//! Queue, and the Job Processor, wired to injectable cache and store
//! abstractions.
//!
//! [`memory`] provides in-process stores for tests and one-shot CLI runs;
//! [`postgres`] backs the same traits with `camptrack-db`.

pub mod aggregator;
pub mod content;
pub mod memory;
pub mod postgres;
pub mod processor;
pub mod queue;
pub mod snapshot;
pub mod store;

use camptrack_core::Platform;
use thiserror::Error;

pub use aggregator::BatchAggregator;
pub use content::register_content;
pub use memory::{MemoryCache, MemoryStore};
pub use postgres::{PgCache, PgStore};
pub use processor::{JobProcessor, PassReport, ProcessorConfig, STALE_JOB_MESSAGE};
pub use queue::JobQueue;
pub use snapshot::{campaign_snapshot, refresh_snapshot, NOT_YET_FETCHED};
pub use store::{JobStore, MetricsStore, RegisteredContent, ResponseCache, StoreError};

/// Errors surfaced to callers of the pipeline's public entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("campaign id must not be empty")]
    EmptyCampaignId,
    #[error("platform {0} has no metrics fetcher")]
    UnsupportedPlatform(Platform),
    #[error("invalid content URL \"{url}\": {reason}")]
    InvalidContent { url: String, reason: String },
}

pub(crate) fn validate_campaign_id(campaign_id: &str) -> Result<&str, PipelineError> {
    let trimmed = campaign_id.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::EmptyCampaignId);
    }
    Ok(trimmed)
}

#[cfg(test)]
pub(crate) mod test_support;
