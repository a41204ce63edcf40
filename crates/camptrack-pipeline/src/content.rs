//! Content registration at the pipeline boundary.

use camptrack_core::ContentReference;

use crate::store::MetricsStore;
use crate::{validate_campaign_id, PipelineError};

/// Validates `urls` and stores them as the campaign's canonical content.
///
/// The whole request is rejected if any URL is empty or resolves to no
/// supported platform; nothing is written in that case. Duplicates are
/// collapsed and re-registering a URL is a no-op.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyCampaignId`], [`PipelineError::InvalidContent`],
/// or [`PipelineError::Store`] if a write fails.
pub async fn register_content<S: AsRef<str>>(
    store: &dyn MetricsStore,
    campaign_id: &str,
    urls: &[S],
) -> Result<Vec<ContentReference>, PipelineError> {
    let campaign_id = validate_campaign_id(campaign_id)?;

    let mut references: Vec<ContentReference> = Vec::with_capacity(urls.len());
    for url in urls {
        let reference = ContentReference::new(url.as_ref());
        if reference.url.is_empty() {
            return Err(PipelineError::InvalidContent {
                url: reference.url,
                reason: "URL is empty".to_string(),
            });
        }
        if !reference.platform.is_supported() {
            return Err(PipelineError::InvalidContent {
                url: reference.url,
                reason: "unsupported platform".to_string(),
            });
        }
        if !references.contains(&reference) {
            references.push(reference);
        }
    }

    for reference in &references {
        store.register_content(campaign_id, reference).await?;
    }
    tracing::info!(campaign_id, count = references.len(), "registered campaign content");

    Ok(references)
}
