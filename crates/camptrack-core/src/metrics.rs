//! Engagement metrics and campaign-level aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::{ContentReference, Platform};

/// Normalized engagement metrics for one content URL.
///
/// A result with `error` set always carries zeroed numbers; use
/// [`MetricsResult::failure`] to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub views: u64,
    pub engagement: u64,
    /// Engagement rate in percent.
    pub rate: f64,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricsResult {
    /// A successful result. Non-finite or negative rates are stored as `0.0`.
    #[must_use]
    pub fn success(views: u64, engagement: u64, rate: f64, fetched_at: DateTime<Utc>) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            0.0
        };
        Self {
            views,
            engagement,
            rate,
            fetched_at,
            error: None,
        }
    }

    /// A successful result whose rate is derived from `engagement / views`.
    #[must_use]
    pub fn derived(views: u64, engagement: u64, fetched_at: DateTime<Utc>) -> Self {
        Self::success(
            views,
            engagement,
            engagement_rate(engagement, views),
            fetched_at,
        )
    }

    /// The safe-default result: zeroed metrics plus a non-empty error message.
    #[must_use]
    pub fn failure(error: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            views: 0,
            engagement: 0,
            rate: 0.0,
            fetched_at,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// `engagement / views * 100`, or `0.0` when there are no views.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn engagement_rate(engagement: u64, views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    engagement as f64 / views as f64 * 100.0
}

/// Per-item batch output: a content reference with its fetched metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub url: String,
    pub platform: Platform,
    #[serde(flatten)]
    pub metrics: MetricsResult,
}

impl ContentMetrics {
    #[must_use]
    pub fn new(reference: ContentReference, metrics: MetricsResult) -> Self {
        Self {
            url: reference.url,
            platform: reference.platform,
            metrics,
        }
    }

    #[must_use]
    pub fn reference(&self) -> ContentReference {
        ContentReference {
            url: self.url.clone(),
            platform: self.platform,
        }
    }
}

/// Campaign-level totals reduced from per-item metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignTotals {
    pub total_views: u64,
    pub total_engagement: u64,
    /// Mean rate over successful items; `0.0` when none succeeded.
    pub average_rate: f64,
    pub item_count: usize,
    pub failed_count: usize,
}

/// Reduces per-item results into campaign totals.
///
/// Failed items contribute their zeroed counts to the sums and are left out
/// of the rate mean.
#[must_use]
pub fn aggregate(results: &[ContentMetrics]) -> CampaignTotals {
    let mut total_views: u64 = 0;
    let mut total_engagement: u64 = 0;
    let mut rate_sum = 0.0_f64;
    let mut succeeded: usize = 0;

    for item in results {
        total_views = total_views.saturating_add(item.metrics.views);
        total_engagement = total_engagement.saturating_add(item.metrics.engagement);
        if item.metrics.is_success() {
            rate_sum += item.metrics.rate;
            succeeded += 1;
        }
    }

    let average_rate = if succeeded == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let denom = succeeded as f64;
        rate_sum / denom
    };

    CampaignTotals {
        total_views,
        total_engagement,
        average_rate,
        item_count: results.len(),
        failed_count: results.len() - succeeded,
    }
}

/// Read model of a campaign's analytics, always derived from `per_item`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAnalyticsSnapshot {
    pub campaign_id: String,
    #[serde(flatten)]
    pub totals: CampaignTotals,
    pub per_item: Vec<ContentMetrics>,
    pub last_updated: DateTime<Utc>,
}

impl CampaignAnalyticsSnapshot {
    /// Builds a snapshot whose totals are recomputed from `per_item`.
    #[must_use]
    pub fn from_items(
        campaign_id: impl Into<String>,
        per_item: Vec<ContentMetrics>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let totals = aggregate(&per_item);
        Self {
            campaign_id: campaign_id.into(),
            totals,
            per_item,
            last_updated,
        }
    }
}
