//! Third-party response types and the platform-neutral engagement shape.

use camptrack_core::{engagement_rate, MetricsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Engagement counts as a platform reports them, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEngagement {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
}

impl RawEngagement {
    /// Likes + comments + shares (when the platform reports shares).
    #[must_use]
    pub fn engagement(&self) -> u64 {
        self.likes
            .saturating_add(self.comments)
            .saturating_add(self.shares.unwrap_or(0))
    }

    /// Normalizes into a successful [`MetricsResult`] with a derived rate.
    #[must_use]
    pub fn into_metrics(self, fetched_at: DateTime<Utc>) -> MetricsResult {
        let engagement = self.engagement();
        MetricsResult::success(
            self.views,
            engagement,
            engagement_rate(engagement, self.views),
            fetched_at,
        )
    }
}

// ---------------------------------------------------------------------------
// YouTube Data API v3: videos?part=statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
}

/// Counts arrive as decimal strings; hidden counts are omitted entirely.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    #[serde(default, deserialize_with = "count_from_string")]
    pub view_count: Option<u64>,
    #[serde(default, deserialize_with = "count_from_string")]
    pub like_count: Option<u64>,
    #[serde(default, deserialize_with = "count_from_string")]
    pub comment_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub published_at: Option<DateTime<Utc>>,
}

fn count_from_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Text(String),
        Number(u64),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(n)) => Ok(Some(n)),
        Some(Count::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Apify actor runs
// ---------------------------------------------------------------------------

/// Wrapper for Apify API responses: `{ "data": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Run metadata returned when starting or polling an actor run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub id: String,
    pub status: String,
    pub default_dataset_id: String,
}

impl RunData {
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }

    /// `FAILED`, `ABORTED`, and `TIMED-OUT` end a run without results.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}

/// Input for the `apify/instagram-scraper` actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramScraperInput {
    pub direct_urls: Vec<String>,
    pub results_type: &'static str,
    pub results_limit: u32,
}

/// One post item from the Instagram scraper dataset.
///
/// Likes are reported as `-1` when the owner hides them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramPost {
    pub url: Option<String>,
    pub likes_count: Option<i64>,
    pub comments_count: Option<i64>,
    pub video_view_count: Option<i64>,
    pub video_play_count: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl InstagramPost {
    #[must_use]
    pub fn to_engagement(&self) -> RawEngagement {
        RawEngagement {
            views: non_negative(self.video_play_count.or(self.video_view_count)),
            likes: non_negative(self.likes_count),
            comments: non_negative(self.comments_count),
            shares: None,
            published_at: self.timestamp,
        }
    }
}

/// Input for the `clockworks/tiktok-scraper` actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TiktokScraperInput {
    #[serde(rename = "postURLs")]
    pub post_urls: Vec<String>,
    pub results_per_page: u32,
    pub should_download_videos: bool,
    pub should_download_covers: bool,
}

/// One video item from the `TikTok` scraper dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiktokVideo {
    pub web_video_url: Option<String>,
    pub play_count: Option<i64>,
    pub digg_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub share_count: Option<i64>,
    #[serde(rename = "createTimeISO")]
    pub created_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TiktokVideo {
    #[must_use]
    pub fn to_engagement(&self) -> RawEngagement {
        RawEngagement {
            views: non_negative(self.play_count),
            likes: non_negative(self.digg_count),
            comments: non_negative(self.comment_count),
            shares: Some(non_negative(self.share_count)),
            published_at: self.created_at,
        }
    }
}

fn non_negative(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}
