//! `YouTube` Data API v3 fetcher.
//!
//! Looks up a single video's statistics by id. Views come from `viewCount`;
//! engagement is likes plus comments. Hidden counts are treated as zero.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use camptrack_core::Platform;
use regex::Regex;
use reqwest::{Client, Url};

use crate::error::FetchError;
use crate::http::{parse_base_url, read_json};
use crate::registry::{MetricsFetcher, RetryPolicy};
use crate::retry::retry_with_backoff;
use crate::types::{RawEngagement, VideoListResponse};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/";
const SERVICE: &str = "youtube";

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtu\.be/|/shorts/|/embed/|/live/|/v/|[?&]v=)([A-Za-z0-9_-]{11})")
        .expect("valid regex")
});

/// Extracts the 11-character video id from watch, short-link, shorts, embed,
/// and live URLs.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<&str> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Fetches video statistics from the `YouTube` Data API.
///
/// Use [`YoutubeFetcher::new`] for production or
/// [`YoutubeFetcher::with_base_url`] to point at a mock server in tests.
pub struct YoutubeFetcher {
    client: Client,
    api_key: String,
    base_url: Url,
    retry: RetryPolicy,
}

impl YoutubeFetcher {
    /// Creates a fetcher pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout_secs, user_agent, retry)
    }

    /// Creates a fetcher with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the client cannot be built, or
    /// [`FetchError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url: parse_base_url(base_url)?,
            retry,
        })
    }

    fn videos_url(&self, video_id: &str) -> Result<Url, FetchError> {
        let mut url =
            self.base_url
                .join("youtube/v3/videos")
                .map_err(|e| FetchError::InvalidBaseUrl {
                    base_url: self.base_url.to_string(),
                    reason: e.to_string(),
                })?;
        url.query_pairs_mut()
            .append_pair("part", "statistics,snippet")
            .append_pair("id", video_id)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_videos(&self, url: Url) -> Result<VideoListResponse, FetchError> {
        let response = self.client.get(url).send().await?;
        read_json(response, SERVICE, "videos.list").await
    }
}

#[async_trait]
impl MetricsFetcher for YoutubeFetcher {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch_engagement(&self, url: &str) -> Result<RawEngagement, FetchError> {
        let video_id = extract_video_id(url).ok_or_else(|| FetchError::UnrecognizedUrl {
            platform: SERVICE,
            url: url.to_owned(),
        })?;
        let request_url = self.videos_url(video_id)?;

        let body = retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || {
            self.get_videos(request_url.clone())
        })
        .await?;

        let item = body
            .items
            .into_iter()
            .find(|item| item.id == video_id)
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_owned(),
            })?;

        tracing::debug!(video_id, "fetched youtube statistics");

        Ok(RawEngagement {
            views: item.statistics.view_count.unwrap_or(0),
            likes: item.statistics.like_count.unwrap_or(0),
            comments: item.statistics.comment_count.unwrap_or(0),
            shares: None,
            published_at: item.snippet.and_then(|s| s.published_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_common_url_shapes() {
        let id = "dQw4w9WgXcQ";
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://m.youtube.com/live/dQw4w9WgXcQ?si=abc",
        ] {
            assert_eq!(extract_video_id(url), Some(id), "{url}");
        }
    }

    #[test]
    fn channel_urls_have_no_video_id() {
        assert_eq!(extract_video_id("https://www.youtube.com/@somechannel"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
    }

    #[test]
    fn videos_url_carries_id_and_key() {
        let fetcher = YoutubeFetcher::with_base_url(
            "k123",
            "http://localhost:9999",
            5,
            "test",
            RetryPolicy::default(),
        )
        .unwrap();
        let url = fetcher.videos_url("dQw4w9WgXcQ").unwrap();
        assert_eq!(url.path(), "/youtube/v3/videos");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("id".to_owned(), "dQw4w9WgXcQ".to_owned())));
        assert!(pairs.contains(&("key".to_owned(), "k123".to_owned())));
    }
}
