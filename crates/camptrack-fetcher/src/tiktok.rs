//! `TikTok` video metrics via the Apify `TikTok` scraper.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use camptrack_core::Platform;
use regex::Regex;

use crate::apify::ApifyClient;
use crate::error::FetchError;
use crate::registry::MetricsFetcher;
use crate::types::{RawEngagement, TiktokScraperInput, TiktokVideo};

pub const TIKTOK_SCRAPER_ACTOR: &str = "clockworks~tiktok-scraper";

static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:/(?:video|photo)/\d+|^(?:https?://)?(?:vm|vt)\.tiktok\.com/[A-Za-z0-9]+)")
        .expect("valid regex")
});

/// `true` for direct video/photo URLs and `vm.`/`vt.` share links.
#[must_use]
pub fn is_video_url(url: &str) -> bool {
    VIDEO_URL_RE.is_match(url)
}

pub struct TiktokFetcher {
    apify: Arc<ApifyClient>,
}

impl TiktokFetcher {
    #[must_use]
    pub fn new(apify: Arc<ApifyClient>) -> Self {
        Self { apify }
    }
}

#[async_trait]
impl MetricsFetcher for TiktokFetcher {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn fetch_engagement(&self, url: &str) -> Result<RawEngagement, FetchError> {
        if !is_video_url(url) {
            return Err(FetchError::UnrecognizedUrl {
                platform: "tiktok",
                url: url.to_owned(),
            });
        }

        let input = TiktokScraperInput {
            post_urls: vec![url.to_owned()],
            results_per_page: 1,
            should_download_videos: false,
            should_download_covers: false,
        };
        let videos: Vec<TiktokVideo> = self.apify.run_actor(TIKTOK_SCRAPER_ACTOR, &input).await?;

        let video = videos.into_iter().next().ok_or_else(|| FetchError::NotFound {
            url: url.to_owned(),
        })?;
        if let Some(reason) = video.error {
            return Err(FetchError::InvalidPayload {
                context: "tiktok scraper".to_owned(),
                reason,
            });
        }

        Ok(video.to_engagement())
    }
}
