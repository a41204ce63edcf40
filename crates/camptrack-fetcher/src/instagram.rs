//! Instagram post metrics via the Apify Instagram scraper.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use camptrack_core::Platform;
use regex::Regex;

use crate::apify::ApifyClient;
use crate::error::FetchError;
use crate::registry::MetricsFetcher;
use crate::types::{InstagramPost, InstagramScraperInput, RawEngagement};

pub const INSTAGRAM_SCRAPER_ACTOR: &str = "apify~instagram-scraper";

static POST_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:p|reel|reels|tv)/[A-Za-z0-9_-]+").expect("valid regex"));

/// `true` for post, reel, and IGTV URLs; profile pages are not fetchable.
#[must_use]
pub fn is_post_url(url: &str) -> bool {
    POST_PATH_RE.is_match(url)
}

pub struct InstagramFetcher {
    apify: Arc<ApifyClient>,
}

impl InstagramFetcher {
    #[must_use]
    pub fn new(apify: Arc<ApifyClient>) -> Self {
        Self { apify }
    }
}

#[async_trait]
impl MetricsFetcher for InstagramFetcher {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn fetch_engagement(&self, url: &str) -> Result<RawEngagement, FetchError> {
        if !is_post_url(url) {
            return Err(FetchError::UnrecognizedUrl {
                platform: "instagram",
                url: url.to_owned(),
            });
        }

        let input = InstagramScraperInput {
            direct_urls: vec![url.to_owned()],
            results_type: "details",
            results_limit: 1,
        };
        let posts: Vec<InstagramPost> = self
            .apify
            .run_actor(INSTAGRAM_SCRAPER_ACTOR, &input)
            .await?;

        let post = posts.into_iter().next().ok_or_else(|| FetchError::NotFound {
            url: url.to_owned(),
        })?;
        if let Some(error) = post.error.as_deref() {
            let reason = post
                .error_description
                .as_deref()
                .map_or_else(|| error.to_owned(), |d| format!("{error}: {d}"));
            return Err(FetchError::InvalidPayload {
                context: "instagram scraper".to_owned(),
                reason,
            });
        }

        Ok(post.to_engagement())
    }
}
