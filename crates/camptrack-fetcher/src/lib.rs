//! Per-platform Metrics Fetchers.
//!
//! Each fetcher turns a content URL into normalized engagement metrics by
//! calling a third-party capability: the `YouTube` Data API for videos, and
//! Apify scrape actors for Instagram and `TikTok` posts. Failures never leave
//! [`MetricsFetcher::fetch`]; they come back as a zeroed
//! [`camptrack_core::MetricsResult`] carrying the error message.

pub mod apify;
pub mod error;
mod http;
pub mod instagram;
pub mod poll;
pub mod registry;
pub(crate) mod retry;
pub mod tiktok;
pub mod types;
pub mod youtube;

pub use apify::ApifyClient;
pub use error::FetchError;
pub use instagram::InstagramFetcher;
pub use poll::PollConfig;
pub use registry::{FetcherRegistry, MetricsFetcher, RetryPolicy};
pub use tiktok::TiktokFetcher;
pub use types::RawEngagement;
pub use youtube::YoutubeFetcher;
