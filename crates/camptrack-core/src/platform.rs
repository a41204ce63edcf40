//! Platform resolution for content URLs.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static YOUTUBE_HOST_RE: LazyLock<Regex> = LazyLock::new(|| host_regex(r"youtube\.com|youtu\.be"));
static INSTAGRAM_HOST_RE: LazyLock<Regex> = LazyLock::new(|| host_regex(r"instagram\.com"));
static TIKTOK_HOST_RE: LazyLock<Regex> = LazyLock::new(|| host_regex(r"tiktok\.com"));

/// Matches `domains` as the registrable host of a URL, with or without scheme
/// and with any number of subdomains (`www.`, `m.`, `vm.`).
fn host_regex(domains: &str) -> Regex {
    Regex::new(&format!(
        r"(?i)^(?:[a-z][a-z0-9+.\-]*://)?(?:[^/@?#\s]*@)?(?:[a-z0-9\-]+\.)*(?:{domains})(?::\d+)?(?:[/?#]|$)"
    ))
    .expect("valid host regex")
}

/// Content hosting platform a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Unknown,
}

impl Platform {
    /// Platforms that have a Metrics Fetcher.
    pub const SUPPORTED: [Platform; 3] = [Platform::Youtube, Platform::Instagram, Platform::Tiktok];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn is_supported(self) -> bool {
        !matches!(self, Platform::Unknown)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized platform \"{0}\"")]
pub struct ParsePlatformError(pub String);

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "unknown" => Ok(Platform::Unknown),
            other => Err(ParsePlatformError(other.to_string())),
        }
    }
}

/// Classifies a content URL by its host.
///
/// Pure and deterministic. Anything that is not a YouTube, Instagram, or
/// TikTok URL resolves to [`Platform::Unknown`].
#[must_use]
pub fn resolve(url: &str) -> Platform {
    let url = url.trim();
    if YOUTUBE_HOST_RE.is_match(url) {
        Platform::Youtube
    } else if INSTAGRAM_HOST_RE.is_match(url) {
        Platform::Instagram
    } else if TIKTOK_HOST_RE.is_match(url) {
        Platform::Tiktok
    } else {
        Platform::Unknown
    }
}

/// A campaign content URL tagged with the platform it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentReference {
    pub url: String,
    pub platform: Platform,
}

impl ContentReference {
    /// Builds a reference whose platform is derived from `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into().trim().to_string();
        let platform = resolve(&url);
        Self { url, platform }
    }
}
