use thiserror::Error;

/// Errors raised while fetching metrics from a third-party capability.
///
/// These stay inside the fetcher crate's boundary: the public fetch path
/// renders them into `MetricsResult::error`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response parsed but did not contain usable metrics.
    #[error("invalid payload from {context}: {reason}")]
    InvalidPayload { context: String, reason: String },

    #[error("rate limited by {service} (retry after {retry_after_secs}s)")]
    RateLimited {
        service: String,
        retry_after_secs: u64,
    },

    #[error("content not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The URL belongs to the platform but not to a shape we can fetch.
    #[error("unrecognized {platform} URL \"{url}\"")]
    UnrecognizedUrl { platform: &'static str, url: String },

    #[error("scrape run {run_id} finished with status {status}")]
    ScrapeRunFailed { run_id: String, status: String },

    #[error("scrape run {run_id} still unfinished after {attempts} polls")]
    PollTimeout { run_id: String, attempts: u32 },

    #[error("fetch exceeded {timeout_secs}s time limit")]
    TimedOut { timeout_secs: u64 },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    /// A required external-service credential is not configured.
    #[error("{0} is not set; required to fetch metrics")]
    MissingCredential(&'static str),
}
