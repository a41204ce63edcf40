//! Shared response handling for third-party HTTP calls.

use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::FetchError;

/// Maps the response status to a typed error and parses a 2xx body as JSON.
///
/// - 429 becomes [`FetchError::RateLimited`] (honouring `Retry-After`, default 60 s).
/// - 404 becomes [`FetchError::NotFound`].
/// - Any other non-2xx becomes [`FetchError::UnexpectedStatus`].
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    service: &str,
    context: &str,
) -> Result<T, FetchError> {
    let status = response.status();
    let url = redacted(response.url());

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(FetchError::RateLimited {
            service: service.to_owned(),
            retry_after_secs,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound { url });
    }
    if !status.is_success() {
        return Err(FetchError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

/// URL without its query string, so API keys never reach logs or error text.
pub(crate) fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

/// Parses `base_url`, normalising it to end with exactly one slash so that
/// `Url::join` appends to the path instead of replacing its last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, FetchError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| FetchError::InvalidBaseUrl {
        base_url: base_url.to_owned(),
        reason: e.to_string(),
    })
}
