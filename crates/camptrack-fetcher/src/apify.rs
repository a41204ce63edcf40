//! Apify actor runs: start, poll until finished, read the dataset.
//!
//! Scrape-based fetchers share one [`ApifyClient`]. Each run is started,
//! polled at a fixed interval for a bounded number of attempts, and its
//! default dataset is read once the run reports `SUCCEEDED`.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FetchError;
use crate::http::{parse_base_url, read_json};
use crate::poll::{poll_bounded, PollConfig, PollStatus};
use crate::registry::RetryPolicy;
use crate::retry::retry_with_backoff;
use crate::types::{ApiResponse, RunData};

const DEFAULT_BASE_URL: &str = "https://api.apify.com/";
const SERVICE: &str = "apify";

/// Client for the Apify v2 REST API.
pub struct ApifyClient {
    client: Client,
    token: String,
    base_url: Url,
    retry: RetryPolicy,
    poll: PollConfig,
}

impl ApifyClient {
    /// Creates a client pointed at the production Apify API.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        token: &str,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
        poll: PollConfig,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(token, DEFAULT_BASE_URL, timeout_secs, user_agent, retry, poll)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the client cannot be built, or
    /// [`FetchError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        token: &str,
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        retry: RetryPolicy,
        poll: PollConfig,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            token: token.to_owned(),
            base_url: parse_base_url(base_url)?,
            retry,
            poll,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Runs `actor_id` with `input` and returns its dataset items.
    ///
    /// # Errors
    ///
    /// - [`FetchError::ScrapeRunFailed`] if the run ends `FAILED`, `ABORTED`,
    ///   or `TIMED-OUT`.
    /// - [`FetchError::PollTimeout`] if the run is still unfinished after the
    ///   configured number of polls.
    /// - HTTP and deserialization errors from any of the three calls.
    pub async fn run_actor<I, T>(&self, actor_id: &str, input: &I) -> Result<Vec<T>, FetchError>
    where
        I: Serialize + Sync,
        T: DeserializeOwned,
    {
        let run = self.start_run(actor_id, input).await?;
        tracing::debug!(actor_id, run_id = %run.id, "apify run started");

        let finished = self.wait_for_run(run).await?;
        tracing::debug!(
            actor_id,
            run_id = %finished.id,
            dataset_id = %finished.default_dataset_id,
            "apify run finished"
        );

        self.dataset_items(&finished.default_dataset_id).await
    }

    async fn start_run<I: Serialize + Sync>(
        &self,
        actor_id: &str,
        input: &I,
    ) -> Result<RunData, FetchError> {
        let url = self.endpoint(&format!("v2/acts/{actor_id}/runs"))?;
        let response: ApiResponse<RunData> =
            retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || async {
                let response = self
                    .client
                    .post(url.clone())
                    .bearer_auth(&self.token)
                    .json(input)
                    .send()
                    .await?;
                read_json(response, SERVICE, "actor run start").await
            })
            .await?;
        Ok(response.data)
    }

    async fn run_status(&self, run_id: &str) -> Result<RunData, FetchError> {
        let url = self.endpoint(&format!("v2/actor-runs/{run_id}"))?;
        let response: ApiResponse<RunData> =
            retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || async {
                let response = self
                    .client
                    .get(url.clone())
                    .bearer_auth(&self.token)
                    .send()
                    .await?;
                read_json(response, SERVICE, "actor run status").await
            })
            .await?;
        Ok(response.data)
    }

    async fn wait_for_run(&self, run: RunData) -> Result<RunData, FetchError> {
        if run.is_succeeded() {
            return Ok(run);
        }
        let run_id = run.id;

        let finished = poll_bounded(self.poll, |attempt| {
            let run_id = run_id.as_str();
            async move {
                let current = self.run_status(run_id).await?;
                if current.is_succeeded() {
                    return Ok(PollStatus::Ready(current));
                }
                if current.is_failed() {
                    return Err(FetchError::ScrapeRunFailed {
                        run_id: current.id,
                        status: current.status,
                    });
                }
                tracing::trace!(run_id, attempt, status = %current.status, "apify run in progress");
                Ok(PollStatus::Pending)
            }
        })
        .await?;

        finished.ok_or(FetchError::PollTimeout {
            attempts: self.poll.max_attempts,
            run_id,
        })
    }

    async fn dataset_items<T: DeserializeOwned>(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<T>, FetchError> {
        let mut url = self.endpoint(&format!("v2/datasets/{dataset_id}/items"))?;
        url.query_pairs_mut().append_pair("format", "json");

        retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || async {
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await?;
            read_json(response, SERVICE, "dataset items").await
        })
        .await
    }
}
