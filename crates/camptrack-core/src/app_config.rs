use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub youtube_api_key: Option<String>,
    pub apify_token: Option<String>,
    pub youtube_base_url: String,
    pub apify_base_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_request_timeout_secs: u64,
    /// Upper bound on a single Metrics Fetcher call, including scrape polling.
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_max_retries: u32,
    pub fetch_retry_backoff_base_ms: u64,
    pub scrape_poll_interval_secs: u64,
    pub scrape_poll_max_attempts: u32,
    /// `None` means unbounded fan-out.
    pub batch_max_concurrency: Option<usize>,
    pub cache_ttl_secs: u64,
    pub job_batch_size: usize,
    pub job_max_concurrency: usize,
    pub job_stale_after_secs: u64,
    pub processor_cron: String,
    pub cache_purge_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field(
                "youtube_api_key",
                &self.youtube_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "apify_token",
                &self.apify_token.as_ref().map(|_| "[redacted]"),
            )
            .field("youtube_base_url", &self.youtube_base_url)
            .field("apify_base_url", &self.apify_base_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "fetch_request_timeout_secs",
                &self.fetch_request_timeout_secs,
            )
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field(
                "fetch_retry_backoff_base_ms",
                &self.fetch_retry_backoff_base_ms,
            )
            .field("scrape_poll_interval_secs", &self.scrape_poll_interval_secs)
            .field("scrape_poll_max_attempts", &self.scrape_poll_max_attempts)
            .field("batch_max_concurrency", &self.batch_max_concurrency)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("job_batch_size", &self.job_batch_size)
            .field("job_max_concurrency", &self.job_max_concurrency)
            .field("job_stale_after_secs", &self.job_stale_after_secs)
            .field("processor_cron", &self.processor_cron)
            .field("cache_purge_cron", &self.cache_purge_cron)
            .finish()
    }
}
