use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("CAMPTRACK_ENV", "development"))?;
    let bind_addr = parse_addr("CAMPTRACK_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("CAMPTRACK_LOG_LEVEL", "info");

    let youtube_api_key = lookup("YOUTUBE_API_KEY").ok().filter(|k| !k.is_empty());
    let apify_token = lookup("APIFY_TOKEN").ok().filter(|k| !k.is_empty());
    let youtube_base_url = or_default("CAMPTRACK_YOUTUBE_BASE_URL", "https://www.googleapis.com");
    let apify_base_url = or_default("CAMPTRACK_APIFY_BASE_URL", "https://api.apify.com");

    let db_max_connections = parse_u32("CAMPTRACK_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CAMPTRACK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CAMPTRACK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let fetch_request_timeout_secs = parse_u64("CAMPTRACK_FETCH_REQUEST_TIMEOUT_SECS", "30")?;
    let fetch_timeout_secs = parse_u64("CAMPTRACK_FETCH_TIMEOUT_SECS", "300")?;
    let fetch_user_agent = or_default(
        "CAMPTRACK_FETCH_USER_AGENT",
        "camptrack/0.1 (campaign-analytics)",
    );
    let fetch_max_retries = parse_u32("CAMPTRACK_FETCH_MAX_RETRIES", "3")?;
    let fetch_retry_backoff_base_ms = parse_u64("CAMPTRACK_FETCH_RETRY_BACKOFF_BASE_MS", "1000")?;

    let scrape_poll_interval_secs = parse_u64("CAMPTRACK_SCRAPE_POLL_INTERVAL_SECS", "5")?;
    let scrape_poll_max_attempts = parse_u32("CAMPTRACK_SCRAPE_POLL_MAX_ATTEMPTS", "60")?;
    if scrape_poll_max_attempts == 0 {
        return Err(invalid(
            "CAMPTRACK_SCRAPE_POLL_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }

    // 0 disables the bound.
    let batch_max_concurrency = match parse_usize("CAMPTRACK_BATCH_MAX_CONCURRENCY", "0")? {
        0 => None,
        n => Some(n),
    };

    let cache_ttl_secs = parse_u64("CAMPTRACK_CACHE_TTL_SECS", "3600")?;
    let job_batch_size = parse_usize("CAMPTRACK_JOB_BATCH_SIZE", "10")?.max(1);
    let job_max_concurrency = parse_usize("CAMPTRACK_JOB_MAX_CONCURRENCY", "4")?.max(1);
    let job_stale_after_secs = parse_u64("CAMPTRACK_JOB_STALE_AFTER_SECS", "1800")?;

    let processor_cron = or_default("CAMPTRACK_PROCESSOR_CRON", "0 * * * * *");
    let cache_purge_cron = or_default("CAMPTRACK_CACHE_PURGE_CRON", "0 30 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        youtube_api_key,
        apify_token,
        youtube_base_url,
        apify_base_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        fetch_request_timeout_secs,
        fetch_timeout_secs,
        fetch_user_agent,
        fetch_max_retries,
        fetch_retry_backoff_base_ms,
        scrape_poll_interval_secs,
        scrape_poll_max_attempts,
        batch_max_concurrency,
        cache_ttl_secs,
        job_batch_size,
        job_max_concurrency,
        job_stale_after_secs,
        processor_cron,
        cache_purge_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CAMPTRACK_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
