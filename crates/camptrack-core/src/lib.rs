//! Domain types, platform resolution, aggregation, and configuration for the
//! campaign analytics pipeline.

pub mod app_config;
pub mod config;
pub mod fingerprint;
pub mod jobs;
pub mod metrics;
pub mod platform;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use fingerprint::{fingerprint, normalize_url};
pub use jobs::{AnalyticsJob, JobStatus, ParseJobStatusError};
pub use metrics::{
    aggregate, engagement_rate, CampaignAnalyticsSnapshot, CampaignTotals, ContentMetrics,
    MetricsResult,
};
pub use platform::{resolve, ContentReference, ParsePlatformError, Platform};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
