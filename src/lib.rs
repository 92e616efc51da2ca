//! Event-Sweep: a batch harvester for event identifiers
//!
//! This crate walks the paginated listing views of an events site over a
//! rolling date window, extracts the numeric event identifiers it finds,
//! upserts them into a store that tracks when each identifier was first and
//! last observed, and then pings a downstream service to refresh.

pub mod config;
pub mod crawler;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Event-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Notification to {endpoint} failed: {source}")]
    Notify {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("Invalid job phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobPhase,
        to: state::JobPhase,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid seed path template: {0}")]
    InvalidTemplate(String),
}

/// Result type alias for Event-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlStats, EventId};
pub use pipeline::{run_job, run_job_with_hash, Pipeline, RunReport};
pub use state::JobPhase;
