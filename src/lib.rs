//! Herbarium-Harvest: a resumable species profile harvester
//!
//! This crate assembles complete botanical species profiles from many
//! independently fetched page fragments, decides when a profile is complete
//! enough to write, and keeps a durable status ledger so long crawls can be
//! resumed or selectively retried.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod crawler;
pub mod ledger;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for Herbarium-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] crawler::FetchFailure),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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
}

/// Result type alias for Herbarium-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use aggregator::{ApplyOutcome, CompletionPolicy, EntityAggregator};
pub use catalog::{FragmentKind, SectionGroup};
pub use config::Config;
pub use crawler::{Coordinator, HerbariumClient, RunOptions, RunSummary};
pub use ledger::{StatusLedger, StatusSink};
pub use state::{EntityId, EntityStatus};
