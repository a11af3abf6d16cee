//! Output module for species records and harvest reports
//!
//! This module handles:
//! - Writing one JSON document per finished species
//! - Summarizing the status ledger for `--stats`

pub mod stats;
mod writer;

pub use stats::{print_statistics, LedgerStatistics};
pub use writer::{RecordWriter, WriteOutcome};

use thiserror::Error;

/// Errors that can occur while writing species records
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize record: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
