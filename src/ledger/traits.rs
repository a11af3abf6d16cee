//! Ledger traits and error types

use crate::state::{Completion, EntityFailure, EntityId};
use thiserror::Error;

/// Errors that can occur while persisting the status ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ledger lock poisoned")]
    Poisoned,
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Destination for terminal entity outcomes
///
/// Implementations must persist each call before returning, so a crash right
/// after a call leaves the recorded state consistent with that call.
pub trait StatusSink: Send + Sync {
    /// Records a written record; supersedes any earlier failure for the id
    fn record_success(
        &self,
        id: &EntityId,
        has_minimal_data: bool,
        completion: &Completion,
    ) -> LedgerResult<()>;

    /// Records an entity-level failure
    fn record_failure(&self, id: &EntityId, failure: &EntityFailure) -> LedgerResult<()>;
}
