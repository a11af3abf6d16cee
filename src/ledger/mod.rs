//! Status ledger for resumable runs
//!
//! The ledger is the only state that outlives a process. It is a JSON document
//! with two maps, `completed` and `failed`, keyed by species id:
//!
//! ```json
//! {
//!   "completed": {"42": {"timestamp": "...", "status": "success", "has_minimal_data": true}},
//!   "failed": {"7": {"timestamp": "...", "error_type": "server_error", "error_msg": "HTTP 503", "retryable": true}}
//! }
//! ```
//!
//! Unknown fields are ignored and missing ones take defaults, so older and
//! newer ledger files stay readable.

mod file;
mod traits;

pub(crate) use file::write_atomic;
pub use file::StatusLedger;
pub use traits::{LedgerError, LedgerResult, StatusSink};

use crate::catalog::FragmentKind;
use crate::state::{Completion, EntityFailure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ledger entry for a species whose record was written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletedEntry {
    pub timestamp: String,
    pub status: String,
    pub has_minimal_data: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_sections: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_received: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_expected: Option<usize>,
}

impl CompletedEntry {
    pub fn new(timestamp: String, has_minimal_data: bool, completion: &Completion) -> Self {
        let partial = completion.kind.is_partial() || !completion.missing.is_empty();

        Self {
            timestamp,
            status: "success".to_string(),
            has_minimal_data,
            completion: Some(completion.kind.as_str().to_string()),
            missing_sections: partial.then(|| section_keys(&completion.missing)),
            responses_received: partial.then_some(completion.responses_received),
            responses_expected: partial.then_some(completion.responses_expected),
        }
    }

    /// Returns true if the record was released before every section arrived
    pub fn is_partial(&self) -> bool {
        self.completion.as_deref() == Some("partial_timeout")
    }
}

/// Ledger entry for a species that failed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailedEntry {
    pub timestamp: String,
    pub error_type: String,
    pub error_msg: String,
    pub retryable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_received: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses_expected: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_sections: Option<Vec<String>>,
}

impl FailedEntry {
    pub fn new(timestamp: String, failure: &EntityFailure) -> Self {
        Self {
            timestamp,
            error_type: failure.error_type.clone(),
            error_msg: failure.message.clone(),
            retryable: failure.retryable,
            responses_received: failure.diagnostics.responses_received,
            responses_expected: failure.diagnostics.responses_expected,
            missing_sections: failure
                .diagnostics
                .missing_sections
                .as_ref()
                .map(section_keys),
        }
    }
}

/// The persisted ledger document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerData {
    pub completed: BTreeMap<String, CompletedEntry>,
    pub failed: BTreeMap<String, FailedEntry>,
}

fn section_keys(kinds: &BTreeSet<FragmentKind>) -> Vec<String> {
    kinds.iter().map(|kind| kind.key().to_string()).collect()
}
