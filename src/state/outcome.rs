//! Terminal outcomes of species assembly
//!
//! A species ends either as a `FinishedRecord` handed to the record writer or
//! as an `EntityFailure` handed to the status ledger.

use crate::catalog::{FragmentKind, SectionGroup};
use crate::state::{BaseFields, EntityId, FragmentContent};
use std::collections::{BTreeMap, BTreeSet};

/// Ledger `error_type` values produced by the harvester itself
pub mod error_type {
    pub const TIMEOUT_INSUFFICIENT_DATA: &str = "timeout_insufficient_data";
    pub const WRITE_ERROR: &str = "write_error";
    pub const INCOMPLETE_ON_CLOSE: &str = "incomplete_on_close";
}

/// Which completion rule released the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Every expected fragment arrived with content
    AllFragments,
    /// Every expected response arrived, some of them empty
    AllResponses,
    /// The timeout window elapsed with enough responses
    PartialTimeout,
}

impl CompletionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllFragments => "complete",
            Self::AllResponses => "all_responses",
            Self::PartialTimeout => "partial_timeout",
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialTimeout)
    }
}

/// Diagnostics attached to an emitted record
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub kind: CompletionKind,
    /// Expected slots that never received content
    pub missing: BTreeSet<FragmentKind>,
    pub responses_received: usize,
    pub responses_expected: usize,
}

/// A species profile released for persistence
#[derive(Debug, Clone)]
pub struct FinishedRecord {
    pub entity_id: EntityId,
    pub base: BaseFields,
    pub sections: BTreeMap<FragmentKind, FragmentContent>,
    pub completion: Completion,
}

impl FinishedRecord {
    /// Returns true if the record carries more than an empty skeleton
    ///
    /// A scientific name, any description fragment, or the nomenclature page
    /// is enough.
    pub fn has_minimal_data(&self) -> bool {
        self.base.basic_info.scientific_name.is_some()
            || self
                .sections
                .keys()
                .any(|kind| kind.group() == SectionGroup::Description)
            || self.sections.contains_key(&FragmentKind::Nomenclature)
    }

    /// Content of one group keyed by slot name
    pub fn group(&self, group: SectionGroup) -> BTreeMap<&'static str, &FragmentContent> {
        self.sections
            .iter()
            .filter(|(kind, _)| kind.group() == group)
            .map(|(kind, content)| (kind.slot(), content))
            .collect()
    }
}

/// Response counts attached to a failure, when known
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureDiagnostics {
    pub responses_received: Option<usize>,
    pub responses_expected: Option<usize>,
    pub missing_sections: Option<BTreeSet<FragmentKind>>,
}

/// An entity-level terminal failure
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    pub error_type: String,
    pub message: String,
    pub retryable: bool,
    pub diagnostics: FailureDiagnostics,
}

impl EntityFailure {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            retryable,
            diagnostics: FailureDiagnostics::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: FailureDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}
