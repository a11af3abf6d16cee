//! Entity aggregator
//!
//! Owns every in-progress `AggregationRecord`, applies incoming fragments in
//! any order, and hands each entity to exactly one terminal outcome.

use crate::aggregator::policy::{CompletionPolicy, Decision};
use crate::catalog::{FragmentKind, CATALOG};
use crate::state::{
    error_type, AggregationRecord, BaseFields, Completion, CompletionKind, EntityFailure,
    EntityId, EntityStatus, FailureDiagnostics, FinishedRecord, FragmentContent,
};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Instant;

/// Why a fragment or poll was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The entity was never begun in this run
    UnknownEntity,
    /// The entity already reached a terminal state
    AlreadyTerminal(EntityStatus),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntity => write!(f, "unknown entity"),
            Self::AlreadyTerminal(status) => write!(f, "already terminal ({})", status),
        }
    }
}

/// Result of applying a fragment (or polling) for one entity
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Keep buffering
    StillWaiting,
    /// The record is released to the writer; the aggregator keeps no copy
    Emit(FinishedRecord),
    /// The entity failed; nothing will be written
    Failed(EntityFailure),
    /// The call was a no-op
    Rejected(RejectReason),
}

impl ApplyOutcome {
    /// Returns true if this call moved the entity to a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Emit(_) | Self::Failed(_))
    }
}

/// Per-run owner of in-progress species assemblies
///
/// Constructed once per run and driven from a single task, which serializes
/// all mutations. An entity id reaches at most one terminal state per run;
/// afterwards every call for it is rejected.
pub struct EntityAggregator {
    policy: CompletionPolicy,
    in_progress: HashMap<EntityId, AggregationRecord>,
    terminal: HashMap<EntityId, EntityStatus>,
}

impl EntityAggregator {
    pub fn new(policy: CompletionPolicy) -> Self {
        Self {
            policy,
            in_progress: HashMap::new(),
            terminal: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &CompletionPolicy {
        &self.policy
    }

    /// Starts assembling an entity
    ///
    /// `discovered` is the set of fragment kinds the index page advertises;
    /// `None` means discovery could not tell, and the full catalog is expected.
    /// Returns true if a new record was created. Beginning an entity that is
    /// already in progress is a no-op; beginning a terminal one is refused.
    pub fn begin_entity(
        &mut self,
        id: EntityId,
        base: BaseFields,
        discovered: Option<BTreeSet<FragmentKind>>,
    ) -> bool {
        self.begin_entity_at(id, base, discovered, Instant::now())
    }

    pub fn begin_entity_at(
        &mut self,
        id: EntityId,
        base: BaseFields,
        discovered: Option<BTreeSet<FragmentKind>>,
        now: Instant,
    ) -> bool {
        if let Some(status) = self.terminal.get(&id) {
            tracing::warn!(
                "Species {}: refusing to begin, already {} in this run",
                id,
                status
            );
            return false;
        }

        if self.in_progress.contains_key(&id) {
            return false;
        }

        let expected = match discovered {
            Some(kinds) => {
                tracing::info!(
                    "Species {}: expecting {} sections based on menu",
                    id,
                    kinds.len()
                );
                kinds
            }
            None => {
                tracing::info!(
                    "Species {}: no section menu, expecting all {} catalog sections",
                    id,
                    CATALOG.len()
                );
                CATALOG.iter().copied().collect()
            }
        };

        let record = AggregationRecord::new(id.clone(), base, expected, now);
        self.in_progress.insert(id, record);
        true
    }

    /// Applies one sub-fetch response and re-evaluates the completion policy
    ///
    /// `content` is None when the fetch failed or returned nothing; it still
    /// counts as a response.
    pub fn apply_fragment(
        &mut self,
        id: &EntityId,
        kind: FragmentKind,
        content: Option<FragmentContent>,
    ) -> ApplyOutcome {
        self.apply_fragment_at(id, kind, content, Instant::now())
    }

    pub fn apply_fragment_at(
        &mut self,
        id: &EntityId,
        kind: FragmentKind,
        content: Option<FragmentContent>,
        now: Instant,
    ) -> ApplyOutcome {
        let Some(record) = self.in_progress.get_mut(id) else {
            let reason = self.reject_reason(id);
            tracing::debug!("Species {}: dropping {} fragment, {}", id, kind, reason);
            return ApplyOutcome::Rejected(reason);
        };

        if record.apply(kind, content) {
            tracing::debug!("Species {}: completed {}", id, kind);
        }

        self.decide(id, now)
    }

    /// Re-evaluates the completion policy without a new fragment
    ///
    /// Used when the timeout window may have elapsed with no arrivals.
    pub fn poll(&mut self, id: &EntityId, now: Instant) -> ApplyOutcome {
        if !self.in_progress.contains_key(id) {
            return ApplyOutcome::Rejected(self.reject_reason(id));
        }
        self.decide(id, now)
    }

    /// Fails an entity from outside the policy (e.g. its index page could not be fetched)
    ///
    /// Any buffered data is discarded. Returns None if the entity was already
    /// terminal, in which case the failure must not be recorded.
    pub fn abandon(&mut self, id: &EntityId, failure: EntityFailure) -> Option<EntityFailure> {
        if let Some(status) = self.terminal.get(id) {
            tracing::warn!(
                "Species {}: ignoring {} failure, already {}",
                id,
                failure.error_type,
                status
            );
            return None;
        }

        self.in_progress.remove(id);
        self.terminal.insert(id.clone(), EntityStatus::Failed);
        Some(failure)
    }

    /// Fails every entity still in progress, for use when the run is closing
    pub fn drain_incomplete(&mut self) -> Vec<(EntityId, EntityFailure)> {
        let ids: Vec<EntityId> = self.in_progress.keys().cloned().collect();
        let mut failures = Vec::with_capacity(ids.len());

        for id in ids {
            let Some(record) = self.in_progress.remove(&id) else {
                continue;
            };

            tracing::warn!(
                "Species {} incomplete on close: {} responses, missing {} sections",
                id,
                record.responses_received(),
                record.pending().len()
            );

            let failure = EntityFailure::new(
                error_type::INCOMPLETE_ON_CLOSE,
                "Run closed before completion",
                true,
            )
            .with_diagnostics(diagnostics_for(&record));

            self.terminal.insert(id.clone(), EntityStatus::Failed);
            failures.push((id, failure));
        }

        failures
    }

    pub fn status(&self, id: &EntityId) -> Option<EntityStatus> {
        if self.in_progress.contains_key(id) {
            return Some(EntityStatus::InProgress);
        }
        self.terminal.get(id).copied()
    }

    /// Fragment kinds still awaiting content for an in-progress entity
    pub fn pending(&self, id: &EntityId) -> Option<&BTreeSet<FragmentKind>> {
        self.in_progress.get(id).map(|record| record.pending())
    }

    pub fn in_progress_count(&self) -> usize {
        self.in_progress.len()
    }

    fn reject_reason(&self, id: &EntityId) -> RejectReason {
        match self.terminal.get(id) {
            Some(status) => RejectReason::AlreadyTerminal(*status),
            None => RejectReason::UnknownEntity,
        }
    }

    /// Evaluates the policy and performs the terminal transition if one is due
    fn decide(&mut self, id: &EntityId, now: Instant) -> ApplyOutcome {
        let Some(record) = self.in_progress.get(id) else {
            return ApplyOutcome::Rejected(self.reject_reason(id));
        };

        let decision = self.policy.evaluate(record, now);
        let elapsed = now.saturating_duration_since(record.first_seen_at());
        let received = record.responses_received();
        let expected = record.expected_total();
        let filled = record.filled();

        match decision {
            Decision::Waiting => {
                tracing::debug!(
                    "Species {}: {}/{} responses received ({} with data), waiting {:.0}s",
                    id,
                    received,
                    expected,
                    filled,
                    elapsed.as_secs_f64()
                );
                ApplyOutcome::StillWaiting
            }

            Decision::Complete | Decision::CompleteAllResponses | Decision::CompletePartial => {
                let kind = match decision {
                    Decision::Complete => CompletionKind::AllFragments,
                    Decision::CompleteAllResponses => CompletionKind::AllResponses,
                    _ => CompletionKind::PartialTimeout,
                };

                match kind {
                    CompletionKind::AllFragments => tracing::info!(
                        "Species {}: all {} sections complete",
                        id,
                        filled
                    ),
                    CompletionKind::AllResponses => tracing::info!(
                        "Species {}: received all {} responses ({} with data, {} empty/missing)",
                        id,
                        expected,
                        filled,
                        expected.saturating_sub(filled)
                    ),
                    CompletionKind::PartialTimeout => tracing::warn!(
                        "Species {}: timeout after {:.0}s with {}/{} responses ({} with data), emitting partial record",
                        id,
                        elapsed.as_secs_f64(),
                        received,
                        expected,
                        filled
                    ),
                }

                let finished = self.finish(id, kind);
                match finished {
                    Some(record) => ApplyOutcome::Emit(record),
                    None => ApplyOutcome::Rejected(self.reject_reason(id)),
                }
            }

            Decision::Failed => {
                tracing::error!(
                    "Species {}: timeout after {:.0}s with only {}/{} responses ({} with data), insufficient data",
                    id,
                    elapsed.as_secs_f64(),
                    received,
                    expected,
                    filled
                );

                let diagnostics = diagnostics_for(record);
                let failure = EntityFailure::new(
                    error_type::TIMEOUT_INSUFFICIENT_DATA,
                    format!("Timeout after {:.0}s", elapsed.as_secs_f64()),
                    true,
                )
                .with_diagnostics(diagnostics);

                self.in_progress.remove(id);
                self.terminal.insert(id.clone(), EntityStatus::Failed);
                ApplyOutcome::Failed(failure)
            }
        }
    }

    /// Moves a record out of the in-progress map into a `FinishedRecord`
    fn finish(&mut self, id: &EntityId, kind: CompletionKind) -> Option<FinishedRecord> {
        let record = self.in_progress.remove(id)?;
        let responses_received = record.responses_received();
        let responses_expected = record.expected_total();
        let (entity_id, base, sections, missing) = record.into_parts();

        let status = if kind.is_partial() {
            EntityStatus::PartiallyCompleted
        } else {
            EntityStatus::Completed
        };
        self.terminal.insert(entity_id.clone(), status);

        Some(FinishedRecord {
            entity_id,
            base,
            sections,
            completion: Completion {
                kind,
                missing,
                responses_received,
                responses_expected,
            },
        })
    }
}

fn diagnostics_for(record: &AggregationRecord) -> FailureDiagnostics {
    FailureDiagnostics {
        responses_received: Some(record.responses_received()),
        responses_expected: Some(record.expected_total()),
        missing_sections: Some(record.pending().clone()),
    }
}
