use crate::catalog::FragmentKind;
use crate::state::{BaseFields, EntityId, FragmentContent};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// In-memory assembly state of one species profile
///
/// Created when the entity is discovered and consumed when a completion
/// decision is made. `pending` only ever shrinks and `responses_received`
/// only ever grows; both are private so the invariants hold by construction.
#[derive(Debug, Clone)]
pub struct AggregationRecord {
    entity_id: EntityId,
    base: BaseFields,
    sections: BTreeMap<FragmentKind, FragmentContent>,
    pending: BTreeSet<FragmentKind>,
    expected_total: usize,
    responses_received: usize,
    first_seen_at: Instant,
}

impl AggregationRecord {
    /// Creates a record expecting exactly `expected` fragment kinds
    pub fn new(
        entity_id: EntityId,
        base: BaseFields,
        expected: BTreeSet<FragmentKind>,
        first_seen_at: Instant,
    ) -> Self {
        let expected_total = expected.len();
        Self {
            entity_id,
            base,
            sections: BTreeMap::new(),
            pending: expected,
            expected_total,
            responses_received: 0,
            first_seen_at,
        }
    }

    /// Records one sub-fetch response
    ///
    /// Every call counts as a response. Content that is absent or empty leaves
    /// the slot pending. Returns true if a pending slot was filled.
    pub fn apply(&mut self, kind: FragmentKind, content: Option<FragmentContent>) -> bool {
        self.responses_received += 1;

        match content {
            Some(content) if !content.is_empty() => {
                self.sections.insert(kind, content);
                self.pending.remove(&kind)
            }
            _ => false,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn base(&self) -> &BaseFields {
        &self.base
    }

    pub fn sections(&self) -> &BTreeMap<FragmentKind, FragmentContent> {
        &self.sections
    }

    pub fn pending(&self) -> &BTreeSet<FragmentKind> {
        &self.pending
    }

    pub fn expected_total(&self) -> usize {
        self.expected_total
    }

    pub fn responses_received(&self) -> usize {
        self.responses_received
    }

    pub fn first_seen_at(&self) -> Instant {
        self.first_seen_at
    }

    /// Number of slots filled with content so far
    pub fn filled(&self) -> usize {
        self.sections.len()
    }

    /// Splits the record into its owned parts
    pub fn into_parts(
        self,
    ) -> (
        EntityId,
        BaseFields,
        BTreeMap<FragmentKind, FragmentContent>,
        BTreeSet<FragmentKind>,
    ) {
        (self.entity_id, self.base, self.sections, self.pending)
    }
}
