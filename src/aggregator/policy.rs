//! Completion policy
//!
//! Pure decision function over an `AggregationRecord` and the current time.

use crate::config::AggregationConfig;
use crate::state::AggregationRecord;
use std::time::{Duration, Instant};

/// Result of evaluating the policy for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep buffering
    Waiting,
    /// No slot is pending
    Complete,
    /// Every expected response arrived, some without content
    CompleteAllResponses,
    /// Timed out with enough responses
    CompletePartial,
    /// Timed out without enough responses
    Failed,
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

/// Decides when an entity has collected enough to be released
///
/// Rules, in precedence order:
///
/// | Condition | Decision |
/// |-----------|----------|
/// | no slot pending | Complete |
/// | responses >= expected | CompleteAllResponses |
/// | timed out, responses >= threshold | CompletePartial |
/// | timed out, responses < threshold | Failed |
/// | otherwise | Waiting |
///
/// where threshold = max(min_responses, floor(min_fraction * expected)).
#[derive(Debug, Clone)]
pub struct CompletionPolicy {
    timeout_window: Duration,
    min_responses: usize,
    min_fraction: f64,
}

impl CompletionPolicy {
    pub fn new(timeout_window: Duration, min_responses: usize, min_fraction: f64) -> Self {
        Self {
            timeout_window,
            min_responses,
            min_fraction,
        }
    }

    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(
            config.timeout_window(),
            config.min_responses,
            config.min_fraction,
        )
    }

    pub fn timeout_window(&self) -> Duration {
        self.timeout_window
    }

    /// Minimum responses for a partial completion of an entity expecting `expected`
    pub fn response_threshold(&self, expected: usize) -> usize {
        let fractional = (expected as f64 * self.min_fraction).floor() as usize;
        self.min_responses.max(fractional)
    }

    /// Returns true once the timeout window has passed for the record
    pub fn timed_out(&self, record: &AggregationRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.first_seen_at()) > self.timeout_window
    }

    pub fn evaluate(&self, record: &AggregationRecord, now: Instant) -> Decision {
        if record.pending().is_empty() {
            return Decision::Complete;
        }

        if record.responses_received() >= record.expected_total() {
            return Decision::CompleteAllResponses;
        }

        if self.timed_out(record, now) {
            if record.responses_received() >= self.response_threshold(record.expected_total()) {
                return Decision::CompletePartial;
            }
            return Decision::Failed;
        }

        Decision::Waiting
    }
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self::from_config(&AggregationConfig::default())
    }
}
