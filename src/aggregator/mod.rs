//! Fragment aggregation
//!
//! - `CompletionPolicy`: decides when an entity is done (pure)
//! - `EntityAggregator`: buffers fragments per entity and applies the policy

mod aggregator;
mod policy;

pub use aggregator::{ApplyOutcome, EntityAggregator, RejectReason};
pub use policy::{CompletionPolicy, Decision};
