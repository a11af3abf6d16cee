//! State module for tracking species assembly
//!
//! # Components
//!
//! - `EntityId` / `EntityStatus`: identity and lifecycle of a species within a run
//! - `BaseFields`, `FragmentContent`: structured data captured from the site
//! - `AggregationRecord`: per-entity buffer of fragments awaiting a completion decision
//! - `FinishedRecord` / `EntityFailure`: terminal outcomes

mod aggregation;
mod entity_state;
mod outcome;
mod record;

// Re-export main types
pub use aggregation::AggregationRecord;
pub use entity_state::{EntityId, EntityStatus};
pub use outcome::{
    error_type, Completion, CompletionKind, EntityFailure, FailureDiagnostics, FinishedRecord,
};
pub use record::{
    BaseFields, BasicInfo, CaptionedImage, CollectionMetadata, FragmentContent, GpsCoordinates,
    Nomenclature, SectionContent, SpecimenImages,
};
