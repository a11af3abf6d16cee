//! Fragment catalog
//!
//! The closed set of section groups and fragment kinds a species profile is
//! built from.

mod fragment_kind;

pub use fragment_kind::{FragmentKind, SectionGroup, CATALOG};
