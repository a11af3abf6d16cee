/// Entity identity and lifecycle states
///
/// This module defines the identifier of a species being assembled and all
/// states it can be in during a run.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one species profile (the site's numeric `id=` parameter)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the output record for this entity
    pub fn record_file_name(&self) -> String {
        format!("species-{}.json", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self::new(id.to_string())
    }
}

/// Represents the current state of an entity within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    // ===== Active States =====
    /// Fragments are being collected
    InProgress,

    // ===== Terminal Success States =====
    /// Every expected fragment arrived, or every expected response did
    Completed,

    /// Emitted after the timeout window with enough (but not all) responses
    PartiallyCompleted,

    // ===== Terminal Error States =====
    /// Discovery failed, data was insufficient, or the run closed first
    Failed,
}

impl EntityStatus {
    /// Returns true if this is a terminal state (no further fragments accepted)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Returns true if a record was emitted for the entity
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyCompleted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
