//! Collaborator interfaces between the harvest loop and the site
//!
//! The coordinator only talks to the network through these traits, so tests
//! can drive it with in-memory sources.

use crate::catalog::FragmentKind;
use crate::state::{BaseFields, EntityFailure, EntityId, FragmentContent};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;

/// Classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// HTTP 404
    NotFound,
    /// HTTP 403
    Forbidden,
    /// HTTP 410
    Gone,
    /// HTTP 5xx
    ServerError,
    /// HTTP 429
    RateLimited,
    /// Connection, timeout or body read error
    NetworkError,
    /// The page came back too small to be a real page
    EmptyResponse,
}

impl FailureKind {
    /// Ledger `error_type` for this failure
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound => "404_permanent",
            Self::Forbidden => "403_permanent",
            Self::Gone => "410_permanent",
            Self::ServerError => "server_error",
            Self::RateLimited => "rate_limit",
            Self::NetworkError => "network_error",
            Self::EmptyResponse => "empty_response",
        }
    }

    /// Permanent failures are skipped by retry runs
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound | Self::Forbidden | Self::Gone)
    }

    /// Classifies an HTTP status; None for statuses that are not failures
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            404 => Some(Self::NotFound),
            403 => Some(Self::Forbidden),
            410 => Some(Self::Gone),
            429 => Some(Self::RateLimited),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// A typed fetch failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn error_type(&self) -> &'static str {
        self.kind.error_type()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Converts into an entity-level failure for the ledger
    pub fn into_entity_failure(self) -> EntityFailure {
        EntityFailure::new(self.kind.error_type(), self.message, self.kind.is_retryable())
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.error_type(), self.message)
    }
}

impl std::error::Error for FetchFailure {}

/// What the species index page tells us before any fragment is fetched
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub base: BaseFields,
    /// Fragment kinds advertised by the side menu; None when there is no menu
    pub available: Option<BTreeSet<FragmentKind>>,
}

/// Fetches a species index page
#[async_trait]
pub trait EntityDiscovery: Send + Sync {
    async fn discover(&self, id: &EntityId) -> Result<Discovery, FetchFailure>;
}

/// Fetches one fragment page of a species
#[async_trait]
pub trait FragmentFetcher: Send + Sync {
    async fn fetch_fragment(
        &self,
        id: &EntityId,
        kind: FragmentKind,
    ) -> Result<FragmentContent, FetchFailure>;
}

/// Lists every species the site publishes, in site order
#[async_trait]
pub trait SpeciesCatalog: Send + Sync {
    async fn list_species(&self) -> Result<Vec<EntityId>, FetchFailure>;
}
