//! Crawler module for species harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Collaborator traits between the run loop and the site
//! - HTTP fetching with politeness delay and retry logic
//! - HTML parsing of index, listing and fragment pages
//! - Frontier building and sequential scheduling
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod parser;
mod politeness;
mod scheduler;
mod source;

pub use coordinator::{Coordinator, RunSummary};
pub use fetcher::{build_http_client, HerbariumClient};
pub use parser::{parse_fragment, parse_index_page, parse_species_links};
pub use politeness::PolitenessGate;
pub use scheduler::{ControllerState, Scheduler};
pub use source::{
    Discovery, EntityDiscovery, FailureKind, FetchFailure, FragmentFetcher, SpeciesCatalog,
};

use crate::ledger::StatusLedger;
use crate::state::EntityId;
use crate::HarvestError;
use std::collections::HashSet;

/// How a run chooses its frontier
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Harvest only this species; listing and ledger filters are skipped
    pub species_id: Option<EntityId>,
    /// Skip species the ledger records as successful
    pub resume: bool,
    /// Keep only species the ledger records as retryable failures
    pub retry_failed: bool,
    /// Cap on the frontier length
    pub max_species: Option<usize>,
}

/// Builds the ordered frontier for a run
///
/// The full listing is filtered by resume, then by retry-failed (both apply
/// when combined), de-duplicated in listing order, then capped.
pub async fn build_frontier<C>(
    catalog: &C,
    ledger: &StatusLedger,
    options: &RunOptions,
) -> Result<Vec<EntityId>, HarvestError>
where
    C: SpeciesCatalog + ?Sized,
{
    if let Some(id) = &options.species_id {
        tracing::info!("Single species mode: {}", id);
        return Ok(vec![id.clone()]);
    }

    let mut frontier = catalog.list_species().await?;
    tracing::info!("Species listing: {} entries", frontier.len());

    if options.resume {
        let before = frontier.len();
        frontier = ledger.filter_for_resume(&frontier)?;
        tracing::info!(
            "Resume: skipping {} completed species, {} left",
            before - frontier.len(),
            frontier.len()
        );
    }

    if options.retry_failed {
        frontier = ledger.filter_for_retry(&frontier)?;
        tracing::info!("Retry: {} species with retryable failures", frontier.len());
    }

    let mut seen = HashSet::new();
    frontier.retain(|id| seen.insert(id.clone()));

    if let Some(max) = options.max_species {
        if frontier.len() > max {
            tracing::info!("Capping frontier at {} species", max);
            frontier.truncate(max);
        }
    }

    Ok(frontier)
}
