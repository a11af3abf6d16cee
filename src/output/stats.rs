//! Statistics generation from the status ledger
//!
//! This module provides functionality for summarizing and displaying
//! harvest progress recorded in the ledger.

use crate::ledger::LedgerData;
use std::collections::{BTreeSet, HashMap};

/// Harvest statistics summary
#[derive(Debug, Clone, Default)]
pub struct LedgerStatistics {
    /// Species with a written record
    pub completed: usize,

    /// Completed species that carry at least a name or a description
    pub with_minimal_data: usize,

    /// Completed species released after a timeout with sections missing
    pub partial: usize,

    /// Species currently recorded as failed
    pub failed: usize,

    /// Failed species eligible for a retry run
    pub retryable: usize,

    /// Failure count per error type
    pub failures_by_type: HashMap<String, usize>,

    /// Distinct species in either section of the ledger
    pub species: usize,
}

impl LedgerStatistics {
    /// Summarizes a ledger snapshot
    pub fn from_ledger(data: &LedgerData) -> Self {
        let mut failures_by_type = HashMap::new();
        for entry in data.failed.values() {
            *failures_by_type.entry(entry.error_type.clone()).or_insert(0) += 1;
        }

        // A failure recorded after a success leaves the id in both maps
        let species = data
            .completed
            .keys()
            .chain(data.failed.keys())
            .collect::<BTreeSet<_>>()
            .len();

        Self {
            completed: data.completed.len(),
            with_minimal_data: data
                .completed
                .values()
                .filter(|entry| entry.has_minimal_data)
                .count(),
            partial: data
                .completed
                .values()
                .filter(|entry| entry.is_partial())
                .count(),
            failed: data.failed.len(),
            retryable: data.failed.values().filter(|entry| entry.retryable).count(),
            failures_by_type,
            species,
        }
    }

    pub fn total(&self) -> usize {
        self.species
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Species recorded: {}", stats.total());
    println!("  Completed: {}", stats.completed);
    println!("    with minimal data: {}", stats.with_minimal_data);
    println!("    partial (timeout): {}", stats.partial);
    println!("  Failed: {}", stats.failed);
    println!("    retryable: {}", stats.retryable);
    println!();

    if !stats.failures_by_type.is_empty() {
        println!("Failures by Type:");
        // Sort by count (descending), then name for stable output
        let mut counts: Vec<_> = stats.failures_by_type.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (error_type, count) in counts {
            println!("  {}: {}", error_type, count);
        }
        println!();
    }

    let success_rate = if stats.total() > 0 {
        (stats.completed as f64 / stats.total() as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} species completed)",
        success_rate,
        stats.completed,
        stats.total()
    );
}
