//! Harvest coordinator - main run loop
//!
//! Walks the frontier one species at a time:
//! - Fetches the index page and begins the species in the aggregator
//! - Fans out one fetch per pending fragment kind
//! - Feeds responses (and the timeout deadline) back into the aggregator
//! - Hands terminal outcomes to the record writer and status ledger
//! - Advances to the next species once the current one is terminal
//!
//! The coordinator task is the only writer to the aggregator; fragment fetches
//! run as spawned tasks and report back through a `JoinSet`.

use crate::aggregator::{ApplyOutcome, CompletionPolicy, EntityAggregator};
use crate::catalog::FragmentKind;
use crate::crawler::scheduler::Scheduler;
use crate::crawler::source::{EntityDiscovery, FetchFailure, FragmentFetcher};
use crate::output::{RecordWriter, WriteOutcome};
use crate::state::{error_type, EntityFailure, EntityId, FragmentContent};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Extra wait before re-polling when the deadline fires a hair early
const DEADLINE_GRACE: Duration = Duration::from_millis(10);

/// Counters for one run
///
/// `completed` includes partial completions, so
/// `completed + failed == processed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub completed: usize,
    pub partial: usize,
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} completed ({} partial), {} failed",
            self.processed, self.completed, self.partial, self.failed
        )
    }
}

/// Main harvest coordinator
pub struct Coordinator<S> {
    source: Arc<S>,
    aggregator: EntityAggregator,
    writer: RecordWriter,
    scheduler: Scheduler,
    summary: RunSummary,
}

impl<S> Coordinator<S>
where
    S: EntityDiscovery + FragmentFetcher + 'static,
{
    pub fn new(
        source: Arc<S>,
        policy: CompletionPolicy,
        writer: RecordWriter,
        frontier: Vec<EntityId>,
    ) -> Self {
        Self {
            source,
            aggregator: EntityAggregator::new(policy),
            writer,
            scheduler: Scheduler::new(frontier),
            summary: RunSummary::default(),
        }
    }

    /// Runs until the frontier is drained
    pub async fn run(self) -> RunSummary {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until the frontier is drained or `shutdown` resolves
    ///
    /// On shutdown the species in flight is recorded as a retryable
    /// `incomplete_on_close` failure before returning.
    pub async fn run_until<F>(mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let total = self.scheduler.frontier_size();
        let start_time = Instant::now();
        tracing::info!("Starting harvest of {} species", total);

        let mut interrupted_at = None;
        let mut next = self.scheduler.start();

        while let Some(id) = next {
            self.summary.processed += 1;
            tracing::info!("Species {} ({}/{})", id, self.summary.processed, total);

            let settled = tokio::select! {
                recorded = self.process_entity(&id) => Some(recorded),
                _ = &mut shutdown => None,
            };

            let Some(recorded) = settled else {
                tracing::warn!("Shutdown requested, stopping after species {}", id);
                self.scheduler.drain();
                interrupted_at = Some(id);
                break;
            };

            if !recorded {
                self.summary.processed -= 1;
            } else if self.summary.processed % 10 == 0 {
                let elapsed = start_time.elapsed();
                tracing::info!(
                    "Progress: {}, {} remaining, {:.2} species/min",
                    self.summary,
                    self.scheduler.remaining(),
                    self.summary.processed as f64 / elapsed.as_secs_f64().max(1.0) * 60.0
                );
            }

            next = self.scheduler.advance();
        }

        self.close(interrupted_at.as_ref());

        tracing::info!(
            "Harvest finished in {:.1}s: {}",
            start_time.elapsed().as_secs_f64(),
            self.summary
        );
        self.summary
    }

    /// Drives one species to a terminal outcome
    ///
    /// Returns false when nothing was recorded because the id was already
    /// settled earlier in this run.
    async fn process_entity(&mut self, id: &EntityId) -> bool {
        let discovery = match self.source.discover(id).await {
            Ok(discovery) => discovery,
            Err(failure) => {
                tracing::warn!("Species {}: index page failed: {}", id, failure);
                let failure = failure.into_entity_failure();
                return match self.aggregator.abandon(id, failure) {
                    Some(failure) => {
                        self.writer.record_failure(id, &failure);
                        self.summary.failed += 1;
                        true
                    }
                    None => {
                        tracing::warn!("Species {}: already settled in this run, skipping", id);
                        false
                    }
                };
            }
        };

        if !self
            .aggregator
            .begin_entity(id.clone(), discovery.base, discovery.available)
        {
            tracing::warn!("Species {}: already settled in this run, skipping", id);
            return false;
        }

        let mut deadline = Instant::now() + self.aggregator.policy().timeout_window();

        // An empty menu completes immediately
        let outcome = self.aggregator.poll(id, Instant::now());
        if let Some(recorded) = self.handle_outcome(id, outcome) {
            return recorded;
        }

        let kinds: Vec<FragmentKind> = self
            .aggregator
            .pending(id)
            .map(|pending| pending.iter().copied().collect())
            .unwrap_or_default();

        let mut fetches = JoinSet::new();
        for kind in kinds {
            let source = Arc::clone(&self.source);
            let id = id.clone();
            fetches.spawn(async move {
                let result = source.fetch_fragment(&id, kind).await;
                (kind, result)
            });
        }
        self.scheduler.begin_waiting();

        let recorded = loop {
            let outcome = tokio::select! {
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    match joined {
                        Ok((kind, result)) => {
                            let content = fragment_content(id, kind, result);
                            self.aggregator.apply_fragment(id, kind, content)
                        }
                        Err(e) => {
                            tracing::error!("Species {}: fragment task failed: {}", id, e);
                            continue;
                        }
                    }
                }
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    self.aggregator.poll(id, Instant::now())
                }
            };

            if let Some(recorded) = self.handle_outcome(id, outcome) {
                break recorded;
            }

            let now = Instant::now();
            if now >= deadline {
                deadline = now + DEADLINE_GRACE;
            }
        };

        if !fetches.is_empty() {
            tracing::debug!(
                "Species {}: abandoning {} late fragment fetches",
                id,
                fetches.len()
            );
        }

        recorded
    }

    /// Routes an aggregator outcome
    ///
    /// `None` while the species is still waiting, otherwise whether a terminal
    /// outcome was recorded for it.
    fn handle_outcome(&mut self, id: &EntityId, outcome: ApplyOutcome) -> Option<bool> {
        match outcome {
            ApplyOutcome::StillWaiting => None,
            ApplyOutcome::Emit(record) => {
                match self.writer.write(&record) {
                    WriteOutcome::Written(_) => {
                        self.summary.completed += 1;
                        if record.completion.kind.is_partial() {
                            self.summary.partial += 1;
                        }
                    }
                    WriteOutcome::Failed(_) => self.summary.failed += 1,
                }
                Some(true)
            }
            ApplyOutcome::Failed(failure) => {
                self.writer.record_failure(id, &failure);
                self.summary.failed += 1;
                Some(true)
            }
            ApplyOutcome::Rejected(reason) => {
                tracing::warn!("Species {}: {}", id, reason);
                Some(false)
            }
        }
    }

    /// Records every species still in flight as a retryable failure
    fn close(&mut self, current: Option<&EntityId>) {
        // Interrupted while revisiting an id settled earlier in this run
        if let Some(id) = current {
            if matches!(self.aggregator.status(id), Some(status) if status.is_terminal()) {
                self.summary.processed -= 1;
            }
        }

        let mut failures = self.aggregator.drain_incomplete();

        // Interrupted before its index page came back
        if let Some(id) = current {
            if self.aggregator.status(id).is_none() {
                let failure = EntityFailure::new(
                    error_type::INCOMPLETE_ON_CLOSE,
                    "Run closed before discovery finished",
                    true,
                );
                if let Some(failure) = self.aggregator.abandon(id, failure) {
                    failures.push((id.clone(), failure));
                }
            }
        }

        for (id, failure) in failures {
            self.writer.record_failure(&id, &failure);
            self.summary.failed += 1;
        }
    }
}

/// Turns a fetch result into aggregator input; failures still count as responses
fn fragment_content(
    id: &EntityId,
    kind: FragmentKind,
    result: Result<FragmentContent, FetchFailure>,
) -> Option<FragmentContent> {
    match result {
        Ok(content) if content.is_empty() => {
            tracing::debug!("Species {}: {} is empty", id, kind);
            None
        }
        Ok(content) => Some(content),
        Err(failure) => {
            tracing::debug!("Species {}: {} failed: {}", id, kind, failure);
            None
        }
    }
}
