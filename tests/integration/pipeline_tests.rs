//! End-to-end tests of the harvest loop
//!
//! These drive the coordinator with an in-memory source so the completion
//! rules, ledger updates and record files can be checked without a network.

use async_trait::async_trait;
use herbarium_harvest::aggregator::CompletionPolicy;
use herbarium_harvest::crawler::{
    build_frontier, Coordinator, Discovery, EntityDiscovery, FailureKind, FetchFailure,
    FragmentFetcher, RunOptions, RunSummary, SpeciesCatalog,
};
use herbarium_harvest::ledger::{LedgerData, StatusLedger};
use herbarium_harvest::output::RecordWriter;
use herbarium_harvest::state::{BaseFields, BasicInfo, EntityId, FragmentContent, SectionContent};
use herbarium_harvest::FragmentKind;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// How a fake fragment page answers
#[derive(Clone)]
enum Reply {
    Content(&'static str),
    Empty,
    Error(FailureKind),
    /// Never answers
    Silent,
}

#[derive(Default)]
struct FakeSource {
    listing: Vec<EntityId>,
    index: HashMap<EntityId, Result<Discovery, FetchFailure>>,
    fragments: HashMap<(EntityId, FragmentKind), Reply>,
}

impl FakeSource {
    fn species(mut self, id: u32, menu: Option<&[(FragmentKind, Reply)]>) -> Self {
        let id = EntityId::from(id);
        let base = BaseFields {
            url: format!("https://herbarium.test/herbarium.php?id={}", id),
            scraped_at: "2026-01-01T00:00:00Z".to_string(),
            basic_info: BasicInfo {
                scientific_name: Some(format!("Species {}", id)),
                ..BasicInfo::default()
            },
            ..BaseFields::default()
        };

        let available = menu.map(|entries| {
            for (kind, reply) in entries {
                self.fragments.insert((id.clone(), *kind), reply.clone());
            }
            entries.iter().map(|(kind, _)| *kind).collect::<BTreeSet<_>>()
        });

        self.listing.push(id.clone());
        self.index.insert(id, Ok(Discovery { base, available }));
        self
    }

    fn broken_species(mut self, id: u32, kind: FailureKind) -> Self {
        let id = EntityId::from(id);
        self.listing.push(id.clone());
        self.index.insert(id, Err(FetchFailure::new(kind, "index page failed")));
        self
    }
}

#[async_trait]
impl EntityDiscovery for FakeSource {
    async fn discover(&self, id: &EntityId) -> Result<Discovery, FetchFailure> {
        self.index
            .get(id)
            .cloned()
            .unwrap_or_else(|| Err(FetchFailure::new(FailureKind::NotFound, "Page not found")))
    }
}

#[async_trait]
impl FragmentFetcher for FakeSource {
    async fn fetch_fragment(
        &self,
        id: &EntityId,
        kind: FragmentKind,
    ) -> Result<FragmentContent, FetchFailure> {
        match self.fragments.get(&(id.clone(), kind)).cloned() {
            Some(Reply::Content(text)) => Ok(FragmentContent::Section(SectionContent {
                text: Some(text.to_string()),
                ..SectionContent::default()
            })),
            Some(Reply::Empty) => Ok(FragmentContent::Section(SectionContent::default())),
            Some(Reply::Error(kind)) => Err(FetchFailure::new(kind, "fragment failed")),
            Some(Reply::Silent) | None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl SpeciesCatalog for FakeSource {
    async fn list_species(&self) -> Result<Vec<EntityId>, FetchFailure> {
        Ok(self.listing.clone())
    }
}

struct Harness {
    _dir: TempDir,
    output_dir: PathBuf,
    ledger: Arc<StatusLedger>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("species");
        let ledger = Arc::new(StatusLedger::load(dir.path().join("_scraping_status.json")));
        Self {
            _dir: dir,
            output_dir,
            ledger,
        }
    }

    fn coordinator(
        &self,
        source: Arc<FakeSource>,
        window: Duration,
        frontier: Vec<EntityId>,
    ) -> Coordinator<FakeSource> {
        let writer = RecordWriter::new(&self.output_dir, self.ledger.clone());
        Coordinator::new(source, CompletionPolicy::new(window, 2, 0.6), writer, frontier)
    }

    fn ledger_data(&self) -> LedgerData {
        // Reload from disk to check what was persisted
        StatusLedger::load(self.ledger.path()).snapshot().unwrap()
    }

    fn record_path(&self, id: u32) -> PathBuf {
        self.output_dir.join(format!("species-{}.json", id))
    }

    fn record(&self, id: u32) -> serde_json::Value {
        let content = std::fs::read_to_string(self.record_path(id)).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

fn ids(values: &[u32]) -> Vec<EntityId> {
    values.iter().map(|v| EntityId::from(*v)).collect()
}

#[tokio::test]
async fn test_partial_completion_after_timeout() {
    let harness = Harness::new();
    let source = FakeSource::default().species(
        1,
        Some(&[
            (FragmentKind::Leaf, Reply::Content("Leaves pinnate")),
            (FragmentKind::Flower, Reply::Content("Flowers yellow")),
            (FragmentKind::Fruit, Reply::Silent),
        ]),
    );

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_millis(200), ids(&[1]))
        .run()
        .await;

    assert_eq!(
        summary,
        RunSummary {
            processed: 1,
            completed: 1,
            partial: 1,
            failed: 0
        }
    );

    let data = harness.ledger_data();
    let entry = &data.completed["1"];
    assert_eq!(entry.completion.as_deref(), Some("partial_timeout"));
    assert_eq!(
        entry.missing_sections,
        Some(vec!["description.fruit".to_string()])
    );
    assert_eq!(entry.responses_received, Some(2));
    assert_eq!(entry.responses_expected, Some(3));
    assert!(data.failed.is_empty());

    let record = harness.record(1);
    assert_eq!(record["description"]["leaf"]["text"], "Leaves pinnate");
    assert_eq!(record["description"]["flower"]["text"], "Flowers yellow");
    assert!(record["description"].get("fruit").is_none());
}

#[tokio::test]
async fn test_timeout_with_no_responses_fails() {
    let harness = Harness::new();
    let source = FakeSource::default().species(
        2,
        Some(&[
            (FragmentKind::Leaf, Reply::Silent),
            (FragmentKind::Flower, Reply::Silent),
            (FragmentKind::Fruit, Reply::Silent),
        ]),
    );

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_millis(150), ids(&[2]))
        .run()
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 0);

    let data = harness.ledger_data();
    let entry = &data.failed["2"];
    assert_eq!(entry.error_type, "timeout_insufficient_data");
    assert!(entry.retryable);
    assert_eq!(entry.responses_received, Some(0));
    assert!(!harness.record_path(2).exists());
}

#[tokio::test]
async fn test_all_responses_complete_without_waiting() {
    let harness = Harness::new();
    let source = FakeSource::default().species(
        3,
        Some(&[
            (FragmentKind::Leaf, Reply::Content("Leaves simple")),
            (FragmentKind::Flower, Reply::Content("Flowers white")),
            (FragmentKind::Fruit, Reply::Empty),
        ]),
    );

    let start = Instant::now();
    let summary = harness
        .coordinator(Arc::new(source), Duration::from_secs(30), ids(&[3]))
        .run()
        .await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.partial, 0);

    let data = harness.ledger_data();
    let entry = &data.completed["3"];
    assert_eq!(entry.completion.as_deref(), Some("all_responses"));
    assert_eq!(
        entry.missing_sections,
        Some(vec!["description.fruit".to_string()])
    );
    assert!(harness.record_path(3).exists());
}

#[tokio::test]
async fn test_failed_fragment_counts_as_response() {
    let harness = Harness::new();
    let source = FakeSource::default().species(
        4,
        Some(&[
            (FragmentKind::Nomenclature, Reply::Error(FailureKind::NotFound)),
            (FragmentKind::Habit, Reply::Content("Tree to 10 m")),
        ]),
    );

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_secs(30), ids(&[4]))
        .run()
        .await;

    assert_eq!(summary.completed, 1);
    let data = harness.ledger_data();
    assert_eq!(data.completed["4"].completion.as_deref(), Some("all_responses"));
}

#[tokio::test]
async fn test_empty_menu_completes_with_base_fields_only() {
    let harness = Harness::new();
    let source = FakeSource::default().species(5, Some(&[]));

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_secs(30), ids(&[5]))
        .run()
        .await;

    assert_eq!(summary.completed, 1);
    let data = harness.ledger_data();
    let entry = &data.completed["5"];
    assert_eq!(entry.completion.as_deref(), Some("complete"));
    assert!(entry.has_minimal_data);

    let record = harness.record(5);
    assert_eq!(record["species_id"], "5");
    assert_eq!(record["basic_info"]["scientific_name"], "Species 5");
    assert!(record["description"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_discovery_failure_does_not_stop_run() {
    let harness = Harness::new();
    let source = FakeSource::default()
        .broken_species(6, FailureKind::NotFound)
        .species(7, Some(&[(FragmentKind::Leaf, Reply::Content("Leaves"))]));

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_secs(30), ids(&[6, 7]))
        .run()
        .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);

    let data = harness.ledger_data();
    assert_eq!(data.failed["6"].error_type, "404_permanent");
    assert!(!data.failed["6"].retryable);
    assert!(data.completed.contains_key("7"));
}

#[tokio::test]
async fn test_every_processed_species_is_recorded() {
    let harness = Harness::new();
    let source = FakeSource::default()
        .species(10, Some(&[(FragmentKind::Leaf, Reply::Content("Leaves"))]))
        .broken_species(11, FailureKind::ServerError)
        .species(
            12,
            Some(&[
                (FragmentKind::Seed, Reply::Silent),
                (FragmentKind::Fruit, Reply::Silent),
            ]),
        )
        .species(13, Some(&[]));

    let summary = harness
        .coordinator(
            Arc::new(source),
            Duration::from_millis(150),
            ids(&[10, 11, 12, 13]),
        )
        .run()
        .await;

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.completed + summary.failed, summary.processed);

    let data = harness.ledger_data();
    assert_eq!(data.completed.len() + data.failed.len(), 4);
    assert_eq!(data.failed["11"].error_type, "server_error");
    assert!(data.failed["11"].retryable);
    assert_eq!(data.failed["12"].error_type, "timeout_insufficient_data");
}

#[tokio::test]
async fn test_repeated_id_is_not_counted_twice() {
    let harness = Harness::new();
    let source = FakeSource::default()
        .species(20, Some(&[(FragmentKind::Leaf, Reply::Content("Leaves"))]))
        .broken_species(21, FailureKind::NotFound);

    let summary = harness
        .coordinator(
            Arc::new(source),
            Duration::from_millis(150),
            ids(&[20, 21, 20, 21]),
        )
        .run()
        .await;

    assert_eq!(
        summary,
        RunSummary {
            processed: 2,
            completed: 1,
            partial: 0,
            failed: 1
        }
    );

    let data = harness.ledger_data();
    assert!(data.completed.contains_key("20"));
    assert!(!data.failed.contains_key("20"));
    assert_eq!(data.failed["21"].error_type, "404_permanent");
}

#[tokio::test]
async fn test_write_error_is_retryable_failure() {
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("species");
    std::fs::write(&blocked, "not a directory").unwrap();
    let ledger = Arc::new(StatusLedger::load(dir.path().join("status.json")));

    let source = FakeSource::default().species(20, Some(&[]));
    let writer = RecordWriter::new(&blocked, ledger.clone());
    let coordinator = Coordinator::new(
        Arc::new(source),
        CompletionPolicy::default(),
        writer,
        ids(&[20]),
    );

    let summary = coordinator.run().await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 0);

    let data = ledger.snapshot().unwrap();
    assert_eq!(data.failed["20"].error_type, "write_error");
    assert!(data.failed["20"].retryable);
}

#[tokio::test]
async fn test_shutdown_records_in_flight_species() {
    let harness = Harness::new();
    let source = FakeSource::default()
        .species(30, Some(&[(FragmentKind::Leaf, Reply::Silent)]))
        .species(31, Some(&[]));

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_secs(60), ids(&[30, 31]))
        .run_until(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let data = harness.ledger_data();
    let entry = &data.failed["30"];
    assert_eq!(entry.error_type, "incomplete_on_close");
    assert!(entry.retryable);
    assert_eq!(
        entry.missing_sections,
        Some(vec!["description.leaf".to_string()])
    );
    assert!(!data.completed.contains_key("31"));
    assert!(!data.failed.contains_key("31"));
}

#[tokio::test]
async fn test_resume_and_retry_after_a_run() {
    let harness = Harness::new();
    let source = Arc::new(
        FakeSource::default()
            .species(40, Some(&[(FragmentKind::Leaf, Reply::Content("Leaves"))]))
            .broken_species(41, FailureKind::ServerError)
            .broken_species(42, FailureKind::Gone),
    );

    harness
        .coordinator(source.clone(), Duration::from_secs(30), ids(&[40, 41, 42]))
        .run()
        .await;

    let resume = RunOptions {
        resume: true,
        ..RunOptions::default()
    };
    let frontier = build_frontier(source.as_ref(), &harness.ledger, &resume)
        .await
        .unwrap();
    assert_eq!(frontier, ids(&[41, 42]));

    let retry = RunOptions {
        retry_failed: true,
        ..RunOptions::default()
    };
    let frontier = build_frontier(source.as_ref(), &harness.ledger, &retry)
        .await
        .unwrap();
    assert_eq!(frontier, ids(&[41]));
}

#[tokio::test]
async fn test_missing_menu_expects_full_catalog() {
    let harness = Harness::new();
    let source = FakeSource::default().species(50, None);

    let summary = harness
        .coordinator(Arc::new(source), Duration::from_millis(150), ids(&[50]))
        .run()
        .await;

    assert_eq!(summary.failed, 1);
    let data = harness.ledger_data();
    let entry = &data.failed["50"];
    assert_eq!(entry.error_type, "timeout_insufficient_data");
    assert_eq!(entry.responses_expected, Some(FragmentKind::all().len()));
}
