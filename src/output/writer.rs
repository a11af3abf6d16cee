//! Record writer
//!
//! Persists one finished species profile per file and reports the outcome to
//! the status ledger.

use crate::catalog::{FragmentKind, SectionGroup};
use crate::ledger::{write_atomic, LedgerError, StatusSink};
use crate::output::{OutputError, OutputResult};
use crate::state::{
    error_type, BasicInfo, CollectionMetadata, EntityFailure, EntityId, FinishedRecord,
    FragmentContent, SectionContent, SpecimenImages,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Content placed under one slot of the output document
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SlotContent<'a> {
    Fragment(&'a FragmentContent),
    Section(&'a SectionContent),
}

/// On-disk shape of `species-<id>.json`
#[derive(Debug, Serialize)]
struct SpeciesDocument<'a> {
    species_id: &'a EntityId,
    url: &'a str,
    scraped_at: &'a str,
    basic_info: &'a BasicInfo,
    images: &'a SpecimenImages,
    collection_metadata: &'a CollectionMetadata,
    nomenclature: Option<&'a FragmentContent>,
    description: BTreeMap<&'static str, SlotContent<'a>>,
    ecology: BTreeMap<&'static str, SlotContent<'a>>,
    human_uses: BTreeMap<&'static str, SlotContent<'a>>,
    conservation: BTreeMap<&'static str, SlotContent<'a>>,
}

impl<'a> SpeciesDocument<'a> {
    fn from_record(record: &'a FinishedRecord) -> Self {
        Self {
            species_id: &record.entity_id,
            url: &record.base.url,
            scraped_at: &record.base.scraped_at,
            basic_info: &record.base.basic_info,
            images: &record.base.images,
            collection_metadata: &record.base.collection_metadata,
            nomenclature: record.sections.get(&FragmentKind::Nomenclature),
            description: group_slots(record, SectionGroup::Description),
            ecology: group_slots(record, SectionGroup::Ecology),
            human_uses: group_slots(record, SectionGroup::HumanUses),
            conservation: group_slots(record, SectionGroup::Conservation),
        }
    }
}

/// Slots of one group; the combined ecology/distribution page is split in two
fn group_slots(
    record: &FinishedRecord,
    group: SectionGroup,
) -> BTreeMap<&'static str, SlotContent<'_>> {
    let mut slots = BTreeMap::new();

    for (slot, content) in record.group(group) {
        match content {
            FragmentContent::EcologyDistribution {
                ecology,
                distribution,
            } => {
                if !ecology.is_empty() {
                    slots.insert("ecology", SlotContent::Section(ecology));
                }
                if !distribution.is_empty() {
                    slots.insert("distribution", SlotContent::Section(distribution));
                }
            }
            other => {
                slots.insert(slot, SlotContent::Fragment(other));
            }
        }
    }

    slots
}

/// Result of handing a finished record to the writer
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Written(PathBuf),
    Failed(EntityFailure),
}

/// Writes finished records and reports every outcome to a `StatusSink`
pub struct RecordWriter {
    output_dir: PathBuf,
    sink: Arc<dyn StatusSink>,
}

impl RecordWriter {
    pub fn new(output_dir: impl Into<PathBuf>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sink,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn record_path(&self, id: &EntityId) -> PathBuf {
        self.output_dir.join(id.record_file_name())
    }

    /// Persists the record, then records success in the ledger
    ///
    /// An I/O failure is converted into a retryable `write_error` ledger
    /// failure so the species is picked up again by a retry run.
    pub fn write(&self, record: &FinishedRecord) -> WriteOutcome {
        let id = &record.entity_id;

        match self.persist(record) {
            Ok(path) => {
                tracing::info!(
                    "Species {}: wrote {} ({})",
                    id,
                    path.display(),
                    record.completion.kind.as_str()
                );
                let result =
                    self.sink
                        .record_success(id, record.has_minimal_data(), &record.completion);
                log_ledger_error(id, result);
                WriteOutcome::Written(path)
            }
            Err(e) => {
                tracing::error!("Species {}: failed to write record: {}", id, e);
                let failure = EntityFailure::new(error_type::WRITE_ERROR, e.to_string(), true);
                self.record_failure(id, &failure);
                WriteOutcome::Failed(failure)
            }
        }
    }

    /// Records an entity failure that happened before anything was written
    pub fn record_failure(&self, id: &EntityId, failure: &EntityFailure) {
        tracing::warn!(
            "Species {} failed: {} ({}){}",
            id,
            failure.error_type,
            failure.message,
            if failure.retryable { "" } else { ", not retryable" }
        );
        log_ledger_error(id, self.sink.record_failure(id, failure));
    }

    fn persist(&self, record: &FinishedRecord) -> OutputResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let document = SpeciesDocument::from_record(record);
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| OutputError::Serialize(e.to_string()))?;

        let path = self.record_path(&record.entity_id);
        write_atomic(&path, json.as_bytes())?;
        Ok(path)
    }
}

fn log_ledger_error(id: &EntityId, result: Result<(), LedgerError>) {
    if let Err(e) = result {
        tracing::error!("Species {}: status ledger update failed: {}", id, e);
    }
}
