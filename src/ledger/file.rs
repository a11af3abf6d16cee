//! File-backed status ledger
//!
//! The whole ledger is rewritten on every mutation through a temp file and a
//! rename, so readers never observe a half-written document.

use crate::ledger::traits::{LedgerError, LedgerResult, StatusSink};
use crate::ledger::{CompletedEntry, FailedEntry, LedgerData};
use crate::state::{Completion, EntityFailure, EntityId};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Durable map of species id to completed / failed status
pub struct StatusLedger {
    path: PathBuf,
    data: Mutex<LedgerData>,
}

impl StatusLedger {
    /// Loads the ledger at `path`
    ///
    /// A missing file yields an empty ledger. An unreadable or corrupt file is
    /// logged and also treated as empty; it is overwritten by the first mutation.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let data = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<LedgerData>(&content) {
                Ok(data) => {
                    tracing::info!(
                        "Loaded status ledger {}: {} completed, {} failed",
                        path.display(),
                        data.completed.len(),
                        data.failed.len()
                    );
                    data
                }
                Err(e) => {
                    tracing::warn!(
                        "Status ledger {} is corrupt, starting empty: {}",
                        path.display(),
                        e
                    );
                    LedgerData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No status ledger at {}, starting empty", path.display());
                LedgerData::default()
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read status ledger {}, starting empty: {}",
                    path.display(),
                    e
                );
                LedgerData::default()
            }
        };

        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current ledger contents
    pub fn snapshot(&self) -> LedgerResult<LedgerData> {
        Ok(self.lock()?.clone())
    }

    pub fn is_completed(&self, id: &EntityId) -> LedgerResult<bool> {
        Ok(self.lock()?.completed.contains_key(id.as_str()))
    }

    pub fn failure(&self, id: &EntityId) -> LedgerResult<Option<FailedEntry>> {
        Ok(self.lock()?.failed.get(id.as_str()).cloned())
    }

    /// Candidates minus ids already recorded as successful
    pub fn filter_for_resume(&self, candidates: &[EntityId]) -> LedgerResult<Vec<EntityId>> {
        let data = self.lock()?;
        Ok(candidates
            .iter()
            .filter(|id| !data.completed.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    /// Candidates recorded as failed and marked retryable
    pub fn filter_for_retry(&self, candidates: &[EntityId]) -> LedgerResult<Vec<EntityId>> {
        let data = self.lock()?;
        Ok(candidates
            .iter()
            .filter(|id| {
                data.failed
                    .get(id.as_str())
                    .map(|entry| entry.retryable)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    /// Ids of every retryable failure, in key order
    pub fn retryable_failures(&self) -> LedgerResult<Vec<EntityId>> {
        let data = self.lock()?;
        Ok(data
            .failed
            .iter()
            .filter(|(_, entry)| entry.retryable)
            .map(|(id, _)| EntityId::new(id.clone()))
            .collect())
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, LedgerData>> {
        self.data.lock().map_err(|_| LedgerError::Poisoned)
    }

    fn persist(&self, data: &LedgerData) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    /// Applies `mutate` to a copy of the ledger and keeps it only once written
    fn commit<F>(&self, mutate: F) -> LedgerResult<()>
    where
        F: FnOnce(&mut LedgerData),
    {
        let mut data = self.lock()?;

        let mut staged = data.clone();
        mutate(&mut staged);
        self.persist(&staged)?;

        *data = staged;
        Ok(())
    }
}

impl StatusSink for StatusLedger {
    fn record_success(
        &self,
        id: &EntityId,
        has_minimal_data: bool,
        completion: &Completion,
    ) -> LedgerResult<()> {
        let entry = CompletedEntry::new(Utc::now().to_rfc3339(), has_minimal_data, completion);

        self.commit(|data| {
            data.completed.insert(id.to_string(), entry);
            if data.failed.remove(id.as_str()).is_some() {
                tracing::debug!("Species {}: success supersedes earlier failure", id);
            }
        })
    }

    fn record_failure(&self, id: &EntityId, failure: &EntityFailure) -> LedgerResult<()> {
        let entry = FailedEntry::new(Utc::now().to_rfc3339(), failure);

        self.commit(|data| {
            if data.completed.contains_key(id.as_str()) {
                tracing::warn!(
                    "Species {}: recording {} failure for an id already marked successful",
                    id,
                    failure.error_type
                );
            }
            data.failed.insert(id.to_string(), entry);
        })
    }
}

/// Writes `bytes` to a sibling temp file, then renames it over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, bytes)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
