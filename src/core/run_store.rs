//! File-backed run record store.
//!
//! One pretty-printed JSON file per run under the runs directory. Every `put`
//! writes the full record to a temporary sibling and renames it into place, so
//! readers only ever see complete records.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tokio::fs;
use tracing::debug;

use crate::domain::{RunId, RunRecord};
use crate::error::{OrchestratorError, Result};

/// Key-value store of run records keyed by run id
pub struct RunStore {
    runs_dir: PathBuf,
}

impl RunStore {
    /// Open the store, creating the runs directory if needed
    pub async fn open(runs_dir: impl Into<PathBuf>) -> Result<Self> {
        let runs_dir = runs_dir.into();
        fs::create_dir_all(&runs_dir).await?;
        Ok(Self { runs_dir })
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    fn record_path(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir.join(format!("{}.json", run_id))
    }

    /// Persist the full record, stamping `updated_at`
    pub async fn put(&self, record: &mut RunRecord) -> Result<()> {
        if !record.run_id.is_storage_safe() {
            return Err(OrchestratorError::Validation(format!(
                "run id {:?} cannot be stored",
                record.run_id.as_str()
            )));
        }

        record.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(record)?;

        let path = self.record_path(&record.run_id);
        let tmp_path = self.runs_dir.join(format!(".{}.json.tmp", record.run_id));
        fs::write(&tmp_path, json.as_bytes()).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!(run_id = %record.run_id, status = %record.status, "Run record written");
        Ok(())
    }

    /// Load the current record, or NotFound
    pub async fn get(&self, run_id: &RunId) -> Result<RunRecord> {
        if !run_id.is_storage_safe() {
            return Err(OrchestratorError::NotFound(run_id.to_string()));
        }

        let path = self.record_path(run_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OrchestratorError::NotFound(run_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&content)?)
    }

    /// Whether a record exists for `run_id`
    pub async fn exists(&self, run_id: &RunId) -> Result<bool> {
        if !run_id.is_storage_safe() {
            return Ok(false);
        }
        Ok(fs::try_exists(self.record_path(run_id)).await?)
    }

    /// List ids of all stored runs
    pub async fn list(&self) -> Result<Vec<RunId>> {
        let mut runs = Vec::new();
        let mut entries = fs::read_dir(&self.runs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(".json") {
                    if !id.starts_with('.') {
                        runs.push(RunId::new(id));
                    }
                }
            }
        }

        runs.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(runs)
    }

    /// Acquire the exclusive per-run lock.
    ///
    /// Held across a load-mutate-persist cycle so two commands against the
    /// same run serialize instead of silently overwriting each other.
    pub async fn lock(&self, run_id: &RunId) -> Result<RunLock> {
        if !run_id.is_storage_safe() {
            return Err(OrchestratorError::NotFound(run_id.to_string()));
        }

        let lock_path = self.runs_dir.join(format!("{}.lock", run_id));
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        debug!(%run_id, "Run lock acquired");
        Ok(RunLock { _file: file })
    }
}

/// Exclusive lock on one run; released on drop
pub struct RunLock {
    _file: File,
}
