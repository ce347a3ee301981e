//! Append-only event log with file-based persistence.
//!
//! Events are stored as newline-delimited JSON, one event per line, in write
//! order. The log is shared by all runs and is not indexed: lookups by run
//! scan the whole file.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::domain::{Event, RunId};
use crate::error::{OrchestratorError, Result};

/// Number of events `status` shows by default
pub const DEFAULT_QUERY_LIMIT: usize = 5;

/// File-based event log using JSONL format
#[derive(Debug, Clone)]
pub struct EventLog {
    events_path: PathBuf,
}

impl EventLog {
    /// Open the log at `events_path`, creating its parent directory
    pub async fn open(events_path: impl Into<PathBuf>) -> Result<Self> {
        let events_path = events_path.into();
        if let Some(parent) = events_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(Self { events_path })
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Whether the log file has been created yet
    pub async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(&self.events_path).await?)
    }

    /// Validate and append an event; returns once the write is on disk
    pub async fn append(&self, event: &Event) -> Result<()> {
        event.validate()?;

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let path = self.events_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

            // Concurrent writers from other runs must not interleave bytes
            file.lock_exclusive()?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
            file.sync_data()?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        debug!(event_type = %event.event_type, run_id = ?event.run_id(), "Event appended");
        Ok(())
    }

    /// Scan the log in write order, feeding every parsed event to `visit`.
    ///
    /// With `only_run` set, unreadable lines that don't mention that run are
    /// skipped with a warning; otherwise any unreadable line is an error.
    async fn scan<F>(&self, only_run: Option<&RunId>, mut visit: F) -> Result<()>
    where
        F: FnMut(Event),
    {
        let file = match File::open(&self.events_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => match only_run {
                    Some(run_id) if !mentions_run(&line, run_id) => {
                        warn!(
                            path = %self.events_path.display(),
                            line = line_number,
                            error = %e,
                            "Skipping unreadable event line"
                        );
                        continue;
                    }
                    _ => {
                        return Err(OrchestratorError::Validation(format!(
                            "{}:{}: malformed event: {}",
                            self.events_path.display(),
                            line_number,
                            e
                        )));
                    }
                },
            };
            visit(event);
        }

        Ok(())
    }

    /// Most recent `limit` events referencing `run_id`, oldest first.
    ///
    /// Memory is bounded by `limit`; each call rescans from the start.
    pub async fn query_by_run(&self, run_id: &RunId, limit: usize) -> Result<Vec<Event>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut window: VecDeque<Event> = VecDeque::with_capacity(limit);

        self.scan(Some(run_id), |event| {
            if event.run_id() == Some(run_id.as_str()) {
                if window.len() == limit {
                    window.pop_front();
                }
                window.push_back(event);
            }
        })
        .await?;

        Ok(window.into())
    }

    /// Every event referencing `run_id`, in write order
    pub async fn events_for_run(&self, run_id: &RunId) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.scan(Some(run_id), |event| {
            if event.run_id() == Some(run_id.as_str()) {
                events.push(event);
            }
        })
        .await?;
        Ok(events)
    }

    /// Replay the entire log
    pub async fn replay(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.scan(None, |event| events.push(event)).await?;
        Ok(events)
    }
}

/// Whether a raw line contains `run_id` as a JSON string
fn mentions_run(line: &str, run_id: &RunId) -> bool {
    line.contains(&format!("\"{}\"", run_id))
}
