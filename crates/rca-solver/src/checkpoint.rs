//! Checkpoint Store: durable resume state.
//!
//! ```text
//! progress.json
//!   processed_ids  : finalized case ids (only grows)
//!   results        : submission rows of finalized cases, in finalization order
//!   oracle_cache   : case id → accepted / failed oracle outcome
//! ```
//!
//! Load policy: an absent or blank file is a fresh start; anything present
//! that does not parse stops the run. Saves go through a temp file and a
//! rename so a crash never leaves a half-written checkpoint behind.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregator::SolveStats;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path} is corrupt; move it aside to start fresh: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One submission row. Each case expands to four of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "ID")]
    pub id: String,
    pub combined: String,
    pub rule_based: String,
    pub ai_based: String,
}

/// Terminal result of one escalation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OracleOutcome {
    Accepted { answer: String, attempts: u32 },
    Failed { attempts: u32, last_error: String },
}

impl OracleOutcome {
    pub fn accepted_answer(&self) -> Option<&str> {
        match self {
            Self::Accepted { answer, .. } => Some(answer),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub processed_ids: BTreeSet<String>,
    #[serde(default)]
    pub results: Vec<OutputRow>,
    #[serde(default)]
    pub oracle_cache: BTreeMap<String, OracleOutcome>,
}

impl Checkpoint {
    /// Nothing finalized and nothing cached.
    pub fn is_fresh(&self) -> bool {
        self.processed_ids.is_empty() && self.oracle_cache.is_empty()
    }

    pub fn is_processed(&self, case_id: &str) -> bool {
        self.processed_ids.contains(case_id)
    }

    pub fn accepted_answer(&self, case_id: &str) -> Option<&str> {
        self.oracle_cache
            .get(case_id)
            .and_then(OracleOutcome::accepted_answer)
    }

    /// Record an oracle outcome. An accepted answer is never downgraded.
    pub fn record_outcome(&mut self, case_id: &str, outcome: OracleOutcome) {
        if self.accepted_answer(case_id).is_some() && matches!(outcome, OracleOutcome::Failed { .. }) {
            return;
        }
        self.oracle_cache.insert(case_id.to_string(), outcome);
    }

    /// Append a case's rows and mark it processed. Returns `false` (and
    /// changes nothing) if the case was already finalized.
    pub fn finalize(&mut self, case_id: &str, rows: Vec<OutputRow>) -> bool {
        if !self.processed_ids.insert(case_id.to_string()) {
            return false;
        }
        self.results.extend(rows);
        true
    }
}

/// File-backed checkpoint persistence.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint, starting fresh");
                return Ok(Checkpoint::default());
            }
            Err(e) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(Checkpoint::default());
        }

        let checkpoint: Checkpoint =
            serde_json::from_str(&raw).map_err(|e| CheckpointError::Corrupt {
                path: self.path.clone(),
                source: e,
            })?;
        info!(
            processed = checkpoint.processed_ids.len(),
            cached = checkpoint.oracle_cache.len(),
            "Loaded checkpoint"
        );
        Ok(checkpoint)
    }

    /// Write via `<path>.tmp` and rename over the target.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(checkpoint)?;
        let tmp = self.tmp_path();
        let write_err = |e| CheckpointError::Write {
            path: self.path.clone(),
            source: e,
        };
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Checkpoint and run statistics, mutated together.
#[derive(Debug, Default)]
pub struct Progress {
    pub checkpoint: Checkpoint,
    pub stats: SolveStats,
}

/// The single lock over everything shared between the escalation workers'
/// collector, the aggregator and checkpoint flushes.
#[derive(Debug, Clone)]
pub struct SharedProgress {
    inner: Arc<Mutex<Progress>>,
    store: CheckpointStore,
}

impl SharedProgress {
    pub fn new(checkpoint: Checkpoint, store: CheckpointStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Progress {
                checkpoint,
                stats: SolveStats::default(),
            })),
            store,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Progress> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist the current checkpoint. The lock is held for the write so a
    /// flush always sees a consistent cache and statistics pair.
    pub fn flush(&self) -> Result<(), CheckpointError> {
        let guard = self.lock();
        self.store.save(&guard.checkpoint)?;
        debug!(
            processed = guard.checkpoint.processed_ids.len(),
            cached = guard.checkpoint.oracle_cache.len(),
            "Checkpoint flushed"
        );
        Ok(())
    }

    pub fn stats(&self) -> SolveStats {
        self.lock().stats.clone()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.lock().checkpoint.clone()
    }
}
