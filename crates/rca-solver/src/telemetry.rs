//! Structured solve log.
//!
//! One JSON object per finalized case, appended to `solve_log.jsonl` in the
//! output directory. The file is append-only across resumed runs and removed
//! only on a fresh start.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use diagnosis::{CaseKind, CauseCategory, Confidence, Diagnosis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveLogEntry {
    pub timestamp: DateTime<Utc>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CaseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<CauseCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Rule rationale.
    pub rule: String,
    pub rule_answer: String,
    /// Final decision.
    pub answer: String,
    pub needs_ai: bool,
    /// Whether an accepted oracle answer replaced the rule answer.
    pub oracle_used: bool,
}

impl SolveLogEntry {
    pub fn new(id: &str, diagnosis: &Diagnosis, answer: &str, oracle_used: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            id: id.to_string(),
            kind: diagnosis.kind,
            cause: diagnosis.cause,
            confidence: diagnosis.confidence,
            rule: diagnosis.rationale.clone(),
            rule_answer: diagnosis.rule_answer.clone(),
            answer: answer.to_string(),
            needs_ai: diagnosis.needs_escalation(),
            oracle_used,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveLog {
    path: PathBuf,
}

impl SolveLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the previous run's log.
    pub fn reset(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed previous solve log"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove solve log: {e}"),
        }
    }

    /// Append one entry. Failures are logged, never propagated.
    pub fn append(&self, entry: &SolveLogEntry) {
        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(case = %entry.id, "Failed to serialize solve log entry: {e}");
                return;
            }
        };
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{json}") {
                    warn!("Failed to append solve log: {e}");
                }
            }
            Err(e) => warn!(path = %self.path.display(), "Failed to open solve log: {e}"),
        }
    }

    /// Read all entries back, skipping lines that do not parse.
    pub fn read_entries(&self) -> std::io::Result<Vec<SolveLogEntry>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed solve log line: {e}"),
            }
        }
        Ok(entries)
    }
}
