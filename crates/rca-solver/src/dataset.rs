//! Dataset I/O: the input case CSV and the submission CSV.

use std::path::{Path, PathBuf};

use diagnosis::Case;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::checkpoint::OutputRow;

pub const SUBMISSION_HEADER: [&str; 4] = [
    "ID",
    "Qwen3-32B",
    "Qwen2.5-7B-Instruct",
    "Qwen2.5-1.5B-Instruct",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write submission {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Deserialize)]
struct CaseRecord {
    #[serde(rename = "ID")]
    id: String,
    question: String,
}

/// Load every case from the input CSV, in file order. Rows missing an id or
/// question are skipped with a warning.
pub fn load_cases(path: &Path) -> DatasetResult<Vec<Case>> {
    let read_err = |source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(read_err)?;

    let mut cases = Vec::new();
    for (row, record) in reader.deserialize::<CaseRecord>().enumerate() {
        match record {
            Ok(r) if !r.id.trim().is_empty() && !r.question.trim().is_empty() => {
                cases.push(Case::new(r.id.trim(), r.question));
            }
            Ok(_) => warn!(row, "Skipping case row with empty id or question"),
            Err(e) => return Err(read_err(e)),
        }
    }

    info!(path = %path.display(), cases = cases.len(), "Loaded dataset");
    Ok(cases)
}

/// Write the submission file from finalized rows.
pub fn write_submission(path: &Path, rows: &[OutputRow]) -> DatasetResult<()> {
    let write_err = |source| DatasetError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    writer.write_record(SUBMISSION_HEADER).map_err(write_err)?;
    for row in rows {
        writer
            .write_record([&row.id, &row.combined, &row.rule_based, &row.ai_based])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| write_err(csv::Error::from(e)))?;

    info!(path = %path.display(), rows = rows.len(), "Wrote submission");
    Ok(())
}
