//! Case Library: labeled historical cases with similarity retrieval
//!
//! ```text
//! case_cache.json ──(present, non-empty)──→ CaseLibrary
//!        │
//!        └─(absent/empty/corrupt)──→ train_file + case_file CSVs
//!                                     └─→ snapshot each question
//!                                         └─→ persist cache
//! ```
//!
//! Retrieval is contextual only. Nothing here produces an answer directly.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::features::{extract_snapshot, FeatureSnapshot};

/// Characters of question text kept with each entry.
pub const PREVIEW_CHARS: usize = 500;

/// Slots filled by rank alone before the unseen-answer rule applies.
const FREE_SLOTS: usize = 3;

/// `(attribute, weight, scale)` for each similarity attribute.
const SIMILARITY_WEIGHTS: [(fn(&FeatureSnapshot) -> Option<f64>, f64, f64); 7] = [
    (|s| s.min_rsrp, 2.0, 30.0),
    (|s| s.max_tilt, 2.0, 20.0),
    (|s| s.total_tilt, 1.5, 50.0),
    (|s| s.handovers, 1.5, 5.0),
    (|s| s.max_speed, 1.0, 50.0),
    (|s| s.avg_rb, 1.0, 100.0),
    (|s| s.num_neighbors, 1.0, 5.0),
];

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read case source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write case cache {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode case cache: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where a library entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Train,
    CaseFile,
}

/// One labeled historical case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub question_preview: String,
    pub answer: String,
    pub features: FeatureSnapshot,
    pub source: Provenance,
}

/// A retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCase {
    pub case_id: String,
    pub similarity: f64,
    pub answer: String,
    pub features: FeatureSnapshot,
    pub source: Provenance,
}

#[derive(Debug, Deserialize)]
struct LabeledRow {
    #[serde(rename = "ID")]
    id: Option<String>,
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

/// Read-only after construction; shared by reference across the run.
#[derive(Debug, Clone, Default)]
pub struct CaseLibrary {
    entries: BTreeMap<String, LibraryEntry>,
}

impl CaseLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, LibraryEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, case_id: &str) -> Option<&LibraryEntry> {
        self.entries.get(case_id)
    }

    /// Build the library, preferring an existing non-empty cache.
    ///
    /// Unreadable sources are skipped with a warning. The cache is written
    /// only when at least one entry was loaded.
    pub fn build(
        cache_path: &Path,
        train_file: Option<&Path>,
        case_file: Option<&Path>,
    ) -> LibraryResult<Self> {
        if let Some(cached) = load_cache(cache_path) {
            info!(cases = cached.len(), path = %cache_path.display(), "Loaded case library from cache");
            return Ok(cached);
        }

        if train_file.is_none() && case_file.is_none() {
            info!("No labeled case sources configured, case library disabled");
            return Ok(Self::empty());
        }

        let mut library = Self::empty();
        for (path, source) in [
            (train_file, Provenance::Train),
            (case_file, Provenance::CaseFile),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                warn!(path = %path.display(), "Case source not found, skipping");
                continue;
            }
            match library.load_source(path, source) {
                Ok(count) => info!(path = %path.display(), count, "Loaded labeled cases"),
                Err(e) => warn!(error = %e, "Skipping unreadable case source"),
            }
        }

        if library.is_empty() {
            info!("No cases loaded, case matching disabled");
            return Ok(library);
        }

        library.save_cache(cache_path)?;
        info!(cases = library.len(), "Case library built");
        Ok(library)
    }

    /// Load one labeled CSV. Returns the number of entries added.
    fn load_source(&mut self, path: &Path, source: Provenance) -> LibraryResult<usize> {
        let wrap = |e: csv::Error| LibraryError::Source {
            path: path.to_path_buf(),
            source: e,
        };
        let mut reader = csv::Reader::from_path(path).map_err(wrap)?;

        let mut added = 0;
        for (idx, row) in reader.deserialize::<LabeledRow>().enumerate() {
            let row = row.map_err(wrap)?;
            if row.question.is_empty() || row.answer.is_empty() {
                debug!(row = idx, "Skipping unlabeled row");
                continue;
            }
            let case_id = row.id.unwrap_or_else(|| format!("case_{added}"));
            let entry = LibraryEntry {
                question_preview: row.question.chars().take(PREVIEW_CHARS).collect(),
                answer: row.answer,
                features: extract_snapshot(&row.question),
                source,
            };
            self.entries.insert(case_id, entry);
            added += 1;
        }
        Ok(added)
    }

    fn save_cache(&self, path: &Path) -> LibraryResult<()> {
        let json = serde_json::to_string(&self.entries)?;
        std::fs::write(path, json).map_err(|e| LibraryError::CacheWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Up to `n` most similar entries, diversified by answer.
    ///
    /// The first three slots take the best matches outright; later slots
    /// only accept an answer not seen yet.
    ///
    /// An empty library yields nothing. So does an empty snapshot: it shares
    /// no attribute with any entry, so every score would be 0 and the
    /// ranking would only reflect id order. Callers get no neighbours rather
    /// than arbitrary ones, the same outcome as skipping the lookup for
    /// cases without features.
    pub fn find_similar(&self, snapshot: &FeatureSnapshot, n: usize) -> Vec<SimilarCase> {
        if snapshot.is_empty() || self.entries.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(&String, f64, &LibraryEntry)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id, similarity(snapshot, &entry.features), entry))
            .collect();
        // Stable sort keeps id order among ties.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut result = Vec::with_capacity(n);
        let mut seen_answers = HashSet::new();
        for (id, score, entry) in ranked {
            if result.len() >= n {
                break;
            }
            let unseen = !seen_answers.contains(entry.answer.as_str());
            if unseen || result.len() < FREE_SLOTS {
                seen_answers.insert(entry.answer.as_str());
                result.push(SimilarCase {
                    case_id: id.clone(),
                    similarity: score,
                    answer: entry.answer.clone(),
                    features: entry.features,
                    source: entry.source,
                });
            }
        }
        result
    }
}

/// Existing cache, or `None` when it is absent, empty or unreadable.
fn load_cache(path: &Path) -> Option<CaseLibrary> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Case cache unreadable, rebuilding");
            return None;
        }
    };
    match serde_json::from_str::<BTreeMap<String, LibraryEntry>>(&raw) {
        Ok(entries) if !entries.is_empty() => Some(CaseLibrary::from_entries(entries)),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Case cache corrupt, rebuilding");
            None
        }
    }
}

/// Weighted similarity over the attributes present in both snapshots.
///
/// Symmetric and bounded in `[0, 1]`; `0` when no attribute overlaps.
pub fn similarity(a: &FeatureSnapshot, b: &FeatureSnapshot) -> f64 {
    let mut total_weight = 0.0;
    let mut score = 0.0;

    for (attr, weight, scale) in SIMILARITY_WEIGHTS {
        if let (Some(x), Some(y)) = (attr(a), attr(b)) {
            let closeness = (1.0 - (x - y).abs() / scale).max(0.0);
            score += weight * closeness;
            total_weight += weight;
        }
    }

    if total_weight > 0.0 {
        score / total_weight
    } else {
        0.0
    }
}
