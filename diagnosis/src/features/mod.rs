//! Feature Extraction: numeric signal summaries from embedded telemetry tables
//!
//! Case descriptions embed one or two pipe-delimited tables: the drive-test
//! log and, optionally, an engineering-parameters table. This module turns
//! them into typed summaries.
//!
//! ```text
//! raw text
//!   ├─ canonical drive-test header ──→ Features        (standard rules)
//!   │                              └─→ FeatureSnapshot (case-library similarity)
//!   └─ loose Time/UE header ────────→ TelecomSignals  (nonstandard rules)
//! ```
//!
//! Parsing is fail-soft per field: a bad cell drops that one value, never the
//! row or the table. Optional fields stay `None` when nothing contributed.

pub mod extractor;
pub mod snapshot;
pub mod table;
pub mod telecom;

pub use extractor::{extract_features, Features};
pub use snapshot::{extract_snapshot, FeatureSnapshot};
pub use table::{PipeTable, RowWidth};
pub use telecom::{extract_telecom_signals, TelecomSignals};

/// Digital tilt value that encodes the default electrical tilt.
pub(crate) const DIGITAL_TILT_SENTINEL: &str = "255";
/// Tilt in degrees substituted for [`DIGITAL_TILT_SENTINEL`].
pub(crate) const DIGITAL_TILT_SENTINEL_DEGREES: f64 = 6.0;

/// Count strict changes between consecutive identifiers.
pub(crate) fn count_handovers(pcis: &[i64]) -> u32 {
    pcis.windows(2).filter(|w| w[0] != w[1]).count() as u32
}

pub(crate) fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub(crate) fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub(crate) fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Resolve digital tilt, mapping the sentinel to its fixed degree value.
pub(crate) fn resolve_digital_tilt(cell: &str) -> Option<f64> {
    if cell.trim() == DIGITAL_TILT_SENTINEL {
        Some(DIGITAL_TILT_SENTINEL_DEGREES)
    } else {
        table::parse_f64(cell)
    }
}
