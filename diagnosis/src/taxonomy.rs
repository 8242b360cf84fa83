//! Cause taxonomy: static keyword tables mapping option text to cause categories.
//!
//! Three tables live here:
//!
//! - [`STANDARD_KEYWORDS`]: the eight canonical drive-test causes
//! - [`NONSTANDARD_KEYWORDS`]: causes used by the looser telecom case layouts
//! - [`CAUSE_CODE_KEYWORDS`]: the C1..C8 code back-map used when an option set
//!   has been filtered down
//!
//! Each table is evaluated per option line, category by category, and a
//! category matches on its first keyword hit.

use serde::{Deserialize, Serialize};

/// Abstract root-cause category, later resolved to a concrete option label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCategory {
    // Standard drive-test causes
    NeighborHigher,
    Overshoot,
    Overlap,
    PciConflict,
    LowRb,
    WeakCoverage,
    HighSpeed,
    Handover,
    // Nonstandard telecom causes
    OverlapRf,
    InterFreqThreshold,
    Capacity,
    TransportAnomaly,
    UplinkIssue,
    NeighborMissing,
    WeakCoverageRf,
    ThresholdHigh,
    ThresholdLow,
    Pdcch,
}

impl CauseCategory {
    /// Canonical C1..C8 code for the standard categories.
    pub fn code(&self) -> Option<CauseCode> {
        match self {
            Self::WeakCoverage => Some(CauseCode::C1),
            Self::Overshoot => Some(CauseCode::C2),
            Self::NeighborHigher => Some(CauseCode::C3),
            Self::Overlap => Some(CauseCode::C4),
            Self::Handover => Some(CauseCode::C5),
            Self::PciConflict => Some(CauseCode::C6),
            Self::HighSpeed => Some(CauseCode::C7),
            Self::LowRb => Some(CauseCode::C8),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeighborHigher => "neighbor_higher",
            Self::Overshoot => "overshoot",
            Self::Overlap => "overlap",
            Self::PciConflict => "pci_conflict",
            Self::LowRb => "low_rb",
            Self::WeakCoverage => "weak_coverage",
            Self::HighSpeed => "high_speed",
            Self::Handover => "handover",
            Self::OverlapRf => "overlap_rf",
            Self::InterFreqThreshold => "inter_freq_threshold",
            Self::Capacity => "capacity",
            Self::TransportAnomaly => "transport_anomaly",
            Self::UplinkIssue => "uplink_issue",
            Self::NeighborMissing => "neighbor_missing",
            Self::WeakCoverageRf => "weak_coverage_rf",
            Self::ThresholdHigh => "threshold_high",
            Self::ThresholdLow => "threshold_low",
            Self::Pdcch => "pdcch",
        }
    }
}

impl std::fmt::Display for CauseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical cause codes of the eight-option standard layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CauseCode {
    /// Weak coverage / excessive downtilt
    C1,
    /// Overshooting
    C2,
    /// Neighbour cell provides higher throughput
    C3,
    /// Overlapping coverage
    C4,
    /// Frequent handovers
    C5,
    /// PCI mod 30 conflict
    C6,
    /// Vehicle speed above 40 km/h
    C7,
    /// Scheduled RBs too low
    C8,
}

impl std::fmt::Display for CauseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type KeywordTable<K> = &'static [(K, &'static [&'static str])];

pub const STANDARD_KEYWORDS: KeywordTable<CauseCategory> = &[
    (
        CauseCategory::NeighborHigher,
        &[
            "neighboring cell provides higher throughput",
            "neighbor cell provides higher",
        ],
    ),
    (
        CauseCategory::Overshoot,
        &["coverage distance exceeds 1km", "over-shooting", "overshooting"],
    ),
    (
        CauseCategory::Overlap,
        &["overlapping coverage", "severe overlapping"],
    ),
    (CauseCategory::PciConflict, &["PCI mod 30", "same PCI mod"]),
    (
        CauseCategory::LowRb,
        &[
            "RBs are below 160",
            "scheduled RBs are below",
            "Average scheduled RBs",
        ],
    ),
    (
        CauseCategory::WeakCoverage,
        &["downtilt angle is too large", "weak coverage at the far end"],
    ),
    (
        CauseCategory::HighSpeed,
        &["speed exceeds 40km/h", "Test vehicle speed exceeds"],
    ),
    (
        CauseCategory::Handover,
        &["Frequent handovers", "handovers degrade"],
    ),
];

pub const NONSTANDARD_KEYWORDS: KeywordTable<CauseCategory> = &[
    (
        CauseCategory::Overlap,
        &[
            "severe overlap",
            "overlapping coverage",
            "RF or power parameters cause severe overlap",
        ],
    ),
    (
        CauseCategory::OverlapRf,
        &[
            "severe overlapping coverage",
            "RF or power parameters cause severe overlapping",
        ],
    ),
    (
        CauseCategory::InterFreqThreshold,
        &["inter-frequency handover threshold", "Inter-frequency handover"],
    ),
    (
        CauseCategory::Capacity,
        &["capacity", "load imbalance", "network capacity"],
    ),
    (
        CauseCategory::TransportAnomaly,
        &[
            "transport anomaly",
            "transmission abnormality",
            "upstream traffic",
            "Test server or transport",
        ],
    ),
    (
        CauseCategory::UplinkIssue,
        &["uplink traffic", "transmission abnormality"],
    ),
    (
        CauseCategory::NeighborMissing,
        &[
            "neighbor configuration missing",
            "Missing neighbor",
            "neighbor cell configuration",
        ],
    ),
    (
        CauseCategory::WeakCoverageRf,
        &[
            "weak coverage",
            "RF, power parameters or site construction lead to weak coverage",
            "site construction cause weak",
        ],
    ),
    (
        CauseCategory::ThresholdHigh,
        &[
            "intra-frequency handover threshold is too high",
            "threshold too high",
            "handover threshold too high",
        ],
    ),
    (
        CauseCategory::ThresholdLow,
        &[
            "intra-frequency handover threshold is too low",
            "threshold too low",
            "frequent handover",
            "handover threshold too low",
        ],
    ),
    (
        CauseCategory::Pdcch,
        &[
            "PDCCH resource management parameters unreasonable",
            "PDCCH",
            "resource management",
            "CCE",
        ],
    ),
];

pub const CAUSE_CODE_KEYWORDS: KeywordTable<CauseCode> = &[
    (CauseCode::C1, &["downtilt", "weak coverage", "far end"]),
    (
        CauseCode::C2,
        &["coverage distance exceeds", "over-shooting", "overshooting"],
    ),
    (CauseCode::C3, &["neighboring cell provides higher"]),
    (CauseCode::C4, &["overlapping coverage", "overlapping"]),
    (CauseCode::C5, &["frequent handover", "handovers degrade"]),
    (CauseCode::C6, &["PCI mod 30"]),
    (CauseCode::C7, &["speed exceeds 40"]),
    (CauseCode::C8, &["RBs are below", "scheduled RBs"]),
];

/// Every key in `table` whose keyword list hits `description`.
///
/// Matching is case-insensitive substring search; `description` is expected
/// to be lowercased already.
pub fn matching_keys<K: Copy>(table: KeywordTable<K>, description: &str) -> Vec<K> {
    table
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|kw| description.contains(&kw.to_lowercase()))
        })
        .map(|(key, _)| *key)
        .collect()
}
