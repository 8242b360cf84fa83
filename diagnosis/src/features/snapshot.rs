//! Structural snapshot used for case-library similarity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::table::{parse_f64, parse_i64, Occurrence, PipeTable, RowWidth};
use super::{count_handovers, max_of, mean_of, min_of, resolve_digital_tilt};
use crate::case::{DRIVE_TEST_SIGNATURE, ENGINEERING_SIGNATURE};

/// The similarity attribute set. Every attribute is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub min_rsrp: Option<f64>,
    pub max_tilt: Option<f64>,
    pub total_tilt: Option<f64>,
    pub handovers: Option<f64>,
    pub max_speed: Option<f64>,
    pub avg_rb: Option<f64>,
    pub num_neighbors: Option<f64>,
}

impl FeatureSnapshot {
    /// True when no attribute carries a value.
    pub fn is_empty(&self) -> bool {
        self.min_rsrp.is_none()
            && self.max_tilt.is_none()
            && self.total_tilt.is_none()
            && self.handovers.is_none()
            && self.max_speed.is_none()
            && self.avg_rb.is_none()
            && self.num_neighbors.is_none()
    }
}

fn snapshot_stop(line: &str) -> bool {
    !line.contains('|') || line.contains("gNodeB") || line.contains("Engineering")
}

/// Extract a [`FeatureSnapshot`] with tolerant, substring-based column lookup.
///
/// Without a drive-test header every attribute is `None`. With one, the
/// handover and neighbour counts are always present (possibly zero).
pub fn extract_snapshot(text: &str) -> FeatureSnapshot {
    let Some(drive) = PipeTable::locate(
        text,
        DRIVE_TEST_SIGNATURE,
        Occurrence::First,
        RowWidth::AtLeast,
        snapshot_stop,
    ) else {
        return FeatureSnapshot::default();
    };

    let rsrp_col = drive.find_column(&["Serving SS-RSRP", "Serving RSRP"]);
    let speed_col = drive.find_column(&["GPS Speed"]);
    let pci_col = drive.find_column(&["Serving PCI"]);
    let top1_col = drive.find_column(&["Top 1 PCI"]);
    let rb_col = drive.find_column(&["DL RB Num"]);

    let mut rsrps = Vec::new();
    let mut speeds = Vec::new();
    let mut pcis = Vec::new();
    let mut neighbors = BTreeSet::new();
    let mut rbs = Vec::new();

    for row in &drive.rows {
        if let Some(v) = drive.cell(row, rsrp_col).and_then(parse_f64) {
            rsrps.push(v);
        }
        if let Some(v) = drive.cell(row, speed_col).and_then(parse_f64) {
            speeds.push(v);
        }
        if let Some(p) = drive.cell(row, pci_col).and_then(parse_i64) {
            pcis.push(p);
        }
        if let Some(p) = drive.cell(row, top1_col).and_then(parse_i64) {
            neighbors.insert(p);
        }
        if let Some(v) = drive.cell(row, rb_col).and_then(parse_f64) {
            rbs.push(v);
        }
    }

    let tilts = engineering_tilts(text);

    FeatureSnapshot {
        min_rsrp: min_of(&rsrps),
        max_tilt: max_of(&tilts),
        total_tilt: (!tilts.is_empty()).then(|| tilts.iter().sum()),
        handovers: Some(f64::from(count_handovers(&pcis))),
        max_speed: max_of(&speeds),
        avg_rb: mean_of(&rbs),
        num_neighbors: Some(neighbors.len() as f64),
    }
}

/// Tilt of every row of the first engineering table, regardless of serving cell.
fn engineering_tilts(text: &str) -> Vec<f64> {
    let Some(eng) = PipeTable::locate(
        text,
        ENGINEERING_SIGNATURE,
        Occurrence::First,
        RowWidth::AtLeast,
        |l| !l.contains('|'),
    ) else {
        return Vec::new();
    };

    let md_col = eng.find_column(&["Mechanical Downtilt"]);
    let dt_col = eng.find_column(&["Digital Tilt"]);

    eng.rows
        .iter()
        .filter_map(|row| {
            let md = match eng.cell(row, md_col) {
                Some("") | None => 0.0,
                Some(cell) => parse_f64(cell)?,
            };
            let dt = match eng.cell(row, dt_col) {
                Some("") | None => 0.0,
                Some(cell) => resolve_digital_tilt(cell)?,
            };
            Some(md + dt)
        })
        .collect()
}
