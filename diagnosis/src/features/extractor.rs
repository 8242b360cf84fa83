//! Drive-test feature extraction for the standard rule cascade.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::table::{parse_f64, parse_i64, Occurrence, PipeTable, RowWidth};
use super::{count_handovers, max_of, mean_of, min_of, resolve_digital_tilt};
use crate::case::{DRIVE_TEST_SIGNATURE, ENGINEERING_SIGNATURE};

pub const COL_SPEED: &str = "GPS Speed (km/h)";
pub const COL_SERVING_PCI: &str = "5G KPI PCell RF Serving PCI";
pub const COL_TOP1_PCI: &str =
    "Measurement PCell Neighbor Cell Top Set(Cell Level) Top 1 PCI";
pub const COL_DL_RB: &str = "5G KPI PCell Layer1 DL RB Num (Including 0)";
pub const COL_SERVING_RSRP: &str = "5G KPI PCell RF Serving SS-RSRP [dBm]";
pub const COL_ENG_PCI: &str = "PCI";
pub const COL_MECHANICAL_TILT: &str = "Mechanical Downtilt";
pub const COL_DIGITAL_TILT: &str = "Digital Tilt";

/// Numeric summary of a case's drive-test and engineering tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub min_rsrp: Option<f64>,
    pub avg_rsrp: Option<f64>,
    pub max_tilt: Option<f64>,
    pub min_tilt: Option<f64>,
    /// Sum of resolved tilts over serving cells found in the engineering table.
    pub total_tilt: Option<f64>,
    pub handovers: u32,
    /// Distinct top-1 neighbour PCIs.
    pub num_neighbors: usize,
    pub max_speed: Option<f64>,
    pub avg_rb: Option<f64>,
    pub has_pci_conflict: bool,
}

pub(crate) fn drive_test_stop(line: &str) -> bool {
    !line.contains('|') || line.trim().starts_with("gNodeB") || line.contains("Engineering")
}

/// Extract [`Features`] from case text.
///
/// Returns `None` when the drive-test header is missing or has no data rows;
/// callers must treat that as "no features", not as all-zero features.
pub fn extract_features(text: &str) -> Option<Features> {
    let drive = PipeTable::locate(
        text,
        DRIVE_TEST_SIGNATURE,
        Occurrence::Last,
        RowWidth::Exact,
        drive_test_stop,
    )?;
    if drive.is_empty() {
        return None;
    }

    let speed_col = drive.column(COL_SPEED);
    let pci_col = drive.column(COL_SERVING_PCI);
    let top1_col = drive.column(COL_TOP1_PCI);
    let rb_col = drive.column(COL_DL_RB);
    let rsrp_col = drive.column(COL_SERVING_RSRP);

    let mut speeds = Vec::new();
    let mut serving_pcis = Vec::new();
    let mut neighbor_pcis = BTreeSet::new();
    let mut rbs = Vec::new();
    let mut rsrps = Vec::new();

    for row in &drive.rows {
        if let Some(v) = drive.cell(row, speed_col).and_then(parse_f64) {
            speeds.push(v);
        }
        if let Some(pci) = drive.cell(row, pci_col).and_then(parse_i64) {
            serving_pcis.push(pci);
        }
        if let Some(pci) = drive.cell(row, top1_col).and_then(parse_i64) {
            neighbor_pcis.insert(pci);
        }
        if let Some(v) = drive.cell(row, rb_col).and_then(parse_f64) {
            rbs.push(v);
        }
        if let Some(v) = drive.cell(row, rsrp_col).and_then(parse_f64) {
            rsrps.push(v);
        }
    }

    let distinct_serving: BTreeSet<i64> = serving_pcis.iter().copied().collect();
    let tilts = serving_cell_tilts(text, &distinct_serving);

    Some(Features {
        min_rsrp: min_of(&rsrps),
        avg_rsrp: mean_of(&rsrps),
        max_tilt: max_of(&tilts),
        min_tilt: min_of(&tilts),
        total_tilt: (!tilts.is_empty()).then(|| tilts.iter().sum()),
        handovers: count_handovers(&serving_pcis),
        num_neighbors: neighbor_pcis.len(),
        max_speed: max_of(&speeds),
        avg_rb: mean_of(&rbs),
        has_pci_conflict: has_mod30_conflict(&distinct_serving, &neighbor_pcis),
    })
}

/// Mechanical + digital tilt for each serving cell present in the engineering table.
fn serving_cell_tilts(text: &str, serving: &BTreeSet<i64>) -> Vec<f64> {
    let Some(eng) = PipeTable::locate(
        text,
        ENGINEERING_SIGNATURE,
        Occurrence::Last,
        RowWidth::Exact,
        |l| !l.contains('|'),
    ) else {
        return Vec::new();
    };

    let pci_col = eng.column(COL_ENG_PCI);
    let md_col = eng.column(COL_MECHANICAL_TILT);
    let dt_col = eng.column(COL_DIGITAL_TILT);

    let mut by_pci: HashMap<i64, &Vec<String>> = HashMap::new();
    for row in &eng.rows {
        if let Some(pci) = eng.cell(row, pci_col).and_then(parse_i64) {
            by_pci.insert(pci, row);
        }
    }

    serving
        .iter()
        .filter_map(|pci| by_pci.get(pci))
        .filter_map(|row| {
            // An absent column contributes zero; a present but unparsable one drops the cell.
            let md = match eng.cell(row, md_col) {
                Some(cell) => parse_f64(cell)?,
                None => 0.0,
            };
            let dt = match eng.cell(row, dt_col) {
                Some(cell) => resolve_digital_tilt(cell)?,
                None => 0.0,
            };
            Some(md + dt)
        })
        .collect()
}

/// True when two distinct PCIs share the same `pci mod 30`.
fn has_mod30_conflict(serving: &BTreeSet<i64>, neighbors: &BTreeSet<i64>) -> bool {
    let all: BTreeSet<i64> = serving.union(neighbors).copied().collect();
    let residues: BTreeSet<i64> = all.iter().map(|p| p.rem_euclid(30)).collect();
    residues.len() != all.len()
}
