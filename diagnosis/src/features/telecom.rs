//! Loose-table signal extraction for nonstandard telecom cases.
//!
//! These cases carry markdown-ish tables without the canonical header. The
//! header is inferred as the first wide `|` line mentioning a time or UE
//! column; data rows only need to come close to the header width.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::table::{parse_f64, parse_i64};
use super::{count_handovers, max_of, mean_of, min_of};

const HEADER_MARKERS: &[&str] = &["Time", "Timestamp", "UE"];
const RSRP_COLUMNS: &[&str] = &["Serving RSRP(dBm)", "RSRP", "Serving RSRP"];
const SINR_COLUMNS: &[&str] = &["Serving SINR(dB)", "SINR", "Serving SINR"];
const CCE_COLUMNS: &[&str] = &["CCE Fail Rate", "CCE"];
const PCI_COLUMNS: &[&str] = &["Serving PCI", "PCI"];

/// Signals summarised from a loose telecom table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelecomSignals {
    pub min_rsrp: Option<f64>,
    pub mean_sinr: Option<f64>,
    pub max_cce: Option<f64>,
    pub handovers: u32,
    /// Data rows matched against the inferred header.
    pub rows: usize,
}

type LooseRow = HashMap<String, String>;

/// Parse the loose table into header-keyed rows.
fn parse_loose_rows(text: &str) -> Vec<LooseRow> {
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for line in text.lines() {
        if !line.contains('|') || line.trim().starts_with("|:") {
            continue;
        }
        let parts: Vec<String> = line
            .split('|')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        if header.is_none() {
            if parts.len() > 3 && HEADER_MARKERS.iter().any(|m| line.contains(m)) {
                header = Some(parts);
            }
        } else if let Some(h) = &header {
            if parts.len() + 2 >= h.len() {
                rows.push(h.iter().cloned().zip(parts).collect());
            }
        }
    }

    rows
}

/// The value of the first candidate column present in `row`.
fn first_present<'a>(row: &'a LooseRow, candidates: &[&str]) -> Option<&'a str> {
    candidates
        .iter()
        .find_map(|c| row.get(*c))
        .map(String::as_str)
}

/// Summarise RSRP, SINR, CCE fail rate and handovers from a loose table.
///
/// Only the first present candidate column is consulted per row; if its
/// value does not parse, the row contributes nothing for that signal.
pub fn extract_telecom_signals(text: &str) -> TelecomSignals {
    let rows = parse_loose_rows(text);

    let mut rsrps = Vec::new();
    let mut sinrs = Vec::new();
    let mut cces = Vec::new();
    let mut pcis = Vec::new();

    for row in &rows {
        if let Some(v) = first_present(row, RSRP_COLUMNS).and_then(parse_f64) {
            rsrps.push(v);
        }
        if let Some(v) = first_present(row, SINR_COLUMNS).and_then(parse_f64) {
            sinrs.push(v);
        }
        if let Some(v) = first_present(row, CCE_COLUMNS).and_then(parse_f64) {
            cces.push(v);
        }
        if let Some(p) = first_present(row, PCI_COLUMNS).and_then(parse_i64) {
            pcis.push(p);
        }
    }

    TelecomSignals {
        min_rsrp: min_of(&rsrps),
        mean_sinr: mean_of(&sinrs),
        max_cce: max_of(&cces),
        handovers: count_handovers(&pcis),
        rows: rows.len(),
    }
}
