//! Case model: the immutable input unit and its option-set parsing.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::taxonomy::{
    matching_keys, CauseCategory, CauseCode, CAUSE_CODE_KEYWORDS, NONSTANDARD_KEYWORDS,
    STANDARD_KEYWORDS,
};

/// Header signature of the canonical drive-test table.
pub const DRIVE_TEST_SIGNATURE: &str = "Timestamp|Longitude|Latitude|GPS Speed";

/// Header signature of the engineering-parameters table.
pub const ENGINEERING_SIGNATURE: &str = "gNodeB ID|Cell ID|Longitude|Latitude";

/// Markers that identify a telecom case without the canonical table.
const TELECOM_MARKERS: &[&str] = &[
    "Drive Test Data",
    "Serving RSRP",
    "Throughput",
    "Parameter Data",
];

/// Number of options in a complete standard option set.
pub const FULL_OPTION_COUNT: usize = 8;

static PREFIXED_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z])(\d+)\s*:").expect("valid regex"));
static NUMERIC_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*:").expect("valid regex"));
static LETTER_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-I])\s*:").expect("valid regex"));
static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]?\d+|[A-I])\s*:\s*(.+)$").expect("valid regex"));

/// Which rule procedure a case is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    /// Canonical drive-test table present.
    Standard,
    /// Telecom data present, but in a looser layout.
    NonstandardTelecom,
    /// No recognizable telemetry.
    #[serde(rename = "nonstandard_other")]
    Other,
}

impl CaseKind {
    pub fn detect(text: &str) -> Self {
        if text.contains(DRIVE_TEST_SIGNATURE) {
            Self::Standard
        } else if TELECOM_MARKERS.iter().any(|m| text.contains(m)) {
            Self::NonstandardTelecom
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for CaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::NonstandardTelecom => write!(f, "nonstandard_telecom"),
            Self::Other => write!(f, "nonstandard_other"),
        }
    }
}

/// A single diagnosis case. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub raw_text: String,
    /// Ordered, unique option labels parsed from `raw_text`.
    pub option_labels: Vec<String>,
}

impl Case {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let option_labels = extract_options(&raw_text);
        Self {
            id: id.into(),
            raw_text,
            option_labels,
        }
    }

    pub fn kind(&self) -> CaseKind {
        CaseKind::detect(&self.raw_text)
    }

    pub fn has_full_option_set(&self) -> bool {
        self.option_labels.len() == FULL_OPTION_COUNT
    }

    /// First listed option, or `"1"` when the set is empty.
    pub fn first_option(&self) -> String {
        self.option_labels
            .first()
            .cloned()
            .unwrap_or_else(|| "1".to_string())
    }
}

/// Extract the option labels of a case.
///
/// Prefixed labels (`A1:`) win over numeric labels (`1:`), which win over
/// bare letters (`A:`). Prefixed and numeric labels keep first-seen order;
/// letters are returned sorted. With no option lines the default `1..8` set
/// is returned.
pub fn extract_options(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let prefixed: Vec<String> = lines
        .iter()
        .filter_map(|l| PREFIXED_OPTION.captures(l))
        .map(|c| format!("{}{}", &c[1], &c[2]))
        .collect();
    if !prefixed.is_empty() {
        return dedup_in_order(prefixed);
    }

    let numeric: Vec<String> = lines
        .iter()
        .filter_map(|l| NUMERIC_OPTION.captures(l))
        .map(|c| c[1].to_string())
        .collect();
    if !numeric.is_empty() {
        return dedup_in_order(numeric);
    }

    let mut letters: Vec<String> = lines
        .iter()
        .filter_map(|l| LETTER_OPTION.captures(l))
        .map(|c| c[1].to_string())
        .collect();
    if !letters.is_empty() {
        letters.sort();
        letters.dedup();
        return letters;
    }

    (1..=FULL_OPTION_COUNT).map(|n| n.to_string()).collect()
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Iterate `(option_id, lowercased description)` over option lines.
fn option_lines(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    text.lines().filter_map(|line| {
        let line = line.trim();
        let caps = OPTION_LINE.captures(line)?;
        Some((caps[1].to_string(), caps[2].to_lowercase()))
    })
}

/// Cause category → concrete option label for one case.
///
/// Later option lines overwrite earlier ones for the same category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionMapping {
    entries: BTreeMap<CauseCategory, String>,
}

impl OptionMapping {
    pub fn from_text(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for (option_id, description) in option_lines(text) {
            for table in [STANDARD_KEYWORDS, NONSTANDARD_KEYWORDS] {
                for category in matching_keys(table, &description) {
                    entries.insert(category, option_id.clone());
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, category: CauseCategory) -> Option<&str> {
        self.entries.get(&category).map(String::as_str)
    }

    pub fn contains(&self, category: CauseCategory) -> bool {
        self.entries.contains_key(&category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(CauseCategory, &str)]) -> Self {
        Self {
            entries: pairs.iter().map(|(c, o)| (*c, o.to_string())).collect(),
        }
    }
}

/// C1..C8 back-mapping between cause codes and the case's own options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CauseCodeMap {
    code_to_option: BTreeMap<CauseCode, String>,
    option_to_code: BTreeMap<String, CauseCode>,
}

impl CauseCodeMap {
    pub fn from_text(text: &str) -> Self {
        let mut map = Self::default();
        for (option_id, description) in option_lines(text) {
            for code in matching_keys(CAUSE_CODE_KEYWORDS, &description) {
                map.code_to_option.insert(code, option_id.clone());
                map.option_to_code.insert(option_id.clone(), code);
            }
        }
        map
    }

    pub fn option_for(&self, code: CauseCode) -> Option<&str> {
        self.code_to_option.get(&code).map(String::as_str)
    }

    pub fn code_for(&self, option: &str) -> Option<CauseCode> {
        self.option_to_code.get(option).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER_CASE: &str = "Analyze the drop.\n\
        C: Missing neighbor configuration\n\
        A: Weak coverage caused by site construction\n\
        B: PDCCH resource management parameters unreasonable\n\
        A: duplicate line\n";

    #[test]
    fn test_kind_serializes_like_it_displays() {
        for kind in [CaseKind::Standard, CaseKind::NonstandardTelecom, CaseKind::Other] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.to_string()));
        }
    }

    #[test]
    fn test_letter_options_sorted_and_unique() {
        assert_eq!(extract_options(LETTER_CASE), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_prefixed_options_win_over_numeric() {
        let text = "1: first\nC2: second\nC1: third\nC2: again";
        assert_eq!(extract_options(text), vec!["C2", "C1"]);
    }

    #[test]
    fn test_numeric_options_keep_order() {
        let text = "3: c\n1: a\n2: b";
        assert_eq!(extract_options(text), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_default_options_when_none_listed() {
        let opts = extract_options("no options here");
        assert_eq!(opts.len(), FULL_OPTION_COUNT);
        assert_eq!(opts[0], "1");
        assert_eq!(opts[7], "8");
    }

    #[test]
    fn test_kind_detection() {
        assert_eq!(
            CaseKind::detect("x\nTimestamp|Longitude|Latitude|GPS Speed (km/h)|y"),
            CaseKind::Standard
        );
        assert_eq!(
            CaseKind::detect("Drive Test Data:\n| Time | UE |"),
            CaseKind::NonstandardTelecom
        );
        assert_eq!(CaseKind::detect("What is a router?"), CaseKind::Other);
    }

    #[test]
    fn test_option_mapping_uses_both_tables() {
        let mapping = OptionMapping::from_text(LETTER_CASE);
        assert_eq!(mapping.get(CauseCategory::NeighborMissing), Some("C"));
        assert_eq!(mapping.get(CauseCategory::WeakCoverageRf), Some("A"));
        assert_eq!(mapping.get(CauseCategory::Pdcch), Some("B"));
        assert!(!mapping.contains(CauseCategory::Overshoot));
    }

    #[test]
    fn test_cause_code_map_round_trips_option() {
        let text = "C1: The serving cell's downtilt angle is too large\n\
                    C3: A neighboring cell provides higher throughput\n";
        let map = CauseCodeMap::from_text(text);
        assert_eq!(map.option_for(CauseCode::C1), Some("C1"));
        assert_eq!(map.option_for(CauseCode::C3), Some("C3"));
        assert_eq!(map.code_for("C3"), Some(CauseCode::C3));
        assert_eq!(map.option_for(CauseCode::C5), None);
    }

    #[test]
    fn test_case_first_option() {
        let case = Case::new("q1", LETTER_CASE);
        assert_eq!(case.first_option(), "A");
        assert!(!case.has_full_option_set());
    }
}
