//! Per-case routing: kind detection, procedure dispatch, escalation decision.

use serde::Serialize;

use crate::case::{Case, CaseKind};
use crate::features::{extract_features, extract_snapshot, extract_telecom_signals};
use crate::library::{CaseLibrary, SimilarCase};
use crate::rules::{classify_standard, classify_telecom, Confidence};
use crate::taxonomy::CauseCategory;

/// Retrieval depth for cases with no usable telemetry.
pub const SIMILAR_CASES: usize = 5;

/// The local decision for one case, before any escalation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub kind: CaseKind,
    /// `None` for cases no rule procedure covers.
    pub cause: Option<CauseCategory>,
    /// `None` for cases no rule procedure covers.
    pub confidence: Option<Confidence>,
    /// Rule answer; doubles as the fallback when escalation fails.
    pub rule_answer: String,
    pub rationale: String,
    /// Options an escalation may pick from.
    pub candidates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub similar_cases: Vec<SimilarCase>,
}

impl Diagnosis {
    pub fn needs_escalation(&self) -> bool {
        self.confidence != Some(Confidence::High)
    }
}

/// Run the local pipeline for one case. Pure apart from reading `library`.
pub fn diagnose(case: &Case, library: &CaseLibrary) -> Diagnosis {
    let kind = case.kind();
    match kind {
        CaseKind::Standard => {
            let features = extract_features(&case.raw_text);
            let result = classify_standard(case, features.as_ref());
            Diagnosis {
                kind,
                cause: Some(result.cause),
                confidence: Some(result.confidence),
                candidates: result.candidates(&case.option_labels),
                rule_answer: result.chosen_option,
                rationale: result.rationale,
                similar_cases: Vec::new(),
            }
        }
        CaseKind::NonstandardTelecom => {
            let signals = extract_telecom_signals(&case.raw_text);
            let result = classify_telecom(case, &signals);
            Diagnosis {
                kind,
                cause: Some(result.cause),
                confidence: Some(result.confidence),
                candidates: result.candidates(&case.option_labels),
                rule_answer: result.chosen_option,
                rationale: result.rationale,
                similar_cases: Vec::new(),
            }
        }
        CaseKind::Other => {
            let snapshot = extract_snapshot(&case.raw_text);
            Diagnosis {
                kind,
                cause: None,
                confidence: None,
                rule_answer: case.first_option(),
                rationale: "Non-telecom case, needs escalation".to_string(),
                candidates: case.option_labels.clone(),
                similar_cases: library.find_similar(&snapshot, SIMILAR_CASES),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_case_always_escalates() {
        let case = Case::new("o1", "Which layer does TCP belong to?\nA: 2\nB: 3\nC: 4\n");
        let d = diagnose(&case, &CaseLibrary::empty());
        assert_eq!(d.kind, CaseKind::Other);
        assert!(d.needs_escalation());
        assert_eq!(d.rule_answer, "A");
        assert_eq!(d.candidates, vec!["A", "B", "C"]);
        assert!(d.similar_cases.is_empty());
    }

    #[test]
    fn test_standard_without_rows_escalates_with_default() {
        let case = Case::new(
            "s1",
            "Timestamp|Longitude|Latitude|GPS Speed (km/h)|5G KPI PCell RF Serving PCI\n\
             C1: weak coverage at the far end\n\
             C3: A neighboring cell provides higher throughput\n",
        );
        let d = diagnose(&case, &CaseLibrary::empty());
        assert_eq!(d.kind, CaseKind::Standard);
        assert_eq!(d.confidence, Some(Confidence::Low));
        assert_eq!(d.rule_answer, "C3");
        assert!(d.needs_escalation());
    }
}
