//! Nonstandard telecom procedure: three short-circuits, then elimination.

use std::collections::BTreeSet;

use crate::case::{Case, OptionMapping};
use crate::features::TelecomSignals;
use crate::taxonomy::CauseCategory;

use super::{ClassificationResult, Confidence};

/// Option letters a telecom case may use.
pub const OPTION_ALPHABET: [&str; 9] = ["A", "B", "C", "D", "E", "F", "G", "H", "I"];

const DEFAULT_MIN_RSRP: f64 = -100.0;
const DEFAULT_MEAN_SINR: f64 = 0.0;
const DEFAULT_MAX_CCE: f64 = 0.0;

/// Causes the short-circuits would have caught. Ruled out once none fired.
const SHORT_CIRCUIT_CAUSES: [CauseCategory; 3] = [
    CauseCategory::WeakCoverageRf,
    CauseCategory::ThresholdLow,
    CauseCategory::Pdcch,
];

/// Classify a nonstandard telecom case from its loose-table signals.
pub fn classify_telecom(case: &Case, signals: &TelecomSignals) -> ClassificationResult {
    let min_rsrp = signals.min_rsrp.unwrap_or(DEFAULT_MIN_RSRP);
    let mean_sinr = signals.mean_sinr.unwrap_or(DEFAULT_MEAN_SINR);
    let max_cce = signals.max_cce.unwrap_or(DEFAULT_MAX_CCE);
    let handovers = signals.handovers;

    let mapping = OptionMapping::from_text(&case.raw_text);

    let short_circuit = if min_rsrp < -100.0 {
        Some((
            CauseCategory::WeakCoverageRf,
            format!("Rule 1: min_rsrp={min_rsrp:.1}<-100 => Weak Coverage"),
        ))
    } else if handovers >= 3 {
        Some((
            CauseCategory::ThresholdLow,
            format!("Rule 2: handovers={handovers}>=3 => Threshold Too Low"),
        ))
    } else if max_cce > 0.4 {
        Some((
            CauseCategory::Pdcch,
            format!("Rule 3: max_cce={max_cce:.2}>0.4 => PDCCH Congestion"),
        ))
    } else {
        None
    };

    if let Some((cause, rationale)) = short_circuit {
        return ClassificationResult {
            cause,
            confidence: Confidence::High,
            chosen_option: lookup_option(cause, &mapping, &case.option_labels),
            rationale,
            excluded_options: BTreeSet::new(),
        };
    }

    let mut excluded_causes: BTreeSet<CauseCategory> = SHORT_CIRCUIT_CAUSES.into_iter().collect();
    let mut notes = vec!["Exclude: Weak Coverage, Threshold Too Low, PDCCH".to_string()];

    if handovers > 0 {
        excluded_causes.insert(CauseCategory::NeighborMissing);
        notes.push(format!("ho={handovers}>0 Exclude Neighbor Missing"));
    }
    if mean_sinr > 12.0 {
        excluded_causes.extend([CauseCategory::Overlap, CauseCategory::OverlapRf]);
        notes.push(format!("sinr={mean_sinr:.1}>12 Exclude Overlap"));
    }
    if mean_sinr > 8.0 {
        excluded_causes.extend([CauseCategory::TransportAnomaly, CauseCategory::UplinkIssue]);
        notes.push(format!("sinr={mean_sinr:.1}>8 Exclude Transport Anomaly"));
    }

    let excluded_options = excluded_causes
        .iter()
        .filter_map(|cause| mapping.get(*cause))
        .map(str::to_string)
        .collect();

    // The weak-coverage option stays the fallback even though it was ruled
    // out; escalation decides among the remaining candidates.
    let cause = CauseCategory::WeakCoverageRf;
    ClassificationResult {
        cause,
        confidence: Confidence::Low,
        chosen_option: lookup_option(cause, &mapping, &case.option_labels),
        rationale: format!("Low Confidence: {}", notes.join(", ")),
        excluded_options,
    }
}

fn lookup_option(cause: CauseCategory, mapping: &OptionMapping, options: &[String]) -> String {
    let listed = |c: CauseCategory| {
        mapping
            .get(c)
            .filter(|opt| options.iter().any(|o| o.as_str() == *opt))
    };

    listed(cause)
        .or_else(|| listed(CauseCategory::WeakCoverageRf))
        .map(str::to_string)
        .or_else(|| options.get(5.min(options.len().saturating_sub(1))).cloned())
        .unwrap_or_else(|| "F".to_string())
}

/// The escalation candidate set left after elimination.
///
/// The letter alphabet minus `excluded`, restricted to the case's own
/// options. Falls back to the full option list when nothing survives.
pub fn candidate_options(excluded: &BTreeSet<String>, options: &[String]) -> Vec<String> {
    let remaining: Vec<String> = options
        .iter()
        .filter(|o| OPTION_ALPHABET.contains(&o.as_str()) && !excluded.contains(*o))
        .cloned()
        .collect();

    if remaining.is_empty() {
        options.to_vec()
    } else {
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: &str = "A: RF, power parameters or site construction lead to weak coverage\n\
        B: Missing neighbor configuration\n\
        C: RF or power parameters cause severe overlapping coverage\n\
        D: Intra-frequency handover threshold is too low, frequent handover\n\
        E: PDCCH resource management parameters unreasonable\n\
        F: Test server or transport anomaly\n\
        G: Inter-frequency handover threshold unreasonable\n\
        H: Network capacity insufficient\n\
        I: Intra-frequency handover threshold is too high\n";

    fn case() -> Case {
        Case::new("tel-1", format!("Drive Test Data:\n{OPTIONS}"))
    }

    fn signals(min_rsrp: f64, mean_sinr: f64, max_cce: f64, handovers: u32) -> TelecomSignals {
        TelecomSignals {
            min_rsrp: Some(min_rsrp),
            mean_sinr: Some(mean_sinr),
            max_cce: Some(max_cce),
            handovers,
            rows: 4,
        }
    }

    #[test]
    fn test_weak_coverage_short_circuit() {
        let result = classify_telecom(&case(), &signals(-105.0, 15.0, 0.9, 5));
        assert_eq!(result.cause, CauseCategory::WeakCoverageRf);
        assert!(result.is_high());
        assert_eq!(result.chosen_option, "A");
        assert!(result.excluded_options.is_empty());
    }

    #[test]
    fn test_handover_then_cce_short_circuits() {
        let result = classify_telecom(&case(), &signals(-90.0, 5.0, 0.9, 3));
        assert_eq!(result.cause, CauseCategory::ThresholdLow);
        assert_eq!(result.chosen_option, "D");

        let result = classify_telecom(&case(), &signals(-90.0, 5.0, 0.5, 1));
        assert_eq!(result.cause, CauseCategory::Pdcch);
        assert_eq!(result.chosen_option, "E");
        assert!(result.rationale.contains("max_cce=0.50"));
    }

    #[test]
    fn test_elimination_with_good_sinr() {
        let result = classify_telecom(&case(), &signals(-90.0, 13.0, 0.1, 1));
        assert_eq!(result.confidence, Confidence::Low);
        for opt in ["A", "B", "C", "D", "E", "F"] {
            assert!(result.excluded_options.contains(opt), "{opt} should be excluded");
        }
        let candidates = candidate_options(&result.excluded_options, &case().option_labels);
        assert_eq!(candidates, vec!["G", "H", "I"]);
    }

    #[test]
    fn test_elimination_keeps_neighbor_without_handovers() {
        let result = classify_telecom(&case(), &signals(-90.0, 9.0, 0.1, 0));
        assert!(!result.excluded_options.contains("B"));
        assert!(!result.excluded_options.contains("C"));
        assert!(result.excluded_options.contains("F"));
        assert_eq!(result.chosen_option, "A");
    }

    #[test]
    fn test_missing_signals_use_defaults() {
        // -100 is not below the floor, so no short-circuit fires
        let result = classify_telecom(&case(), &TelecomSignals::default());
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.rationale.starts_with("Low Confidence"));
    }

    #[test]
    fn test_positional_fallback_without_mapping() {
        let case = Case::new("tel-2", "Throughput dropped\nA: x\nB: y\nC: z\n");
        let result = classify_telecom(&case, &TelecomSignals::default());
        assert_eq!(result.chosen_option, "C");

        let case = Case::new("tel-3", "Throughput dropped");
        let result = classify_telecom(&case, &TelecomSignals::default());
        assert_eq!(result.chosen_option, "6");
    }

    #[test]
    fn test_candidates_fall_back_to_all_options() {
        let excluded: BTreeSet<String> = ["A", "B"].into_iter().map(String::from).collect();
        let options = vec!["A".to_string(), "B".to_string()];
        assert_eq!(candidate_options(&excluded, &options), options);
    }
}
