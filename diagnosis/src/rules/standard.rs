//! Standard procedure: ordered threshold cascade over drive-test [`Features`].

use crate::case::{Case, CauseCodeMap, OptionMapping};
use crate::features::Features;
use crate::taxonomy::{CauseCategory, CauseCode};

use super::{ClassificationResult, Confidence};

/// Feature values with the rule defaults applied for absent fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInputs {
    pub num_neighbors: usize,
    pub handovers: u32,
    pub max_speed: f64,
    pub avg_rb: f64,
    pub min_rsrp: f64,
    pub max_tilt: f64,
    pub min_tilt: f64,
    pub total_tilt: f64,
    pub has_pci_conflict: bool,
}

impl From<&Features> for RuleInputs {
    fn from(f: &Features) -> Self {
        Self {
            num_neighbors: f.num_neighbors,
            handovers: f.handovers,
            max_speed: f.max_speed.unwrap_or(0.0),
            avg_rb: f.avg_rb.unwrap_or(200.0),
            min_rsrp: f.min_rsrp.unwrap_or(-80.0),
            max_tilt: f.max_tilt.unwrap_or(0.0),
            min_tilt: f.min_tilt.unwrap_or(0.0),
            total_tilt: f.total_tilt.unwrap_or(0.0),
            has_pci_conflict: f.has_pci_conflict,
        }
    }
}

struct Rule {
    cause: CauseCategory,
    confidence: Confidence,
    matches: fn(&RuleInputs) -> bool,
    describe: fn(&RuleInputs) -> String,
}

/// The cascade, in priority order. The last entry always matches.
const CASCADE: &[Rule] = &[
    Rule {
        cause: CauseCategory::Overlap,
        confidence: Confidence::High,
        matches: |x| x.num_neighbors >= 3,
        describe: |x| format!("num_neighbors={}>=3 => C4(Overlap Coverage)", x.num_neighbors),
    },
    Rule {
        cause: CauseCategory::Handover,
        confidence: Confidence::High,
        matches: |x| x.handovers >= 3,
        describe: |x| format!("handovers={}>=3 => C5(Frequent Handover)", x.handovers),
    },
    Rule {
        cause: CauseCategory::Overshoot,
        confidence: Confidence::High,
        matches: |x| x.handovers == 2,
        describe: |x| format!("handovers={}==2 => C2(Overshooting)", x.handovers),
    },
    Rule {
        cause: CauseCategory::HighSpeed,
        confidence: Confidence::High,
        matches: |x| x.max_speed > 40.0,
        describe: |x| format!("max_speed={:.1}>40 => C7(High Speed)", x.max_speed),
    },
    Rule {
        cause: CauseCategory::LowRb,
        confidence: Confidence::High,
        matches: |x| x.avg_rb < 170.0,
        describe: |x| format!("avg_rb={:.1}<170 => C8(Low RB)", x.avg_rb),
    },
    Rule {
        cause: CauseCategory::PciConflict,
        confidence: Confidence::High,
        matches: |x| x.has_pci_conflict,
        describe: |_| "PCI mod 30 conflict => C6".to_string(),
    },
    Rule {
        cause: CauseCategory::NeighborHigher,
        confidence: Confidence::High,
        matches: |x| x.max_tilt < 12.0,
        describe: |x| format!("max_tilt={:.1}<12 => C3(Neighbor Better)", x.max_tilt),
    },
    Rule {
        cause: CauseCategory::NeighborHigher,
        confidence: Confidence::High,
        matches: |x| x.total_tilt < 19.0,
        describe: |x| format!("total_tilt={:.1}<19 => C3(Neighbor Better)", x.total_tilt),
    },
    Rule {
        cause: CauseCategory::NeighborHigher,
        confidence: Confidence::High,
        matches: |x| x.min_tilt < 6.0,
        describe: |x| format!("min_tilt={:.1}<6 => C3(Neighbor Better)", x.min_tilt),
    },
    Rule {
        cause: CauseCategory::NeighborHigher,
        confidence: Confidence::High,
        matches: |x| x.min_tilt < 10.0 && x.min_rsrp > -89.0,
        describe: |x| {
            format!(
                "min_tilt={:.1}<10 AND min_rsrp={:.1}>-89 => C3",
                x.min_tilt, x.min_rsrp
            )
        },
    },
    Rule {
        cause: CauseCategory::WeakCoverage,
        confidence: Confidence::High,
        matches: |x| x.min_rsrp < -90.0,
        describe: |x| format!("min_rsrp={:.1}<-90 => C1(Weak Coverage)", x.min_rsrp),
    },
    Rule {
        cause: CauseCategory::WeakCoverage,
        confidence: Confidence::High,
        matches: |x| x.max_tilt > 29.0,
        describe: |x| format!("max_tilt={:.1}>29 => C1(Weak Coverage)", x.max_tilt),
    },
    Rule {
        cause: CauseCategory::WeakCoverage,
        confidence: Confidence::High,
        matches: |x| x.total_tilt > 52.0,
        describe: |x| format!("total_tilt={:.1}>52 => C1(Weak Coverage)", x.total_tilt),
    },
    Rule {
        cause: CauseCategory::WeakCoverage,
        confidence: Confidence::High,
        matches: |x| x.min_tilt > 25.0,
        describe: |x| format!("min_tilt={:.1}>25 => C1(Weak Coverage)", x.min_tilt),
    },
    Rule {
        cause: CauseCategory::WeakCoverage,
        confidence: Confidence::Low,
        matches: |x| x.min_rsrp < -88.5 && x.total_tilt > 39.0 && x.max_tilt >= 22.0,
        describe: |_| "C1/C3 Boundary (Lean C1)".to_string(),
    },
    Rule {
        cause: CauseCategory::NeighborHigher,
        confidence: Confidence::Low,
        matches: |x| x.min_tilt < 10.0 || x.total_tilt <= 35.0,
        describe: |_| "C1/C3 Boundary (Lean C3)".to_string(),
    },
    Rule {
        cause: CauseCategory::NeighborHigher,
        confidence: Confidence::Low,
        matches: |_| true,
        describe: |_| "C1/C3 Boundary (Default C3)".to_string(),
    },
];

/// Run the cascade. Without features the result is C3 at low confidence.
pub fn evaluate_cascade(features: Option<&Features>) -> (CauseCategory, Confidence, String) {
    let Some(features) = features else {
        return (
            CauseCategory::NeighborHigher,
            Confidence::Low,
            "Default C3".to_string(),
        );
    };

    let inputs = RuleInputs::from(features);
    CASCADE
        .iter()
        .enumerate()
        .find(|(_, rule)| (rule.matches)(&inputs))
        .map(|(idx, rule)| {
            (
                rule.cause,
                rule.confidence,
                format!("Rule {}: {}", idx + 1, (rule.describe)(&inputs)),
            )
        })
        .unwrap_or_else(|| {
            (
                CauseCategory::NeighborHigher,
                Confidence::Low,
                "Default C3".to_string(),
            )
        })
}

/// Classify a standard case.
///
/// A complete option set resolves the cause through the keyword mapping; a
/// filtered set goes through the C1..C8 back-map so the answer never points
/// at an option that was removed.
pub fn classify_standard(case: &Case, features: Option<&Features>) -> ClassificationResult {
    let (cause, confidence, rationale) = evaluate_cascade(features);

    let chosen_option = if case.has_full_option_set() {
        let mapping = OptionMapping::from_text(&case.raw_text);
        lookup_full_option(cause, &mapping, &case.option_labels)
    } else {
        let codes = CauseCodeMap::from_text(&case.raw_text);
        resolve_filtered_option(cause, &codes, &case.option_labels)
    };

    ClassificationResult {
        cause,
        confidence,
        chosen_option,
        rationale,
        excluded_options: Default::default(),
    }
}

fn listed<'a>(candidate: Option<&'a str>, options: &[String]) -> Option<&'a str> {
    candidate.filter(|c| options.iter().any(|o| o.as_str() == *c))
}

/// Option lookup for a complete option set.
fn lookup_full_option(cause: CauseCategory, mapping: &OptionMapping, options: &[String]) -> String {
    if let Some(opt) = listed(mapping.get(cause), options) {
        return opt.to_string();
    }

    let backups: &[CauseCategory] = match cause {
        CauseCategory::NeighborHigher => &[CauseCategory::Overlap, CauseCategory::NeighborHigher],
        CauseCategory::Overlap => &[CauseCategory::NeighborHigher, CauseCategory::Overlap],
        _ => &[],
    };
    if let Some(opt) = backups
        .iter()
        .find_map(|b| listed(mapping.get(*b), options))
    {
        return opt.to_string();
    }

    options
        .get(2.min(options.len().saturating_sub(1)))
        .cloned()
        .unwrap_or_else(|| "3".to_string())
}

/// Re-resolve a cause against a filtered option set via the C1..C8 back-map.
///
/// C1 (weak coverage) and C3 (neighbour higher) are the most confusable
/// pair: when the computed cause has no option, whichever of the two is
/// present takes over. With both present, C1 is kept only when the cascade
/// itself chose weak coverage.
pub fn resolve_filtered_option(
    cause: CauseCategory,
    codes: &CauseCodeMap,
    options: &[String],
) -> String {
    if let Some(opt) = cause
        .code()
        .and_then(|code| listed(codes.option_for(code), options))
    {
        return opt.to_string();
    }

    let c1 = listed(codes.option_for(CauseCode::C1), options);
    let c3 = listed(codes.option_for(CauseCode::C3), options);
    let picked = match (c1, c3) {
        (Some(c1), Some(c3)) => Some(if cause == CauseCategory::WeakCoverage {
            c1
        } else {
            c3
        }),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    };

    picked
        .map(str::to_string)
        .or_else(|| options.first().cloned())
        .unwrap_or_else(|| "1".to_string())
}
