//! Oracle prompt construction.
//!
//! Telecom-flavoured cases get a drive-test analysis preamble; everything
//! else gets a short generic one. Both ask for the option inside `\boxed{}`
//! so the answer ladder's first pattern usually hits.

use crate::oracle::OracleRequest;

/// Text markers that select [`TELECOM_SYSTEM`].
const TELECOM_MARKERS: &[&str] = &[
    "RSRP",
    "SINR",
    "PCI",
    "Drive Test Data",
    "Serving RSRP",
    "Throughput",
    "throughput",
];

pub const TELECOM_SYSTEM: &str = "\
You are a 5G radio network troubleshooting expert.
You receive a fault description (drive test records, engineering parameters) and a \
list of candidate options. The list was already narrowed by rules, so the correct \
option is in it.

# How to analyse
1. Find where throughput degrades. Note whether SINR turns negative (interference) \
or RSRP falls (coverage).
2. Compare serving and neighbour RSRP. Several neighbours within 3 dB of the serving \
cell means overlap; one neighbour more than 5 dB stronger means a dominant neighbour.
3. Check handover behaviour. A3 offsets of 5 dB or more with a stronger neighbour and \
a late or missing handover point to a threshold set too high. A strong neighbour with \
no PCI change at all points to a missing neighbour relation. A distant serving cell \
with strong signal but poor SINR points to overshooting.
4. Good RSRP and SINR with low throughput points to transport or server problems.

# Output
Analysis: one or two sentences on the data pattern.
Answer: the option in \\boxed{}, for example \\boxed{A}
";

pub const GENERIC_SYSTEM: &str = "\
You are a network technology expert.
Work out the root cause or the correct definition from the question and the \
candidate options.

# Output
Analysis: brief reasoning
Answer: \\boxed{option}
";

pub fn is_telecom_text(text: &str) -> bool {
    TELECOM_MARKERS.iter().any(|m| text.contains(m))
}

/// Build the oracle request for a case.
///
/// The case text is cut to `char_limit` characters; the candidate list and
/// answer instruction always follow it intact.
pub fn build_request(case_text: &str, candidates: &[String], char_limit: usize) -> OracleRequest {
    let system = if is_telecom_text(case_text) {
        TELECOM_SYSTEM
    } else {
        GENERIC_SYSTEM
    };

    let truncated: String = case_text.chars().take(char_limit).collect();
    let user = format!(
        "{truncated}\n\nAvailable options: {}\n\nOutput ONLY the option letter:",
        candidates.join(", ")
    );

    OracleRequest {
        system: system.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telecom_text_selects_telecom_preamble() {
        let req = build_request("Serving RSRP fell sharply", &["A".into()], 5000);
        assert_eq!(req.system, TELECOM_SYSTEM);

        let req = build_request("What does DNS resolve?", &["A".into()], 5000);
        assert_eq!(req.system, GENERIC_SYSTEM);
    }

    #[test]
    fn user_prompt_truncates_case_text_only() {
        let text = "x".repeat(6000);
        let req = build_request(&text, &["G".into(), "H".into()], 5000);
        assert!(req.user.starts_with(&"x".repeat(5000)));
        assert!(!req.user.contains(&"x".repeat(5001)));
        assert!(req
            .user
            .ends_with("\n\nAvailable options: G, H\n\nOutput ONLY the option letter:"));
    }
}
