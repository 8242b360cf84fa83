//! Rule Classifier: deterministic ordered-rule decision procedures
//!
//! Two pure procedures, selected by [`CaseKind`](crate::case::CaseKind):
//!
//! ```text
//! Standard case
//!   Features ──→ ordered cascade (first match wins) ──→ cause + confidence
//!                                                     └─→ option lookup
//!                                                         (re-resolved via C1..C8
//!                                                          when options were filtered)
//!
//! Nonstandard telecom case
//!   TelecomSignals ──→ three high-confidence short-circuits
//!                  └─→ otherwise elimination → reduced candidate set, low confidence
//! ```
//!
//! Neither procedure holds state; both can be tested in isolation.

pub mod standard;
pub mod telecom;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::taxonomy::CauseCategory;

pub use standard::{classify_standard, resolve_filtered_option};
pub use telecom::{candidate_options, classify_telecom, OPTION_ALPHABET};

/// Confidence tier of a rule decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Trusted as final.
    High,
    /// Triggers escalation.
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Output of a rule procedure for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub cause: CauseCategory,
    pub confidence: Confidence,
    pub chosen_option: String,
    /// Human-readable rule trace citing the triggering values.
    pub rationale: String,
    /// Options ruled out by elimination. Empty on the standard path.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_options: BTreeSet<String>,
}

impl ClassificationResult {
    pub fn is_high(&self) -> bool {
        self.confidence == Confidence::High
    }

    /// Options an escalation may choose from.
    pub fn candidates(&self, options: &[String]) -> Vec<String> {
        if self.excluded_options.is_empty() {
            options.to_vec()
        } else {
            candidate_options(&self.excluded_options, options)
        }
    }
}
