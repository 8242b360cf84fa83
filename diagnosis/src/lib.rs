//! Drive-test root-cause diagnosis library
//!
//! Deterministic half of the solver. Everything here is synchronous and
//! side-effect free apart from the case-library cache.
//!
//! ```text
//! Case text
//!   ├─ CaseKind::Standard           → extract_features       → standard cascade
//!   ├─ CaseKind::NonstandardTelecom → extract_telecom_signals → short-circuits / elimination
//!   └─ CaseKind::Other              → extract_snapshot        → CaseLibrary::find_similar
//!                                                               (always escalates)
//! ```
//!
//! # Modules
//!
//! - [`taxonomy`]: cause categories and keyword tables
//! - [`case`]: the case model, option parsing and option back-mapping
//! - [`features`]: table parsing and feature extraction
//! - [`rules`]: the two rule procedures
//! - [`library`]: labeled case library with similarity retrieval
//! - [`answer`]: oracle answer extraction and submission formatting
//! - [`diagnose`]: per-case routing

pub mod answer;
pub mod case;
pub mod diagnose;
pub mod features;
pub mod library;
pub mod rules;
pub mod taxonomy;

pub use answer::{extract_answer, format_answer};
pub use case::{extract_options, Case, CaseKind, CauseCodeMap, OptionMapping};
pub use diagnose::{diagnose, Diagnosis};
pub use features::{
    extract_features, extract_snapshot, extract_telecom_signals, FeatureSnapshot, Features,
    TelecomSignals,
};
pub use library::{similarity, CaseLibrary, LibraryEntry, LibraryError, Provenance, SimilarCase};
pub use rules::{ClassificationResult, Confidence};
pub use taxonomy::{CauseCategory, CauseCode};
