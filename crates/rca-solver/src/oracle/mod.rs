//! Oracle seam: the external model consulted for low-confidence cases.
//!
//! [`Oracle`] is the only async boundary the escalation path depends on.
//! [`client::HttpOracle`] speaks the OpenAI-compatible chat protocol; tests
//! substitute scripted in-process implementations.

pub mod client;
pub mod errors;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::HttpOracle;
pub use errors::{OracleError, OracleErrorKind, RetryCategory};

/// One oracle query: system instructions plus the user prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Single attempt. Retries are the caller's business.
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError>;
}
