//! Root-cause solver runtime.
//!
//! Async half of the system: configuration, the oracle client, the
//! escalation orchestrator, checkpointing and result aggregation. The
//! deterministic diagnosis lives in the `diagnosis` crate.

pub mod aggregator;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod escalation;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod telemetry;

pub use aggregator::{ResultAggregator, SolveStats};
pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointStore, OracleOutcome, OutputRow, SharedProgress,
};
pub use config::{ConfigError, EscalationSettings, SolverConfig};
pub use escalation::{
    call_with_retry, EscalationRun, EscalationTask, Orchestrator, RetryPolicy, TaskState,
};
pub use oracle::{HttpOracle, Oracle, OracleError, OracleErrorKind, OracleRequest, RetryCategory};
pub use pipeline::{RunOutcome, SolveError, Solver};
