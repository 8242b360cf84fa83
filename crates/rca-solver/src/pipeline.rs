//! End-to-end solve: rules, escalation, aggregation, submission.
//!
//! ```text
//! load checkpoint ─► load cases ─► diagnose unprocessed cases (sequential)
//!                                        │ low confidence, no accepted cache entry
//!                                        ▼
//!                                  Orchestrator::run
//!                                        │ completed        │ interrupted
//!                                        ▼                  ▼
//!                        finalize rows in input order    flush, stop
//!                                        ▼
//!                                  submission.csv
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use diagnosis::{diagnose, Case, CaseLibrary, Diagnosis};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::{ResultAggregator, SolveStats};
use crate::checkpoint::{CheckpointError, CheckpointStore, SharedProgress};
use crate::config::SolverConfig;
use crate::dataset::{load_cases, write_submission, DatasetError};
use crate::escalation::{EscalationRun, EscalationTask, Orchestrator, RetryPolicy};
use crate::oracle::Oracle;
use crate::telemetry::SolveLog;

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every case finalized and the submission written.
    Completed { stats: SolveStats, submission: PathBuf },
    /// Stopped by cancellation; the checkpoint holds everything that landed.
    Interrupted { stats: SolveStats },
}

pub struct Solver {
    config: SolverConfig,
    library: CaseLibrary,
    oracle: Arc<dyn Oracle>,
    cancel: CancellationToken,
}

impl Solver {
    pub fn new(
        config: SolverConfig,
        library: CaseLibrary,
        oracle: Arc<dyn Oracle>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            library,
            oracle,
            cancel,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome, SolveError> {
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|e| SolveError::OutputDir {
            path: output_dir.clone(),
            source: e,
        })?;

        let store = CheckpointStore::new(self.config.progress_path());
        let checkpoint = store.load()?;
        let log = SolveLog::new(self.config.solve_log_path());
        if checkpoint.is_fresh() {
            log.reset();
        }

        let cases = load_cases(&self.config.test_file)?;
        let progress = SharedProgress::new(checkpoint, store);

        let (decided, tasks) = self.diagnose_all(cases, &progress);
        progress.stats().log_summary("rules");
        info!(
            pending = decided.len(),
            escalations = tasks.len(),
            "Rule processing complete"
        );

        let policy = RetryPolicy::from_settings(&self.config.escalation, self.config.max_workers);
        let mut orchestrator = Orchestrator::new(
            self.oracle.clone(),
            progress.clone(),
            policy,
            self.cancel.clone(),
        );
        if orchestrator.run(tasks).await? == EscalationRun::Interrupted {
            let stats = progress.stats();
            stats.log_summary("interrupted");
            return Ok(RunOutcome::Interrupted { stats });
        }

        let finalized = ResultAggregator::new(&progress, &log).finalize_all(&decided);
        progress.flush()?;
        debug!(finalized, "Aggregation complete");

        let submission = self.config.submission_path();
        let results = progress.checkpoint().results;
        write_submission(&submission, &results)?;

        let stats = progress.stats();
        stats.log_summary("done");
        Ok(RunOutcome::Completed { stats, submission })
    }

    /// Classify every case not yet finalized. Returns the decided cases in
    /// input order and the escalation tasks still owed.
    ///
    /// The progress lock is only taken to snapshot what is already done and
    /// to record statistics afterwards; diagnosis itself runs unlocked.
    fn diagnose_all(
        &self,
        cases: Vec<Case>,
        progress: &SharedProgress,
    ) -> (Vec<(Case, Diagnosis)>, Vec<EscalationTask>) {
        let (processed, answered): (BTreeSet<String>, BTreeSet<String>) = {
            let guard = progress.lock();
            let answered = guard
                .checkpoint
                .oracle_cache
                .iter()
                .filter(|(_, outcome)| outcome.accepted_answer().is_some())
                .map(|(id, _)| id.clone())
                .collect();
            (guard.checkpoint.processed_ids.clone(), answered)
        };

        let char_limit = self.config.escalation.prompt_char_limit;
        let mut decided = Vec::with_capacity(cases.len());
        let mut tasks = Vec::new();
        let mut stats = SolveStats::default();

        for case in cases {
            if processed.contains(&case.id) {
                continue;
            }

            let diagnosis = diagnose(&case, &self.library);
            stats.record(&diagnosis);
            debug!(
                case = %case.id,
                kind = %diagnosis.kind,
                answer = %diagnosis.rule_answer,
                escalate = diagnosis.needs_escalation(),
                "Diagnosed"
            );

            if diagnosis.needs_escalation() && !answered.contains(&case.id) {
                tasks.push(EscalationTask::from_diagnosis(&case, &diagnosis, char_limit));
            }
            decided.push((case, diagnosis));
        }

        progress.lock().stats.absorb_rule_counts(&stats);
        (decided, tasks)
    }
}
