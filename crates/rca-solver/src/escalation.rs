//! Escalation orchestrator: bounded-concurrency oracle calls with retry.
//!
//! ```text
//! tasks ──► initial pass  (JoinSet × Semaphore(max_workers))
//!              │ failed
//!              ▼
//!           retry round 1..=N  (pause, Semaphore(max(1, workers/2)))
//!              │ still failed
//!              ▼
//!           fallback answers stand
//! ```
//!
//! Each task walks `Pending → InFlight → {Accepted, Failed}`; a retry round
//! reuses the failed task as-is. Every landed outcome is written to the
//! checkpoint's oracle cache under the shared progress lock together with
//! its statistics update.
//!
//! Cancellation stops dispatch, aborts in-flight calls, flushes what has
//! landed and reports [`EscalationRun::Interrupted`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use diagnosis::{extract_answer, Case, Diagnosis};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointError, OracleOutcome, SharedProgress};
use crate::config::EscalationSettings;
use crate::oracle::{Oracle, OracleRequest};
use crate::prompts::build_request;

// ── Tasks ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationTask {
    pub case_id: String,
    pub request: OracleRequest,
    /// The oracle's reply is mapped into this set.
    pub candidates: Vec<String>,
    /// Used when every attempt fails.
    pub fallback_answer: String,
}

impl EscalationTask {
    pub fn from_diagnosis(case: &Case, diagnosis: &Diagnosis, char_limit: usize) -> Self {
        let candidates = if diagnosis.candidates.is_empty() {
            case.option_labels.clone()
        } else {
            diagnosis.candidates.clone()
        };
        Self {
            case_id: case.id.clone(),
            request: build_request(&case.raw_text, &candidates, char_limit),
            candidates,
            fallback_answer: diagnosis.rule_answer.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Accepted,
    Failed,
}

// ── Retry policy ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_rounds: u32,
    pub retry_pause: Duration,
    pub checkpoint_every: usize,
    pub workers: usize,
}

impl RetryPolicy {
    pub fn from_settings(settings: &EscalationSettings, workers: usize) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            retry_rounds: settings.retry_rounds,
            retry_pause: settings.retry_pause(),
            checkpoint_every: settings.checkpoint_every.max(1),
            workers: workers.max(1),
        }
    }

    /// Concurrency used by batch retry rounds.
    pub fn retry_workers(&self) -> usize {
        (self.workers / 2).max(1)
    }
}

/// Result of running one task through the attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    Accepted { answer: String, attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
    Cancelled,
}

/// Run one task until an answer is accepted, the attempt budget is spent,
/// or `cancel` fires. No backoff follows the final attempt.
pub async fn call_with_retry(
    oracle: &dyn Oracle,
    task: &EscalationTask,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> CallResult {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CallResult::Cancelled,
            reply = oracle.complete(&task.request) => reply,
        };

        match reply {
            Ok(text) => {
                let answer = extract_answer(&text, &task.candidates);
                debug!(case = %task.case_id, attempt, %answer, "Oracle answer extracted");
                return CallResult::Accepted {
                    answer,
                    attempts: attempt,
                };
            }
            Err(e) => {
                let category = e.retry_category();
                warn!(
                    case = %task.case_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    %category,
                    "Oracle call failed: {e}"
                );
                last_error = e.to_string();

                if attempt < policy.max_attempts {
                    let delay = category.backoff(attempt);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return CallResult::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    CallResult::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationRun {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Initial,
    Retry(u32),
}

enum PassResult {
    Done(Vec<EscalationTask>),
    Interrupted,
}

pub struct Orchestrator {
    oracle: Arc<dyn Oracle>,
    progress: SharedProgress,
    policy: RetryPolicy,
    cancel: CancellationToken,
    states: BTreeMap<String, TaskState>,
}

impl Orchestrator {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        progress: SharedProgress,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            oracle,
            progress,
            policy,
            cancel,
            states: BTreeMap::new(),
        }
    }

    pub fn state(&self, case_id: &str) -> Option<TaskState> {
        self.states.get(case_id).copied()
    }

    /// Run all tasks: the initial pass, then batch retry rounds for the
    /// failures. The checkpoint is flushed after every pass.
    pub async fn run(&mut self, tasks: Vec<EscalationTask>) -> Result<EscalationRun, CheckpointError> {
        if tasks.is_empty() {
            return Ok(EscalationRun::Completed);
        }
        for task in &tasks {
            self.states.insert(task.case_id.clone(), TaskState::Pending);
        }

        info!(tasks = tasks.len(), workers = self.policy.workers, "Starting oracle escalation");
        let mut failed = match self.run_pass(tasks, self.policy.workers, Pass::Initial).await? {
            PassResult::Done(failed) => failed,
            PassResult::Interrupted => return Ok(EscalationRun::Interrupted),
        };

        for round in 1..=self.policy.retry_rounds {
            if failed.is_empty() {
                break;
            }
            info!(
                round,
                failed = failed.len(),
                workers = self.policy.retry_workers(),
                pause_secs = self.policy.retry_pause.as_secs(),
                "Starting retry round"
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.progress.flush()?;
                    return Ok(EscalationRun::Interrupted);
                }
                _ = tokio::time::sleep(self.policy.retry_pause) => {}
            }

            let workers = self.policy.retry_workers();
            failed = match self.run_pass(failed, workers, Pass::Retry(round)).await? {
                PassResult::Done(failed) => failed,
                PassResult::Interrupted => return Ok(EscalationRun::Interrupted),
            };
        }

        if !failed.is_empty() {
            warn!(
                failed = failed.len(),
                "Oracle escalation exhausted; rule answers stand for these cases"
            );
        }
        Ok(EscalationRun::Completed)
    }

    async fn run_pass(
        &mut self,
        tasks: Vec<EscalationTask>,
        workers: usize,
        pass: Pass,
    ) -> Result<PassResult, CheckpointError> {
        let sem = Arc::new(Semaphore::new(workers));
        let policy = Arc::new(self.policy.clone());
        let mut join_set: JoinSet<(EscalationTask, CallResult)> = JoinSet::new();

        for task in tasks {
            if self.cancel.is_cancelled() {
                break;
            }
            self.states.insert(task.case_id.clone(), TaskState::InFlight);

            let sem = sem.clone();
            let oracle = self.oracle.clone();
            let policy = policy.clone();
            let cancel = self.cancel.clone();

            join_set.spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (task, CallResult::Cancelled),
                };
                let result = call_with_retry(oracle.as_ref(), &task, &policy, &cancel).await;
                (task, result)
            });
        }

        let mut failed = Vec::new();
        let mut completed = 0usize;
        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    join_set.abort_all();
                    break;
                }
                joined = join_set.join_next() => joined,
            };

            match joined {
                None => break,
                Some(Ok((task, result))) => {
                    if let Some(outcome) = self.apply(&task, result, pass) {
                        completed += 1;
                        if !matches!(outcome, TaskState::Accepted) {
                            failed.push(task);
                        }
                        if completed % self.policy.checkpoint_every == 0 {
                            if let Err(e) = self.progress.flush() {
                                warn!("Periodic checkpoint flush failed: {e}");
                            }
                        }
                    }
                }
                Some(Err(e)) => warn!(error = %e, "oracle worker panicked"),
            }
        }

        self.progress.flush()?;

        if self.cancel.is_cancelled() {
            info!(?pass, landed = completed, "Escalation interrupted; progress saved");
            return Ok(PassResult::Interrupted);
        }

        debug!(?pass, completed, failed = failed.len(), "Escalation pass finished");
        Ok(PassResult::Done(failed))
    }

    /// Record one landed result. Returns the task's new state, or `None` for
    /// a cancelled call, which leaves nothing behind.
    fn apply(&mut self, task: &EscalationTask, result: CallResult, pass: Pass) -> Option<TaskState> {
        let (outcome, state) = match result {
            CallResult::Accepted { answer, attempts } => {
                info!(case = %task.case_id, %answer, attempts, "Oracle answer accepted");
                (
                    OracleOutcome::Accepted { answer, attempts },
                    TaskState::Accepted,
                )
            }
            CallResult::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    case = %task.case_id,
                    fallback = %task.fallback_answer,
                    "Oracle attempts exhausted: {last_error}"
                );
                (
                    OracleOutcome::Failed {
                        attempts,
                        last_error,
                    },
                    TaskState::Failed,
                )
            }
            CallResult::Cancelled => return None,
        };

        {
            let mut guard = self.progress.lock();
            let accepted = state == TaskState::Accepted;
            match pass {
                Pass::Initial => guard.stats.record_initial(accepted),
                Pass::Retry(_) if accepted => guard.stats.record_recovered(),
                Pass::Retry(_) => {}
            }
            guard.checkpoint.record_outcome(&task.case_id, outcome);
        }

        self.states.insert(task.case_id.clone(), state);
        Some(state)
    }
}
