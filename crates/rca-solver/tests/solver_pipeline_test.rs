//! End-to-end solver runs against scripted in-process oracles.
//!
//! All tests run on a paused clock so retry backoffs and round pauses
//! elapse instantly.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use diagnosis::features::extractor::{
    COL_DIGITAL_TILT, COL_DL_RB, COL_MECHANICAL_TILT, COL_SERVING_PCI, COL_SERVING_RSRP, COL_SPEED,
    COL_TOP1_PCI,
};
use diagnosis::{diagnose, Case, CaseKind, CaseLibrary, Confidence};
use rca_solver::checkpoint::{Checkpoint, CheckpointStore, OracleOutcome};
use rca_solver::pipeline::{RunOutcome, SolveError, Solver};
use rca_solver::telemetry::SolveLog;
use rca_solver::{CheckpointError, Oracle, OracleError, OracleErrorKind, OracleRequest, SolverConfig};
use tokio_util::sync::CancellationToken;

// ── Scripted oracle ──────────────────────────────────────────────────────

type Responder = dyn Fn(&str, usize) -> Reply + Send + Sync;

enum Reply {
    Text(&'static str),
    Fail(OracleErrorKind),
    Hang,
}

/// Replies are chosen from the prompt text and the per-prompt call count.
struct ScriptedOracle {
    responder: Box<Responder>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedOracle {
    fn new(responder: impl Fn(&str, usize) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        })
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn calls_mentioning(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(prompt, _)| prompt.contains(marker))
            .map(|(_, n)| *n)
            .sum()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(request.user.clone()).or_insert(0);
            *n += 1;
            *n
        };
        match (self.responder)(&request.user, n) {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail(kind) => Err(OracleError::new(kind, "scripted failure")),
            Reply::Hang => std::future::pending().await,
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const DNS_CASE: &str = "Which service maps names to addresses (dns-marker)?\nA: NTP\nB: DNS\nC: DHCP";
const NAT_CASE: &str = "Which function rewrites source addresses (nat-marker)?\nA: NAT\nB: ARP\nC: BGP";
const WEAK_COVERAGE_CASE: &str = "Throughput dropped on the route.\n\
| Time | UE | Serving PCI | Serving RSRP(dBm) | Serving SINR(dB) |\n\
| 10:00 | 1 | 100 | -112 | 3 |\n\
| 10:01 | 1 | 100 | -115 | 2 |\n\
A: weak coverage at the far end\n\
B: PDCCH resources insufficient\n\
C: handover threshold too low";

const LOOSE_TELECOM_CASE: &str = "Drive Test Data:\n\
| Time | UE | Serving PCI | Serving RSRP(dBm) | Serving SINR(dB) | CCE Fail Rate |\n\
|:-----|:---|:------------|:------------------|:-----------------|:--------------|\n\
| 10:00 | 1 | 100 | -88 | 14 | 0.1 |\n\
| 10:01 | 1 | 200 | -90 | 15 | 0.2 |\n\
| 10:02 | 1 | 200 | -91 | 13 | 0.1 |\n\
A: RF, power parameters or site construction lead to weak coverage\n\
B: Missing neighbor configuration\n\
C: RF or power parameters cause severe overlapping coverage\n\
D: Intra-frequency handover threshold is too low, frequent handover\n\
E: PDCCH resource management parameters unreasonable\n\
F: Test server or transport anomaly\n\
G: Inter-frequency handover threshold unreasonable\n\
H: Network capacity insufficient\n";

/// A drive-test case whose tilts sit between the high-confidence thresholds.
fn boundary_standard_case() -> String {
    format!(
        "Analyze the throughput drop (boundary-marker).\n\
         Timestamp|Longitude|Latitude|{COL_SPEED}|{COL_SERVING_PCI}|{COL_SERVING_RSRP}|{COL_DL_RB}|{COL_TOP1_PCI}\n\
         t0|116.1|39.9|20|100|-85|200|101\n\
         t1|116.1|39.9|22|100|-86|205|101\n\
         \nEngineering parameters:\n\
         gNodeB ID|Cell ID|Longitude|Latitude|PCI|{COL_MECHANICAL_TILT}|{COL_DIGITAL_TILT}\n\
         1|100|116.1|39.9|100|14|6\n\
         \n\
         C1: The serving cell's downtilt angle is too large, causing weak coverage at the far end.\n\
         C2: The serving cell's coverage distance exceeds 1km, resulting in over-shooting.\n\
         C3: A neighboring cell provides higher throughput.\n\
         C4: Non-colocated co-frequency neighboring cells cause severe overlapping coverage.\n\
         C5: Frequent handovers degrade performance.\n\
         C6: Neighbor cell and serving cell have the same PCI mod 30, causing interference.\n\
         C7: Test vehicle speed exceeds 40km/h, impacting user throughput.\n\
         C8: Average scheduled RBs are below 160, affecting throughput.\n"
    )
}

fn write_cases(path: &Path, cases: &[(&str, &str)]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(["ID", "question"]).unwrap();
    for (id, question) in cases {
        writer.write_record([*id, *question]).unwrap();
    }
    writer.flush().unwrap();
}

fn config(dir: &Path) -> SolverConfig {
    SolverConfig {
        api_key: "test-key".into(),
        output_dir: dir.join("out"),
        test_file: dir.join("test.csv"),
        max_workers: 4,
        ..Default::default()
    }
}

fn standard_inputs(dir: &Path) -> SolverConfig {
    write_cases(
        &dir.join("test.csv"),
        &[("q1", DNS_CASE), ("q2", WEAK_COVERAGE_CASE), ("q3", NAT_CASE)],
    );
    config(dir)
}

fn solver(config: SolverConfig, oracle: Arc<ScriptedOracle>, cancel: CancellationToken) -> Solver {
    Solver::new(config, CaseLibrary::empty(), oracle, cancel)
}

fn submission(config: &SolverConfig) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(config.submission_path()).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn boxed(answer: &str) -> String {
    diagnosis::format_answer(answer)
}

fn answering(dns: &'static str, nat: &'static str) -> impl Fn(&str, usize) -> Reply + Send + Sync {
    move |prompt: &str, _n: usize| {
        if prompt.contains("dns-marker") {
            Reply::Text(dns)
        } else if prompt.contains("nat-marker") {
            Reply::Text(nat)
        } else {
            Reply::Fail(OracleErrorKind::Status(400))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_run_writes_rows_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    let oracle = ScriptedOracle::new(answering("Answer: \\boxed{B}", "The answer is: A"));

    let outcome = solver(config.clone(), oracle.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    let RunOutcome::Completed { stats, .. } = outcome else {
        panic!("expected a completed run");
    };

    // Only the two non-telecom cases escalate; the weak-coverage case is high confidence.
    assert_eq!(oracle.total(), 2);
    assert_eq!(stats.other, 2);
    assert_eq!(stats.telecom_high, 1);
    assert_eq!(stats.oracle_called, 2);
    assert_eq!(stats.oracle_accepted, 2);

    let rows = submission(&config);
    assert_eq!(rows.len(), 12);
    let ids: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(&ids[..5], ["q1_1", "q1_2", "q1_3", "q1_4", "q2_1"]);
    assert_eq!(ids[11], "q3_4");
    assert_eq!(rows[0][1], boxed("B"));
    assert_eq!(rows[8][1], boxed("A"));
    assert!(rows.iter().all(|r| r[2] == "placeholder" && r[3] == "placeholder"));

    let log = SolveLog::new(config.solve_log_path()).read_entries().unwrap();
    assert_eq!(log.len(), 3);
    let weak = log.iter().find(|e| e.id == "q2").unwrap();
    assert!(!weak.needs_ai);
    assert_eq!(rows[4][1], boxed(&weak.rule_answer));
}

#[tokio::test(start_paused = true)]
async fn rerun_after_completion_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());

    let first = ScriptedOracle::new(answering("\\boxed{B}", "\\boxed{A}"));
    solver(config.clone(), first, CancellationToken::new())
        .run()
        .await
        .unwrap();
    let before = submission(&config);
    let checkpoint_before = CheckpointStore::new(config.progress_path()).load().unwrap();

    let second = ScriptedOracle::new(answering("\\boxed{C}", "\\boxed{C}"));
    let outcome = solver(config.clone(), second.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(second.total(), 0);
    assert_eq!(submission(&config), before);
    assert_eq!(
        CheckpointStore::new(config.progress_path()).load().unwrap(),
        checkpoint_before
    );
    // The log is append-only across resumes and gains nothing here.
    assert_eq!(SolveLog::new(config.solve_log_path()).read_entries().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn accepted_cache_entries_are_not_re_asked() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    std::fs::create_dir_all(&config.output_dir).unwrap();

    let mut cached = Checkpoint::default();
    cached.record_outcome(
        "q1",
        OracleOutcome::Accepted {
            answer: "C".into(),
            attempts: 1,
        },
    );
    CheckpointStore::new(config.progress_path()).save(&cached).unwrap();

    let oracle = ScriptedOracle::new(answering("\\boxed{B}", "\\boxed{B}"));
    solver(config.clone(), oracle.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(oracle.calls_mentioning("dns-marker"), 0);
    assert_eq!(oracle.calls_mentioning("nat-marker"), 1);
    let rows = submission(&config);
    assert_eq!(rows[0][1], boxed("C"));
    assert_eq!(rows[8][1], boxed("B"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_tasks_fall_back_to_rule_answer() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    let oracle = ScriptedOracle::new(|_: &str, _: usize| Reply::Fail(OracleErrorKind::Server(503)));

    let outcome = solver(config.clone(), oracle.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    let RunOutcome::Completed { stats, .. } = outcome else {
        panic!("expected a completed run");
    };

    // Five attempts in the initial pass and in each of three retry rounds.
    assert_eq!(oracle.calls_mentioning("dns-marker"), 20);
    assert_eq!(oracle.calls_mentioning("nat-marker"), 20);
    assert_eq!(stats.oracle_called, 2);
    assert_eq!(stats.oracle_accepted, 0);
    assert_eq!(stats.oracle_failed, 2);

    let rows = submission(&config);
    // Rule answer for non-telecom cases is the first option.
    assert_eq!(rows[0][1], boxed("A"));
    assert_eq!(rows[8][1], boxed("A"));

    let checkpoint = CheckpointStore::new(config.progress_path()).load().unwrap();
    assert!(matches!(
        checkpoint.oracle_cache.get("q1"),
        Some(OracleOutcome::Failed { attempts: 5, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn retry_round_success_moves_failure_to_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    // dns fails its whole first pass, then succeeds in round one.
    let oracle = ScriptedOracle::new(|prompt: &str, n: usize| {
        if prompt.contains("dns-marker") && n <= 5 {
            Reply::Fail(OracleErrorKind::Timeout)
        } else {
            Reply::Text("\\boxed{B}")
        }
    });

    let outcome = solver(config.clone(), oracle.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    let RunOutcome::Completed { stats, .. } = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(oracle.calls_mentioning("dns-marker"), 6);
    assert_eq!(stats.oracle_called, 2);
    assert_eq!(stats.oracle_accepted, 2);
    assert_eq!(stats.oracle_failed, 0);
    assert_eq!(submission(&config)[0][1], boxed("B"));
}

#[tokio::test(start_paused = true)]
async fn corrupt_checkpoint_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::write(config.progress_path(), "{ not json").unwrap();

    let oracle = ScriptedOracle::new(answering("\\boxed{B}", "\\boxed{B}"));
    let err = solver(config.clone(), oracle.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SolveError::Checkpoint(CheckpointError::Corrupt { .. })
    ));
    assert_eq!(oracle.total(), 0);
    assert!(!config.submission_path().exists());
}

#[tokio::test(start_paused = true)]
async fn missing_dataset_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let oracle = ScriptedOracle::new(answering("\\boxed{B}", "\\boxed{B}"));

    let err = solver(config, oracle, CancellationToken::new())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, SolveError::Dataset(_)));
}

#[tokio::test(start_paused = true)]
async fn interruption_saves_landed_outcomes_and_skips_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    let oracle = ScriptedOracle::new(|prompt: &str, _: usize| {
        if prompt.contains("dns-marker") {
            Reply::Text("\\boxed{B}")
        } else {
            Reply::Hang
        }
    });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.cancel();
    });

    let outcome = solver(config.clone(), oracle, cancel).run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));
    assert!(!config.submission_path().exists());

    let checkpoint = CheckpointStore::new(config.progress_path()).load().unwrap();
    assert!(checkpoint.processed_ids.is_empty());
    assert!(checkpoint.results.is_empty());
    assert_eq!(checkpoint.accepted_answer("q1"), Some("B"));
    assert!(!checkpoint.oracle_cache.contains_key("q3"));

    // Resuming asks only for the case that never landed.
    let resume = ScriptedOracle::new(answering("\\boxed{C}", "\\boxed{A}"));
    solver(config.clone(), resume.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    assert_eq!(resume.calls_mentioning("dns-marker"), 0);
    assert_eq!(resume.calls_mentioning("nat-marker"), 1);
    let rows = submission(&config);
    assert_eq!(rows[0][1], boxed("B"));
    assert_eq!(rows[8][1], boxed("A"));
}

#[tokio::test(start_paused = true)]
async fn fresh_start_discards_previous_solve_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = standard_inputs(dir.path());
    std::fs::create_dir_all(&config.output_dir).unwrap();
    std::fs::write(config.solve_log_path(), "stale line\n").unwrap();

    let oracle = ScriptedOracle::new(answering("\\boxed{B}", "\\boxed{A}"));
    solver(config.clone(), oracle, CancellationToken::new())
        .run()
        .await
        .unwrap();

    let raw = std::fs::read_to_string(config.solve_log_path()).unwrap();
    assert!(!raw.contains("stale line"));
    assert_eq!(raw.lines().count(), 3);
}

#[tokio::test(start_paused = true)]
async fn low_confidence_rule_cases_reach_the_oracle() {
    let dir = tempfile::tempdir().unwrap();
    let standard = boundary_standard_case();
    write_cases(
        &dir.path().join("test.csv"),
        &[("s1", standard.as_str()), ("t1", LOOSE_TELECOM_CASE)],
    );
    let config = config(dir.path());

    let telecom = diagnose(&Case::new("t1", LOOSE_TELECOM_CASE), &CaseLibrary::empty());
    assert_eq!(telecom.kind, CaseKind::NonstandardTelecom);
    assert_eq!(telecom.confidence, Some(Confidence::Low));
    let all_options = Case::new("t1", LOOSE_TELECOM_CASE).option_labels;
    assert!(!telecom.candidates.is_empty() && telecom.candidates.len() < all_options.len());
    let narrowed = format!("Available options: {}\n", telecom.candidates.join(", "));
    let unfiltered = format!("Available options: {}\n", all_options.join(", "));

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let seen = prompts.clone();
    let oracle = ScriptedOracle::new(move |prompt: &str, _: usize| {
        seen.lock().unwrap().push(prompt.to_string());
        if prompt.contains("boundary-marker") {
            Reply::Text("\\boxed{C1}")
        } else {
            Reply::Text("\\boxed{H}")
        }
    });

    let outcome = solver(config.clone(), oracle.clone(), CancellationToken::new())
        .run()
        .await
        .unwrap();
    let RunOutcome::Completed { stats, .. } = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(stats.standard_low, 1);
    assert_eq!(stats.telecom_low, 1);
    assert_eq!(stats.oracle_accepted, 2);
    assert_eq!(oracle.calls_mentioning("boundary-marker"), 1);

    let prompts = prompts.lock().unwrap();
    let telecom_prompt = prompts
        .iter()
        .find(|p| p.contains("CCE Fail Rate"))
        .expect("telecom case was escalated");
    assert!(telecom_prompt.contains(&narrowed), "{telecom_prompt}");
    assert!(!telecom_prompt.contains(&unfiltered));

    // The oracle overrides the rule answers (C3 and A respectively).
    let rows = submission(&config);
    assert_eq!(rows[0][1], boxed("C1"));
    assert_eq!(rows[4][1], boxed("H"));
}

#[tokio::test(start_paused = true)]
async fn accepted_answers_are_flushed_before_the_pass_ends() {
    let dir = tempfile::tempdir().unwrap();
    let cases: Vec<(String, String)> = (1..=5)
        .map(|i| (format!("q{i}"), format!("Pick one (case-{i})?\nA: x\nB: y")))
        .collect();
    let refs: Vec<(&str, &str)> = cases.iter().map(|(id, q)| (id.as_str(), q.as_str())).collect();
    write_cases(&dir.path().join("test.csv"), &refs);
    let mut config = config(dir.path());
    config.escalation.checkpoint_every = 2;

    // Three cases answer at once; the other two never return.
    let oracle = ScriptedOracle::new(|prompt: &str, _: usize| {
        if ["case-1)", "case-2)", "case-3)"].iter().any(|m| prompt.contains(m)) {
            Reply::Text("\\boxed{B}")
        } else {
            Reply::Hang
        }
    });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let progress_path = config.progress_path();
    let on_disk = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        let checkpoint = CheckpointStore::new(progress_path).load().unwrap();
        trigger.cancel();
        checkpoint
    });

    let outcome = solver(config.clone(), oracle.clone(), cancel).run().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));

    let before_cancel = on_disk.await.unwrap();
    let accepted = before_cancel
        .oracle_cache
        .values()
        .filter(|o| o.accepted_answer().is_some())
        .count();
    // Two landed answers trigger one flush; the third waits for the fourth.
    assert_eq!(accepted, 2);
    assert!(before_cancel.processed_ids.is_empty());

    let after_cancel = CheckpointStore::new(config.progress_path()).load().unwrap();
    assert_eq!(after_cancel.oracle_cache.len(), 3);
}
