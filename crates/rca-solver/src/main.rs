use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use diagnosis::CaseLibrary;
use rca_solver::{HttpOracle, RunOutcome, Solver, SolverConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Diagnose drive-test throughput cases with rules, escalating the unsure
/// ones to a chat-completions model.
#[derive(Parser, Debug)]
#[command(name = "rca-solver", version)]
struct Args {
    /// TOML config file. Defaults and SOLVER_* environment variables apply without one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the oracle worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Override the output directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = SolverConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    config.validate().context("validating configuration")?;

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    let library = CaseLibrary::build(
        &config.case_cache_path(),
        config.train_file.as_deref(),
        config.case_file.as_deref(),
    )
    .context("building case library")?;

    let oracle = HttpOracle::from_config(&config).context("building oracle client")?;
    info!(
        model = %oracle.model(),
        workers = config.max_workers,
        library = library.len(),
        "Solver starting"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, saving progress");
            signal_cancel.cancel();
        }
    });

    let solver = Solver::new(config, library, Arc::new(oracle), cancel);
    match solver.run().await.context("solve run failed")? {
        RunOutcome::Completed { submission, .. } => {
            info!(path = %submission.display(), "Submission written");
        }
        RunOutcome::Interrupted { .. } => {
            info!("Run interrupted; rerun to resume from the checkpoint");
        }
    }

    Ok(())
}
