//! Gantry CLI
//!
//! Driver for the orchestrator engine: loads the suite file, applies
//! phase/job filters, runs the scheduler against the git-worktree and
//! tmux backends, writes the JSON run report and prints a human summary.
//!
//! Exit code is 0 only when no critical phase contains a failed,
//! timed-out or errored job.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gantry_core::domain::job::JobStatus;
use gantry_core::domain::report::RunReport;
use gantry_orchestrator::config::SuiteConfig;
use gantry_orchestrator::executor::JobExecutor;
use gantry_orchestrator::isolation::{IsolationProvider, WorktreeProvider};
use gantry_orchestrator::report;
use gantry_orchestrator::run_state::RunState;
use gantry_orchestrator::scheduler::Scheduler;
use gantry_orchestrator::session::tmux::check_tmux_available;
use gantry_orchestrator::session::{SessionRunner, TmuxRunner};

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Dependency-ordered parallel test orchestrator", long_about = None)]
struct Cli {
    /// Path to the suite configuration file
    config: PathBuf,

    /// Run only the named phase
    #[arg(long)]
    phase: Option<String>,

    /// Run only the named job
    #[arg(long)]
    job: Option<String>,

    /// Maximum jobs running concurrently within a parallel phase
    #[arg(long, env = "GANTRY_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Hard wall-clock limit for the whole run, in seconds
    #[arg(long)]
    run_timeout: Option<u64>,

    /// Keep per-job workspaces on disk for debugging
    #[arg(long)]
    keep_workspaces: bool,

    /// Where to write the run report (overrides the suite file)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry=info,gantry_orchestrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = SuiteConfig::load(&cli.config)
        .with_context(|| format!("failed to load suite file {}", cli.config.display()))?;
    let phases = config.build_plan(cli.phase.as_deref(), cli.job.as_deref())?;

    check_tmux_available()
        .await
        .context("tmux is required to run sessions")?;

    info!(
        "starting run: {} phase(s), workers={}, workspace_root={}",
        phases.len(),
        cli.workers,
        config.workspace_root.display()
    );

    let isolation: Arc<dyn IsolationProvider> =
        Arc::new(WorktreeProvider::new(config.workspace_root.clone()));
    let sessions: Arc<dyn SessionRunner> =
        Arc::new(TmuxRunner::with_poll_interval(config.poll_interval()));
    let executor = Arc::new(JobExecutor::new(isolation, sessions, cli.keep_workspaces));
    let scheduler = Scheduler::new(executor, cli.workers);

    let run = Arc::new(RunState::new(cli.run_timeout.map(Duration::from_secs)));

    // ctrl-c sets the cooperative cancel flag; in-flight jobs observe it
    // at their poll point and clean up before the run winds down
    {
        let run = run.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                run.cancel_flag().cancel();
            }
        });
    }

    let run_id = uuid::Uuid::new_v4();
    let run_timestamp = chrono::Utc::now();
    let started = Instant::now();

    let records = scheduler.run(&phases, run.clone()).await;

    let run_report = report::summarize(run_id, run_timestamp, started.elapsed(), &records, &run);
    let output_dir = cli.output_dir.unwrap_or_else(|| config.output_dir.clone());
    let report_path = report::write_json(&run_report, &output_dir)
        .with_context(|| format!("failed to write report to {}", output_dir.display()))?;

    print_summary(&run_report);
    println!("\nReport: {}", report_path.display().to_string().bold());

    if run_report.critical_phases_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Human-readable rendering layered on top of the JSON artifact
fn print_summary(run_report: &RunReport) {
    println!("\n{}", "Run summary".bold());
    println!(
        "  {} total, {} passed, {} failed, {} skipped, {} timed out, {} errors ({} ms)",
        run_report.total_jobs,
        run_report.summary.passed.to_string().green(),
        run_report.summary.failed.to_string().red(),
        run_report.summary.skipped.to_string().yellow(),
        run_report.summary.timed_out.to_string().red(),
        run_report.summary.errors.to_string().red(),
        run_report.duration_ms
    );

    for phase in &run_report.phases {
        let critical = if phase.critical { " [critical]" } else { "" };
        println!(
            "\n  {} {}{} ({})",
            "▸".cyan(),
            phase.name.bold(),
            critical,
            phase.state
        );
        for job_name in &phase.jobs {
            let Some(outcome) = run_report.per_job.get(job_name) else {
                continue;
            };
            let status = match outcome.status {
                JobStatus::Success => outcome.status.to_string().green(),
                JobStatus::Skipped => outcome.status.to_string().yellow(),
                _ => outcome.status.to_string().red(),
            };
            match &outcome.failure_reason {
                Some(reason) => println!("      {job_name}: {status} ({reason})"),
                None => println!("      {job_name}: {status}"),
            }
        }
    }
}
