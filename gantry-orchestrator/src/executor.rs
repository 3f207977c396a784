//! Job executor
//!
//! Runs one job end-to-end and produces exactly one `JobOutcome`. Every
//! failure past this boundary is converted into data; nothing a single
//! broken job does may unwind into the scheduler or disturb sibling jobs.
//!
//! Per job: dependency gate, workspace acquisition, command sequence into
//! a fresh session (environment exports, per-step report path export,
//! step command, split-marker echo), marker wait, artifact classification,
//! then unconditional session destroy + workspace release.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use gantry_core::domain::job::{
    CommandStep, JobOutcome, JobSpec, JobStatus, StepResult, StepStatus,
};

use crate::error::Result;
use crate::isolation::IsolationProvider;
use crate::run_state::RunState;
use crate::session::{MarkerWait, SessionRunner, marker_echo_command, session_name, shell_quote};

/// Environment variable each step reads to learn its report artifact path
pub const STEP_REPORT_ENV: &str = "GANTRY_STEP_REPORT";

/// Report artifact path for one step of a job
pub fn step_report_path(workspace: &Path, job_name: &str, step_type: &str) -> PathBuf {
    workspace.join(format!("{job_name}_{step_type}.json"))
}

/// Executes single jobs against the isolation and session seams
pub struct JobExecutor {
    isolation: Arc<dyn IsolationProvider>,
    sessions: Arc<dyn SessionRunner>,

    /// Debug flag: keep workspaces on disk after terminal state
    retain_workspaces: bool,
}

impl JobExecutor {
    pub fn new(
        isolation: Arc<dyn IsolationProvider>,
        sessions: Arc<dyn SessionRunner>,
        retain_workspaces: bool,
    ) -> Self {
        Self {
            isolation,
            sessions,
            retain_workspaces,
        }
    }

    /// Runs one job to a terminal state
    ///
    /// Infallible by design: isolation or session trouble becomes an
    /// `error` outcome, a missed marker becomes `timed_out`, an upstream
    /// failure becomes `skipped` before any resource is touched.
    pub async fn execute(&self, job: &JobSpec, run: &RunState) -> JobOutcome {
        if let Some(dep) = run.failed_dependency(&job.dependencies) {
            info!("skipping '{}': dependency '{}' failed", job.name, dep);
            return JobOutcome::skipped(&job.name, format!("dependency failed: {dep}"));
        }

        if run.is_cancelled() {
            return JobOutcome::error(&job.name, "run cancelled before start", 0);
        }

        let timeout = run.cap_timeout(job.timeout());
        if timeout.is_zero() {
            return JobOutcome::error(&job.name, "run deadline exceeded", 0);
        }

        let started = Instant::now();

        let workspace = match self
            .isolation
            .acquire(&job.name, &job.source, &job.revision)
            .await
        {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("could not acquire workspace for '{}': {}", job.name, e);
                return JobOutcome::error(&job.name, e.to_string(), elapsed_ms(started));
            }
        };

        let session = session_name(&job.name);
        let result = self
            .run_in_session(job, &workspace, &session, timeout, run)
            .await;

        // Cleanup is unconditional on every exit path past acquisition,
        // including timeout and cancellation.
        if let Err(e) = self.sessions.destroy(&session).await {
            warn!("failed to destroy session '{}': {}", session, e);
        }
        if self.retain_workspaces {
            info!("retaining workspace {} for debugging", workspace.display());
        } else if let Err(e) = self.isolation.release(&job.name, &workspace).await {
            warn!("failed to release workspace {}: {}", workspace.display(), e);
        }

        let mut outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("job '{}' hit an infrastructure error: {}", job.name, e);
                JobOutcome::error(&job.name, e.to_string(), 0)
            }
        };
        outcome.duration_ms = elapsed_ms(started);
        info!(
            "job '{}' finished: {} ({} ms)",
            job.name, outcome.status, outcome.duration_ms
        );
        outcome
    }

    async fn run_in_session(
        &self,
        job: &JobSpec,
        workspace: &Path,
        session: &str,
        timeout: std::time::Duration,
        run: &RunState,
    ) -> Result<JobOutcome> {
        self.sessions.create(session, workspace).await?;

        for (key, value) in &job.environment {
            self.sessions
                .send(session, &format!("export {}={}", key, shell_quote(value)))
                .await?;
        }

        let mut artifact_paths = Vec::new();
        for step in &job.commands {
            let report = step_report_path(workspace, &job.name, &step.step_type);
            self.sessions
                .send(
                    session,
                    &format!(
                        "export {}={}",
                        STEP_REPORT_ENV,
                        shell_quote(&report.to_string_lossy())
                    ),
                )
                .await?;
            self.sessions.send(session, &step.command).await?;
            artifact_paths.push(report);
        }

        let marker = format!("GANTRY_DONE_{}", Uuid::new_v4().simple());
        self.sessions
            .send(session, &marker_echo_command(&marker))
            .await?;

        let wait = self
            .sessions
            .await_marker(session, &marker, timeout, run.cancel_flag())
            .await?;

        // The console capture is written for every wait result; step
        // artifacts are only parsed when the command sequence actually
        // finished.
        let console = self.write_console_log(job, workspace, session).await;

        match wait {
            MarkerWait::Cancelled => Ok(JobOutcome {
                job_name: job.name.clone(),
                status: JobStatus::Error,
                duration_ms: 0,
                artifact_paths: console.into_iter().collect(),
                failure_reason: Some("run cancelled".to_string()),
                steps: Vec::new(),
            }),
            MarkerWait::TimedOut => Ok(JobOutcome {
                job_name: job.name.clone(),
                status: JobStatus::TimedOut,
                duration_ms: 0,
                artifact_paths: console.into_iter().collect(),
                failure_reason: Some(format!(
                    "completion marker not observed within {}s",
                    timeout.as_secs()
                )),
                steps: Vec::new(),
            }),
            MarkerWait::Found => {
                let steps = classify_steps(&job.commands, workspace, &job.name);
                let failure_reason = steps.iter().find_map(step_failure);
                let status = if failure_reason.is_none() {
                    JobStatus::Success
                } else {
                    JobStatus::Failed
                };
                artifact_paths.extend(console);
                Ok(JobOutcome {
                    job_name: job.name.clone(),
                    status,
                    duration_ms: 0,
                    artifact_paths,
                    failure_reason,
                    steps,
                })
            }
        }
    }

    /// Persists the session's accumulated output next to the step reports
    async fn write_console_log(
        &self,
        job: &JobSpec,
        workspace: &Path,
        session: &str,
    ) -> Option<PathBuf> {
        let output = match self.sessions.capture(session).await {
            Ok(output) => output,
            Err(e) => {
                warn!("could not capture console for '{}': {}", job.name, e);
                return None;
            }
        };
        let path = workspace.join(format!("{}_console.log", job.name));
        match std::fs::write(&path, output) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("could not write console log {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Human-readable reason if the step did not pass
fn step_failure(step: &StepResult) -> Option<String> {
    match step.status {
        StepStatus::Passed => None,
        StepStatus::Failed => Some(format!(
            "step '{}' failed ({} of {} checks failed)",
            step.step_type, step.failed, step.total
        )),
        StepStatus::Error => Some(format!(
            "step '{}' produced no readable report artifact",
            step.step_type
        )),
    }
}

#[derive(Debug, serde::Deserialize)]
struct StepReportFile {
    summary: StepReportSummary,
}

#[derive(Debug, Default, serde::Deserialize)]
struct StepReportSummary {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    passed: u64,
    #[serde(default)]
    failed: u64,
    #[serde(default)]
    skipped: u64,
}

/// Reads each step's report artifact and classifies it
///
/// A missing or malformed artifact after the completion marker was seen is
/// an `error` for that step, never silently ignored: "infrastructure could
/// not tell what happened" must stay distinguishable from "checks failed".
pub fn classify_steps(
    commands: &[CommandStep],
    workspace: &Path,
    job_name: &str,
) -> Vec<StepResult> {
    commands
        .iter()
        .map(|step| {
            let path = step_report_path(workspace, job_name, &step.step_type);
            match read_step_report(&path) {
                Ok(summary) => StepResult {
                    step_type: step.step_type.clone(),
                    status: if summary.failed == 0 {
                        StepStatus::Passed
                    } else {
                        StepStatus::Failed
                    },
                    total: summary.total,
                    passed: summary.passed,
                    failed: summary.failed,
                    skipped: summary.skipped,
                },
                Err(reason) => {
                    warn!(
                        "step '{}' of '{}' has no usable report: {}",
                        step.step_type, job_name, reason
                    );
                    StepResult {
                        step_type: step.step_type.clone(),
                        status: StepStatus::Error,
                        total: 0,
                        passed: 0,
                        failed: 0,
                        skipped: 0,
                    }
                }
            }
        })
        .collect()
}

fn read_step_report(path: &Path) -> std::result::Result<StepReportSummary, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let report: StepReportFile = serde_json::from_str(&raw)
        .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;
    Ok(report.summary)
}
