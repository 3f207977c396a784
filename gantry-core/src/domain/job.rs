//! Job domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// A single labeled command within a job (e.g. "unit", "integration")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStep {
    /// Step label, used to name the per-step report artifact
    #[serde(rename = "type")]
    pub step_type: String,

    /// Shell command to run inside the job's workspace
    pub command: String,
}

/// Specification of one unit of work
///
/// Read-only configuration data. Shared by reference between the scheduler
/// and executor; nothing mutates a `JobSpec` after parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique name within a run
    pub name: String,

    /// Path to the versioned repository to check out
    #[serde(rename = "path")]
    pub source: PathBuf,

    /// Branch, tag or commit to isolate at
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Ordered command steps
    pub commands: Vec<CommandStep>,

    /// Names of jobs that must succeed before this one may start
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Environment variables injected into the job's session
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Maximum time to wait for the job's completion marker
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl JobSpec {
    /// The job's timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_revision() -> String {
    "HEAD".to_string()
}

fn default_timeout_seconds() -> u64 {
    600
}

/// Terminal status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every step ran and passed
    Success,
    /// The job ran and at least one step failed
    Failed,
    /// Never attempted because an upstream dependency failed
    Skipped,
    /// The completion marker did not appear before the timeout
    TimedOut,
    /// Infrastructure could not run the job at all
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Skipped => write!(f, "skipped"),
            JobStatus::TimedOut => write!(f, "timed_out"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one step within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// The step's report artifact was missing or unreadable
    Error,
}

/// Parsed result of a single step, backed by its report artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_type: String,
    pub status: StepStatus,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
}

/// Terminal record of one job execution
///
/// Exactly one of these is produced per scheduled job, whatever happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_name: String,
    pub status: JobStatus,
    pub duration_ms: u64,
    #[serde(default)]
    pub artifact_paths: Vec<PathBuf>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepResult>,
}

impl JobOutcome {
    /// Outcome for a job that was never attempted
    pub fn skipped(job_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Skipped,
            duration_ms: 0,
            artifact_paths: Vec::new(),
            failure_reason: Some(reason.into()),
            steps: Vec::new(),
        }
    }

    /// Outcome for a job the infrastructure could not run
    pub fn error(job_name: impl Into<String>, reason: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Error,
            duration_ms,
            artifact_paths: Vec::new(),
            failure_reason: Some(reason.into()),
            steps: Vec::new(),
        }
    }

    /// Whether this outcome puts the job in the failed set that gates
    /// downstream dependencies
    pub fn blocks_dependents(&self) -> bool {
        !matches!(self.status, JobStatus::Success)
    }
}
