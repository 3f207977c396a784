//! Phase domain types

use serde::{Deserialize, Serialize};

use crate::domain::job::JobSpec;

/// An ordered grouping of jobs sharing a parallel/critical policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,

    /// When true, jobs in this phase fan out concurrently
    #[serde(default)]
    pub parallel: bool,

    /// When true, any non-success outcome in this phase halts the run
    #[serde(default)]
    pub critical: bool,

    pub jobs: Vec<JobSpec>,
}

/// Scheduler-side state of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Not yet reached by the scheduler
    Pending,
    /// Jobs are executing
    Running,
    /// All jobs reached a terminal state
    Completed,
    /// Critical phase with a non-success job; the run stops here
    Aborted,
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseState::Pending => write!(f, "pending"),
            PhaseState::Running => write!(f, "running"),
            PhaseState::Completed => write!(f, "completed"),
            PhaseState::Aborted => write!(f, "aborted"),
        }
    }
}
