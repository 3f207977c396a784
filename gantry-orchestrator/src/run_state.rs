//! Shared run state
//!
//! All cross-task mutation during a run goes through `RunState`: an
//! append-only outcome map plus the failed-name set used to propagate
//! dependency failures downstream. Concurrent job completions in a
//! parallel phase synchronize here instead of mutating shared maps ad hoc.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use gantry_core::domain::job::JobOutcome;
use tracing::debug;

/// Cooperative cancellation flag shared across the run
///
/// Set on ctrl-c or when the run-level deadline is exhausted. In-flight
/// jobs observe it at their poll suspension point and then take their
/// normal cleanup path.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State accumulated over one run
#[derive(Debug)]
pub struct RunState {
    /// Terminal outcome per job name; only ever grows
    results: Mutex<BTreeMap<String, JobOutcome>>,

    /// Names of jobs whose outcome blocks dependents
    failed: Mutex<HashSet<String>>,

    cancel: CancelFlag,

    /// Hard wall-clock cutoff for the whole run, if configured
    deadline: Option<Instant>,
}

impl RunState {
    pub fn new(run_timeout: Option<Duration>) -> Self {
        Self {
            results: Mutex::new(BTreeMap::new()),
            failed: Mutex::new(HashSet::new()),
            cancel: CancelFlag::new(),
            deadline: run_timeout.map(|t| Instant::now() + t),
        }
    }

    /// Records a terminal outcome
    ///
    /// The map is append-only: if the job already has an outcome the first
    /// one wins, which keeps reporting idempotent if a phase is retried.
    pub fn record(&self, outcome: JobOutcome) {
        if outcome.blocks_dependents() {
            self.failed.lock().unwrap().insert(outcome.job_name.clone());
        }
        let mut results = self.results.lock().unwrap();
        if results.contains_key(&outcome.job_name) {
            debug!("outcome for '{}' already recorded, keeping first", outcome.job_name);
            return;
        }
        results.insert(outcome.job_name.clone(), outcome);
    }

    /// Returns the first dependency that is in the failed set, if any
    pub fn failed_dependency(&self, dependencies: &[String]) -> Option<String> {
        let failed = self.failed.lock().unwrap();
        dependencies.iter().find(|d| failed.contains(*d)).cloned()
    }

    /// Snapshot of every recorded outcome
    pub fn outcomes(&self) -> BTreeMap<String, JobOutcome> {
        self.results.lock().unwrap().clone()
    }

    /// Outcome for a single job, if recorded
    pub fn outcome_of(&self, name: &str) -> Option<JobOutcome> {
        self.results.lock().unwrap().get(name).cloned()
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wall-clock budget left before the run deadline, if one is set
    pub fn remaining_budget(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Caps a job timeout to the remaining run budget
    ///
    /// An exhausted budget cancels the run so nothing else starts.
    pub fn cap_timeout(&self, job_timeout: Duration) -> Duration {
        match self.remaining_budget() {
            Some(remaining) if remaining.is_zero() => {
                self.cancel.cancel();
                Duration::ZERO
            }
            Some(remaining) => job_timeout.min(remaining),
            None => job_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::job::{JobOutcome, JobStatus};

    fn outcome(name: &str, status: JobStatus) -> JobOutcome {
        JobOutcome {
            job_name: name.to_string(),
            status,
            duration_ms: 1,
            artifact_paths: Vec::new(),
            failure_reason: None,
            steps: Vec::new(),
        }
    }

    #[test]
    fn results_are_append_only() {
        let state = RunState::new(None);
        state.record(outcome("a", JobStatus::Failed));
        state.record(outcome("a", JobStatus::Success));

        assert_eq!(state.outcome_of("a").unwrap().status, JobStatus::Failed);
        assert_eq!(state.outcomes().len(), 1);
    }

    #[test]
    fn non_success_outcomes_block_dependents() {
        let state = RunState::new(None);
        state.record(outcome("ok", JobStatus::Success));
        state.record(outcome("bad", JobStatus::TimedOut));
        state.record(outcome("skipped", JobStatus::Skipped));

        assert_eq!(state.failed_dependency(&["ok".to_string()]), None);
        assert_eq!(
            state.failed_dependency(&["ok".to_string(), "bad".to_string()]),
            Some("bad".to_string())
        );
        // skipped propagates transitively
        assert_eq!(
            state.failed_dependency(&["skipped".to_string()]),
            Some("skipped".to_string())
        );
    }

    #[test]
    fn exhausted_budget_cancels_the_run() {
        let state = RunState::new(Some(Duration::ZERO));
        assert!(!state.is_cancelled());
        assert_eq!(state.cap_timeout(Duration::from_secs(60)), Duration::ZERO);
        assert!(state.is_cancelled());
    }

    #[test]
    fn job_timeout_is_capped_to_remaining_budget() {
        let state = RunState::new(Some(Duration::from_secs(3600)));
        let capped = state.cap_timeout(Duration::from_secs(7200));
        assert!(capped <= Duration::from_secs(3600));

        let uncapped = RunState::new(None);
        assert_eq!(
            uncapped.cap_timeout(Duration::from_secs(7200)),
            Duration::from_secs(7200)
        );
    }
}
