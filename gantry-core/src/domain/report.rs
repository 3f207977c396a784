//! Run report types
//!
//! The structured report is the orchestrator's primary output artifact.
//! A human-readable rendering may be layered on top of it, but the JSON
//! form is always produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::job::{JobOutcome, JobStatus};
use crate::domain::phase::PhaseState;

/// Per-status counts across a run or a phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub timed_out: u64,
    pub errors: u64,
}

impl Summary {
    /// Folds one outcome into the counts
    pub fn record(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Success => self.passed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::TimedOut => self.timed_out += 1,
            JobStatus::Error => self.errors += 1,
        }
    }

    /// True when nothing failed, timed out or errored
    pub fn clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0 && self.errors == 0
    }
}

/// Per-phase breakdown within the run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub name: String,
    pub critical: bool,
    pub state: PhaseState,
    pub summary: Summary,
    /// Job names in declaration order
    pub jobs: Vec<String>,
}

/// The machine-readable report emitted after every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: uuid::Uuid,
    pub run_timestamp: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub total_jobs: u64,
    pub summary: Summary,
    pub phases: Vec<PhaseReport>,
    pub per_job: BTreeMap<String, JobOutcome>,
}

impl RunReport {
    /// Exit-code policy: the run is clean only if no critical phase
    /// contains a failed, timed-out or errored job
    pub fn critical_phases_clean(&self) -> bool {
        self.phases
            .iter()
            .filter(|p| p.critical)
            .all(|p| p.summary.clean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_every_status() {
        let mut s = Summary::default();
        s.record(JobStatus::Success);
        s.record(JobStatus::Success);
        s.record(JobStatus::Failed);
        s.record(JobStatus::TimedOut);
        s.record(JobStatus::Skipped);
        s.record(JobStatus::Error);

        assert_eq!(s.total, 6);
        assert_eq!(s.passed, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.timed_out, 1);
        assert_eq!(s.skipped, 1);
        assert_eq!(s.errors, 1);
        assert!(!s.clean());
    }

    #[test]
    fn skipped_jobs_do_not_dirty_a_summary() {
        let mut s = Summary::default();
        s.record(JobStatus::Success);
        s.record(JobStatus::Skipped);
        assert!(s.clean());
    }

    #[test]
    fn critical_gate_ignores_non_critical_phases() {
        let mut bad = Summary::default();
        bad.record(JobStatus::Failed);
        let mut good = Summary::default();
        good.record(JobStatus::Success);

        let report = RunReport {
            run_id: uuid::Uuid::new_v4(),
            run_timestamp: chrono::Utc::now(),
            duration_ms: 10,
            total_jobs: 2,
            summary: Summary::default(),
            phases: vec![
                PhaseReport {
                    name: "lint".into(),
                    critical: false,
                    state: PhaseState::Completed,
                    summary: bad,
                    jobs: vec!["a".into()],
                },
                PhaseReport {
                    name: "core".into(),
                    critical: true,
                    state: PhaseState::Completed,
                    summary: good,
                    jobs: vec!["b".into()],
                },
            ],
            per_job: BTreeMap::new(),
        };

        assert!(report.critical_phases_clean());
    }
}
