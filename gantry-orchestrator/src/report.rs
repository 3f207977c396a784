//! Result aggregation
//!
//! Folds every recorded `JobOutcome` into run- and phase-level summaries
//! and always writes the machine-readable JSON artifact. Human-readable
//! rendering is a presentation concern layered on top by the CLI.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use gantry_core::domain::report::{PhaseReport, RunReport, Summary};

use crate::error::Result;
use crate::run_state::RunState;
use crate::scheduler::PhaseRecord;

/// Builds the run report from the scheduler's phase records and the
/// accumulated run state
pub fn summarize(
    run_id: Uuid,
    run_timestamp: DateTime<Utc>,
    wall_clock: Duration,
    records: &[PhaseRecord],
    run: &RunState,
) -> RunReport {
    let per_job = run.outcomes();

    let mut summary = Summary::default();
    for outcome in per_job.values() {
        summary.record(outcome.status);
    }

    let phases = records
        .iter()
        .map(|record| {
            let mut phase_summary = Summary::default();
            for name in &record.job_names {
                if let Some(outcome) = per_job.get(name) {
                    phase_summary.record(outcome.status);
                }
            }
            PhaseReport {
                name: record.name.clone(),
                critical: record.critical,
                state: record.state,
                summary: phase_summary,
                jobs: record.job_names.clone(),
            }
        })
        .collect();

    let total_jobs = records.iter().map(|r| r.job_names.len() as u64).sum();

    RunReport {
        run_id,
        run_timestamp,
        duration_ms: wall_clock.as_millis() as u64,
        total_jobs,
        summary,
        phases,
        per_job,
    }
}

/// Writes the structured report artifact into `output_dir`
pub fn write_json(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let file_name = format!(
        "gantry_report_{}.json",
        report.run_timestamp.format("%Y%m%d_%H%M%S")
    );
    let path = output_dir.join(file_name);

    let rendered = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&path, rendered)?;

    info!("run report written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::domain::job::{JobOutcome, JobStatus};
    use gantry_core::domain::phase::PhaseState;

    fn outcome(name: &str, status: JobStatus) -> JobOutcome {
        JobOutcome {
            job_name: name.to_string(),
            status,
            duration_ms: 5,
            artifact_paths: Vec::new(),
            failure_reason: None,
            steps: Vec::new(),
        }
    }

    fn sample_report() -> RunReport {
        let run = RunState::new(None);
        run.record(outcome("a", JobStatus::Success));
        run.record(outcome("b", JobStatus::TimedOut));
        run.record(outcome("c", JobStatus::Skipped));

        let records = vec![
            PhaseRecord {
                name: "core".into(),
                critical: true,
                state: PhaseState::Aborted,
                job_names: vec!["a".into(), "b".into()],
            },
            PhaseRecord {
                name: "later".into(),
                critical: false,
                state: PhaseState::Pending,
                job_names: vec!["c".into()],
            },
        ];

        summarize(
            Uuid::new_v4(),
            Utc::now(),
            Duration::from_secs(3),
            &records,
            &run,
        )
    }

    #[test]
    fn summarizes_per_run_and_per_phase() {
        let report = sample_report();

        assert_eq!(report.total_jobs, 3);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.timed_out, 1);
        assert_eq!(report.summary.skipped, 1);

        assert_eq!(report.phases[0].summary.timed_out, 1);
        assert_eq!(report.phases[1].summary.skipped, 1);
        assert!(!report.critical_phases_clean());
    }

    #[test]
    fn always_writes_the_structured_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();

        let path = write_json(&report, dir.path()).unwrap();
        assert!(path.exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: RunReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.total_jobs, report.total_jobs);
        assert_eq!(parsed.per_job.len(), 3);
    }
}
