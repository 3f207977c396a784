//! Dependency scheduler
//!
//! Drives phases strictly in declaration order. Within a phase, jobs run
//! one after another (sequential) or fan out as spawned tasks bounded by a
//! worker semaphore (parallel); the phase completes only when every job
//! has reached a terminal state. A critical phase with any non-success
//! outcome aborts the run before the next phase starts.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use gantry_core::domain::job::{JobOutcome, JobStatus};
use gantry_core::domain::phase::{Phase, PhaseState};

use crate::executor::JobExecutor;
use crate::run_state::RunState;

/// Scheduler-side record of one phase, fed to the aggregator
#[derive(Debug, Clone)]
pub struct PhaseRecord {
    pub name: String,
    pub critical: bool,
    pub state: PhaseState,
    pub job_names: Vec<String>,
}

/// Executes the phase graph against a `JobExecutor`
pub struct Scheduler {
    executor: Arc<JobExecutor>,
    workers: Arc<Semaphore>,
}

impl Scheduler {
    /// `workers` bounds how many jobs of a parallel phase run at once
    pub fn new(executor: Arc<JobExecutor>, workers: usize) -> Self {
        Self {
            executor,
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Runs every phase to completion or to a critical abort
    ///
    /// Jobs of phases never started after an abort are still recorded, as
    /// `skipped`, so the report always accounts for the whole plan.
    pub async fn run(&self, phases: &[Phase], run: Arc<RunState>) -> Vec<PhaseRecord> {
        let mut records: Vec<PhaseRecord> = phases
            .iter()
            .map(|phase| PhaseRecord {
                name: phase.name.clone(),
                critical: phase.critical,
                state: PhaseState::Pending,
                job_names: phase.jobs.iter().map(|j| j.name.clone()).collect(),
            })
            .collect();

        let mut aborted_by: Option<String> = None;

        for (index, phase) in phases.iter().enumerate() {
            if let Some(aborted) = &aborted_by {
                for job in &phase.jobs {
                    run.record(JobOutcome::skipped(
                        &job.name,
                        format!("critical phase '{aborted}' aborted the run"),
                    ));
                }
                continue;
            }

            info!(
                "phase '{}' starting ({} job(s), parallel={}, critical={})",
                phase.name,
                phase.jobs.len(),
                phase.parallel,
                phase.critical
            );
            records[index].state = PhaseState::Running;

            if phase.parallel {
                self.run_parallel(phase, &run).await;
            } else {
                self.run_sequential(phase, &run).await;
            }

            let all_green = phase.jobs.iter().all(|job| {
                matches!(
                    run.outcome_of(&job.name).map(|o| o.status),
                    Some(JobStatus::Success)
                )
            });

            if phase.critical && !all_green {
                records[index].state = PhaseState::Aborted;
                error!(
                    "critical phase '{}' has non-success outcomes, stopping the run",
                    phase.name
                );
                aborted_by = Some(phase.name.clone());
            } else {
                records[index].state = PhaseState::Completed;
                info!("phase '{}' completed", phase.name);
            }
        }

        records
    }

    /// Strict list-order execution; each job fully terminal before the next
    async fn run_sequential(&self, phase: &Phase, run: &Arc<RunState>) {
        for job in &phase.jobs {
            let outcome = self.executor.execute(job, run).await;
            run.record(outcome);
        }
    }

    /// Fan-out/fan-in: one task per job, joined before the phase completes
    async fn run_parallel(&self, phase: &Phase, run: &Arc<RunState>) {
        let mut handles = Vec::with_capacity(phase.jobs.len());

        for job in &phase.jobs {
            let name = job.name.clone();
            let permit = self
                .workers
                .clone()
                .acquire_owned()
                .await
                .expect("worker semaphore closed");
            let executor = Arc::clone(&self.executor);
            let run = Arc::clone(run);
            let job = job.clone();

            let handle = tokio::spawn(async move {
                let outcome = executor.execute(&job, &run).await;
                run.record(outcome);
                drop(permit);
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!("job task for '{}' panicked: {}", name, e);
                run.record(JobOutcome::error(&name, "job task panicked", 0));
            }
        }
    }
}
