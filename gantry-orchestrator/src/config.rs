//! Suite configuration
//!
//! Loads the YAML suite file describing the phase graph and validates it
//! before anything executes. A malformed graph (duplicate job names,
//! unknown or forward dependencies) is the one error class that is fatal
//! at parse time: such a run cannot possibly be valid.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gantry_core::domain::phase::Phase;

use crate::error::{OrchestratorError, Result};
use crate::session::session_name;

/// Top-level suite file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Directory under which per-job workspaces are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Directory the run report is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Marker poll interval in seconds
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Ordered phases making up the run
    pub phases: Vec<Phase>,
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("gantry-workspaces")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("gantry-reports")
}

fn default_poll_interval_seconds() -> u64 {
    1
}

impl SuiteConfig {
    /// Loads and validates a suite file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parses and validates suite YAML
    pub fn parse(raw: &str) -> Result<Self> {
        let config: SuiteConfig = serde_yaml::from_str(raw)
            .map_err(|e| OrchestratorError::config(format!("invalid suite file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Marker poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    /// Validates the phase graph
    ///
    /// Rejected here, before execution: empty phases, duplicate job
    /// names, jobs without command steps, duplicate step labels within a
    /// job, zero timeouts, and dependencies that are unknown or not
    /// scheduled strictly earlier than the depending job.
    pub fn validate(&self) -> Result<()> {
        if self.phases.is_empty() {
            return Err(OrchestratorError::config("suite has no phases"));
        }

        // (phase index, job index) per job name
        let mut positions: HashMap<&str, (usize, usize)> = HashMap::new();

        // Workspace directories and session names are derived from the job
        // name by sanitization; the session form is the coarser mapping, so
        // a collision check there covers both.
        let mut sanitized: HashMap<String, String> = HashMap::new();

        for (pi, phase) in self.phases.iter().enumerate() {
            if phase.name.trim().is_empty() {
                return Err(OrchestratorError::config(format!(
                    "phase {} has an empty name",
                    pi
                )));
            }
            if phase.jobs.is_empty() {
                return Err(OrchestratorError::config(format!(
                    "phase '{}' has no jobs",
                    phase.name
                )));
            }

            for (ji, job) in phase.jobs.iter().enumerate() {
                if job.name.trim().is_empty() {
                    return Err(OrchestratorError::config(format!(
                        "phase '{}' contains a job with an empty name",
                        phase.name
                    )));
                }
                if positions
                    .insert(job.name.as_str(), (pi, ji))
                    .is_some()
                {
                    return Err(OrchestratorError::config(format!(
                        "duplicate job name '{}'",
                        job.name
                    )));
                }
                if let Some(other) = sanitized.insert(session_name(&job.name), job.name.clone()) {
                    return Err(OrchestratorError::config(format!(
                        "job names '{}' and '{}' collide after sanitization; \
                         they would share a workspace and session",
                        other, job.name
                    )));
                }
                if job.commands.is_empty() {
                    return Err(OrchestratorError::config(format!(
                        "job '{}' has no command steps",
                        job.name
                    )));
                }
                if job.timeout_seconds == 0 {
                    return Err(OrchestratorError::config(format!(
                        "job '{}' has a zero timeout",
                        job.name
                    )));
                }

                // Keys are exported unquoted into the session's shell
                for key in job.environment.keys() {
                    let valid = key
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if !valid {
                        return Err(OrchestratorError::config(format!(
                            "job '{}' has an invalid environment variable name '{}'",
                            job.name, key
                        )));
                    }
                }

                let mut labels = HashSet::new();
                for step in &job.commands {
                    if !labels.insert(step.step_type.as_str()) {
                        return Err(OrchestratorError::config(format!(
                            "job '{}' repeats step label '{}'",
                            job.name, step.step_type
                        )));
                    }
                }
            }
        }

        for (pi, phase) in self.phases.iter().enumerate() {
            for (ji, job) in phase.jobs.iter().enumerate() {
                for dep in &job.dependencies {
                    let Some(&(dpi, dji)) = positions.get(dep.as_str()) else {
                        return Err(OrchestratorError::config(format!(
                            "job '{}' depends on unknown job '{}'",
                            job.name, dep
                        )));
                    };
                    // A dependency must reach a terminal state before the
                    // depending job starts, so it has to be scheduled
                    // strictly earlier.
                    let earlier = dpi < pi || (dpi == pi && !phase.parallel && dji < ji);
                    if !earlier {
                        return Err(OrchestratorError::config(format!(
                            "job '{}' depends on '{}', which is not scheduled before it",
                            job.name, dep
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Builds the execution plan, applying optional phase/job filters
    ///
    /// Filters are an explicit operator override: dependencies that point
    /// at jobs filtered out of the plan are dropped rather than treated
    /// as permanently unmet.
    pub fn build_plan(
        &self,
        phase_filter: Option<&str>,
        job_filter: Option<&str>,
    ) -> Result<Vec<Phase>> {
        let mut phases: Vec<Phase> = self.phases.clone();

        if let Some(name) = phase_filter {
            phases.retain(|p| p.name == name);
            if phases.is_empty() {
                return Err(OrchestratorError::config(format!(
                    "phase filter '{}' matches no phase",
                    name
                )));
            }
        }

        if let Some(name) = job_filter {
            for phase in &mut phases {
                phase.jobs.retain(|j| j.name == name);
            }
            phases.retain(|p| !p.jobs.is_empty());
            if phases.is_empty() {
                return Err(OrchestratorError::config(format!(
                    "job filter '{}' matches no job",
                    name
                )));
            }
        }

        let kept: HashSet<String> = phases
            .iter()
            .flat_map(|p| p.jobs.iter().map(|j| j.name.clone()))
            .collect();
        for phase in &mut phases {
            for job in &mut phase.jobs {
                job.dependencies.retain(|d| kept.contains(d));
            }
        }

        Ok(phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
phases:
  - name: core
    parallel: true
    critical: true
    jobs:
      - name: proj-a
        path: /repos/a
        revision: main
        commands:
          - type: unit
            command: pytest tests/unit
      - name: proj-b
        path: /repos/b
        commands:
          - type: unit
            command: cargo test
  - name: integration
    jobs:
      - name: proj-c
        path: /repos/c
        dependencies: [proj-a]
        commands:
          - type: integration
            command: pytest tests/integration
"#;

    #[test]
    fn parses_minimal_suite_with_defaults() {
        let config = SuiteConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.phases.len(), 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));

        let a = &config.phases[0].jobs[0];
        assert_eq!(a.revision, "main");
        assert_eq!(a.timeout_seconds, 600);

        let b = &config.phases[0].jobs[1];
        assert_eq!(b.revision, "HEAD");
    }

    #[test]
    fn rejects_unknown_dependency() {
        let raw = MINIMAL.replace("dependencies: [proj-a]", "dependencies: [ghost]");
        let err = SuiteConfig::parse(&raw).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn rejects_duplicate_job_names() {
        let raw = MINIMAL.replace("name: proj-b", "name: proj-a");
        let err = SuiteConfig::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_job_names_that_collide_after_sanitization() {
        // "proj a" and "proj/a" both sanitize to "proj-a"
        let raw = MINIMAL.replace("name: proj-b", "name: proj a");
        let err = SuiteConfig::parse(&raw.replace("name: proj-a", "name: proj/a")).unwrap_err();
        assert!(err.to_string().contains("collide after sanitization"));
    }

    #[test]
    fn rejects_dependency_between_parallel_siblings() {
        let raw = r#"
phases:
  - name: core
    parallel: true
    jobs:
      - name: a
        path: /repos/a
        commands: [{type: unit, command: "true"}]
      - name: b
        path: /repos/b
        dependencies: [a]
        commands: [{type: unit, command: "true"}]
"#;
        let err = SuiteConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("not scheduled before"));
    }

    #[test]
    fn allows_dependency_on_earlier_sequential_sibling() {
        let raw = r#"
phases:
  - name: core
    jobs:
      - name: a
        path: /repos/a
        commands: [{type: unit, command: "true"}]
      - name: b
        path: /repos/b
        dependencies: [a]
        commands: [{type: unit, command: "true"}]
"#;
        assert!(SuiteConfig::parse(raw).is_ok());
    }

    #[test]
    fn rejects_job_without_commands() {
        let raw = r#"
phases:
  - name: core
    jobs:
      - name: a
        path: /repos/a
        commands: []
"#;
        let err = SuiteConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("no command steps"));
    }

    #[test]
    fn rejects_unsafe_environment_variable_names() {
        let raw = r#"
phases:
  - name: core
    jobs:
      - name: a
        path: /repos/a
        environment:
          "BAD NAME": x
        commands: [{type: unit, command: "true"}]
"#;
        let err = SuiteConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("environment variable"));
    }

    #[test]
    fn phase_filter_selects_single_phase() {
        let config = SuiteConfig::parse(MINIMAL).unwrap();
        let plan = config.build_plan(Some("integration"), None).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "integration");
        // proj-a was filtered out, so the dangling dependency is dropped
        assert!(plan[0].jobs[0].dependencies.is_empty());
    }

    #[test]
    fn job_filter_selects_single_job() {
        let config = SuiteConfig::parse(MINIMAL).unwrap();
        let plan = config.build_plan(None, Some("proj-b")).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].jobs.len(), 1);
        assert_eq!(plan[0].jobs[0].name, "proj-b");
    }

    #[test]
    fn filters_that_match_nothing_are_errors() {
        let config = SuiteConfig::parse(MINIMAL).unwrap();
        assert!(config.build_plan(Some("nope"), None).is_err());
        assert!(config.build_plan(None, Some("nope")).is_err());
    }
}
