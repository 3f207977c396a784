//! Git worktree isolation backend
//!
//! Shells out to the git CLI:
//! - `rev-parse --git-dir` to verify the source is a repository
//! - `rev-parse --verify <rev>^{commit}` to resolve the revision up front
//! - `worktree add --detach` to create the workspace
//! - `worktree remove --force` + `worktree prune` on release and on
//!   stale-workspace reuse
//!
//! An active-workspace registry distinguishes a live collision (two jobs
//! assigned the same workspace concurrently, a scheduling bug) from the
//! normal reuse of a stale directory left by a previous run. The registry
//! is keyed by the *sanitized* directory name, so distinct raw job names
//! that collapse to the same directory collide here too.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::isolation::{IsolationProvider, workspace_dir_name};

/// Captured result of one git invocation
struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

async fn run_git(repo: &Path, args: &[&str]) -> Result<GitOutput> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        // Never hang an unattended run on a credential prompt
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .map_err(|e| OrchestratorError::isolation(format!("failed to execute git: {e}")))?;

    Ok(GitOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Isolation provider backed by git worktrees
pub struct WorktreeProvider {
    workspace_root: PathBuf,

    /// Source repo per active workspace directory name
    active: Mutex<HashMap<String, PathBuf>>,
}

impl WorktreeProvider {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Workspace path assigned to a job name
    pub fn workspace_path(&self, job_name: &str) -> PathBuf {
        self.workspace_root.join(workspace_dir_name(job_name))
    }

    async fn checkout(&self, source: &Path, revision: &str, path: &Path) -> Result<()> {
        let repo_check = run_git(source, &["rev-parse", "--git-dir"]).await?;
        if !repo_check.success {
            return Err(OrchestratorError::isolation(format!(
                "'{}' is not a git repository: {}",
                source.display(),
                repo_check.stderr.trim()
            )));
        }

        // Fail fast on a bad revision instead of falling back to a default
        let rev_check = run_git(
            source,
            &["rev-parse", "--verify", "--quiet", &format!("{revision}^{{commit}}")],
        )
        .await?;
        if !rev_check.success {
            return Err(OrchestratorError::isolation(format!(
                "revision '{}' does not exist in '{}'",
                revision,
                source.display()
            )));
        }
        debug!(
            "resolved revision '{}' to {}",
            revision,
            rev_check.stdout.trim()
        );

        if path.exists() {
            info!("removing stale workspace {}", path.display());
            self.remove_worktree(source, path).await;
        }

        std::fs::create_dir_all(&self.workspace_root)?;

        let path_str = path.to_string_lossy();
        let added = run_git(source, &["worktree", "add", "--detach", &path_str, revision]).await?;
        if !added.success {
            return Err(OrchestratorError::isolation(format!(
                "failed to create worktree at {}: {}",
                path.display(),
                added.stderr.trim()
            )));
        }

        Ok(())
    }

    /// Best-effort worktree removal: git removal, directory fallback, prune
    async fn remove_worktree(&self, source: &Path, path: &Path) {
        let path_str = path.to_string_lossy();
        let removed = run_git(source, &["worktree", "remove", "--force", &path_str]).await;
        match removed {
            Ok(out) if !out.success => {
                debug!(
                    "git worktree remove {} reported: {}",
                    path.display(),
                    out.stderr.trim()
                );
            }
            Err(e) => debug!("git worktree remove {} failed: {}", path.display(), e),
            _ => {}
        }

        if path.exists() {
            if let Err(e) = std::fs::remove_dir_all(path) {
                warn!("could not remove workspace {}: {}", path.display(), e);
            }
        }

        if let Err(e) = run_git(source, &["worktree", "prune"]).await {
            debug!("git worktree prune failed: {}", e);
        }
    }
}

#[async_trait]
impl IsolationProvider for WorktreeProvider {
    async fn acquire(&self, job_name: &str, source: &Path, revision: &str) -> Result<PathBuf> {
        let dir_name = workspace_dir_name(job_name);
        {
            let mut active = self.active.lock().unwrap();
            if active.contains_key(&dir_name) {
                return Err(OrchestratorError::isolation(format!(
                    "workspace '{}' (for job '{}') is already active; \
                     two jobs may not share a workspace",
                    dir_name, job_name
                )));
            }
            active.insert(dir_name.clone(), source.to_path_buf());
        }

        let path = self.workspace_root.join(&dir_name);
        match self.checkout(source, revision, &path).await {
            Ok(()) => {
                info!(
                    "acquired workspace {} ({} @ {})",
                    path.display(),
                    source.display(),
                    revision
                );
                Ok(path)
            }
            Err(e) => {
                self.active.lock().unwrap().remove(&dir_name);
                Err(e)
            }
        }
    }

    async fn release(&self, job_name: &str, workspace: &Path) -> Result<()> {
        let source = self
            .active
            .lock()
            .unwrap()
            .remove(&workspace_dir_name(job_name));

        let Some(source) = source else {
            // Nothing tracked for this name; remove the directory if present
            if workspace.exists() {
                std::fs::remove_dir_all(workspace)?;
            }
            return Ok(());
        };

        self.remove_worktree(&source, workspace).await;
        if workspace.exists() {
            return Err(OrchestratorError::isolation(format!(
                "workspace {} still present after removal",
                workspace.display()
            )));
        }

        debug!("released workspace {}", workspace.display());
        Ok(())
    }
}
