//! Isolation provider abstraction
//!
//! Produces a disposable, revision-pinned filesystem copy of a versioned
//! source per job, and guarantees removal afterward. The production
//! backend is git worktrees (`WorktreeProvider`); containers or plain
//! checkouts could slot in behind the same trait without touching the
//! scheduler or executor.

pub mod worktree;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use worktree::WorktreeProvider;

/// Disposable per-job workspace management
#[async_trait]
pub trait IsolationProvider: Send + Sync {
    /// Checks out `revision` of `source` into a workspace owned by
    /// `job_name` and returns its path
    ///
    /// Idempotent against *stale* leftovers: a workspace directory from a
    /// previous run is force-removed and recreated. A collision with a
    /// currently *active* job of the same name is a scheduling bug and an
    /// error. A nonexistent source or unresolvable revision fails fast.
    async fn acquire(&self, job_name: &str, source: &Path, revision: &str) -> Result<PathBuf>;

    /// Removes the workspace and its versioning metadata
    ///
    /// Callers log release failures instead of propagating them; cleanup
    /// hygiene never fails a run.
    async fn release(&self, job_name: &str, workspace: &Path) -> Result<()>;
}

/// Normalizes a job name into a filesystem-safe workspace directory name
pub fn workspace_dir_name(job_name: &str) -> String {
    job_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_names_are_path_safe() {
        assert_eq!(workspace_dir_name("proj/a b"), "proj-a-b");
        assert_eq!(workspace_dir_name("proj.a-1_x"), "proj.a-1_x");
    }
}
