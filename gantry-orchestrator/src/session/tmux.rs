//! tmux session backend
//!
//! Drives detached tmux sessions through the tmux CLI:
//! - `new-session -d` after an unconditional `kill-session` for a clean slate
//! - `send-keys -- <command> Enter` with the command as one literal argument
//! - `capture-pane -p -S -` for a non-destructive full-history read
//! - `kill-session` on destroy, ignoring "no such session"

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};
use crate::session::SessionRunner;

/// Checks that the tmux binary is installed and responding
pub async fn check_tmux_available() -> Result<()> {
    let output = Command::new("tmux")
        .arg("-V")
        .output()
        .await
        .map_err(|e| OrchestratorError::session(format!("failed to execute 'tmux -V': {e}")))?;

    if !output.status.success() {
        return Err(OrchestratorError::session("tmux is not working correctly"));
    }

    debug!(
        "tmux available: {}",
        String::from_utf8_lossy(&output.stdout).trim()
    );
    Ok(())
}

/// Captured result of one tmux invocation
struct TmuxOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Session runner backed by the tmux CLI
pub struct TmuxRunner {
    poll_interval: Duration,
}

impl TmuxRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    async fn run_tmux(&self, args: &[&str]) -> Result<TmuxOutput> {
        let output = Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| OrchestratorError::session(format!("failed to execute tmux: {e}")))?;

        Ok(TmuxOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

impl Default for TmuxRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRunner for TmuxRunner {
    async fn create(&self, session: &str, cwd: &Path) -> Result<()> {
        // Kill any leftover session of the same name first; stale output
        // from a previous run must never leak into a new poll.
        let killed = self.run_tmux(&["kill-session", "-t", session]).await?;
        if killed.success {
            debug!("killed stale session '{}'", session);
        }

        let cwd_str = cwd.to_string_lossy();
        let created = self
            .run_tmux(&[
                "new-session", "-d", "-s", session, "-x", "200", "-y", "50", "-c", &cwd_str,
            ])
            .await?;
        if !created.success {
            return Err(OrchestratorError::session(format!(
                "failed to create session '{}': {}",
                session,
                created.stderr.trim()
            )));
        }

        debug!("created session '{}' in {}", session, cwd.display());
        Ok(())
    }

    async fn send(&self, session: &str, command: &str) -> Result<()> {
        // The command travels as a single argv entry; tmux types it
        // literally into the session's shell. `--` guards a leading dash.
        let sent = self
            .run_tmux(&["send-keys", "-t", session, "--", command, "Enter"])
            .await?;
        if !sent.success {
            return Err(OrchestratorError::session(format!(
                "failed to send command to session '{}': {}",
                session,
                sent.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn capture(&self, session: &str) -> Result<String> {
        let captured = self
            .run_tmux(&["capture-pane", "-p", "-t", session, "-S", "-"])
            .await?;
        if !captured.success {
            return Err(OrchestratorError::session(format!(
                "failed to capture session '{}': {}",
                session,
                captured.stderr.trim()
            )));
        }
        Ok(captured.stdout)
    }

    async fn destroy(&self, session: &str) -> Result<()> {
        let killed = self.run_tmux(&["kill-session", "-t", session]).await?;
        if !killed.success {
            // Already gone is the common case here, not a failure
            warn!(
                "kill-session '{}' reported: {}",
                session,
                killed.stderr.trim()
            );
        }
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
