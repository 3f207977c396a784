//! Session runner abstraction
//!
//! Executes ordered shell commands inside a named, detached, long-lived
//! session that can be polled without blocking and killed at any time.
//! The production backend is tmux (`TmuxRunner`); the trait seam exists so
//! the executor and scheduler never touch the backing tool directly.

pub mod tmux;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;
use crate::run_state::CancelFlag;

pub use tmux::TmuxRunner;

/// Result of waiting for a completion marker
///
/// Timeout is an expected, common outcome (long test suites), so it is a
/// value rather than an error; the executor maps it to the `timed_out`
/// terminal state. Cancellation gets its own arm because in-flight jobs
/// observe the run's cancel flag at this suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerWait {
    Found,
    TimedOut,
    Cancelled,
}

/// Detached background session execution
#[async_trait]
pub trait SessionRunner: Send + Sync {
    /// Creates a session with a clean slate
    ///
    /// Idempotent: an existing session of the same name is killed and
    /// recreated, so no output from a previous run can leak into a poll.
    async fn create(&self, session: &str, cwd: &Path) -> Result<()>;

    /// Appends one command to the session's input stream
    ///
    /// The command is handed to the backend as a single argument, never
    /// interpolated into an outer shell string. Values built *into* the
    /// command (paths, job names) must be quoted with [`shell_quote`].
    async fn send(&self, session: &str, command: &str) -> Result<()>;

    /// Non-destructive read of the session's accumulated output
    async fn capture(&self, session: &str) -> Result<String>;

    /// Best-effort kill; not an error if the session is already gone
    async fn destroy(&self, session: &str) -> Result<()>;

    /// Interval between marker polls
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Polls `capture` until `marker` appears, the timeout elapses, or
    /// the run is cancelled
    async fn await_marker(
        &self,
        session: &str,
        marker: &str,
        timeout: Duration,
        cancel: &CancelFlag,
    ) -> Result<MarkerWait> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Ok(MarkerWait::Cancelled);
            }
            if self.capture(session).await?.contains(marker) {
                return Ok(MarkerWait::Found);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(MarkerWait::TimedOut);
            }
            let remaining = timeout - elapsed;
            tokio::time::sleep(self.poll_interval().min(remaining)).await;
        }
    }
}

/// Quotes a value for safe interpolation into a shell command
///
/// Single-quote quoting: the only character needing treatment is `'`
/// itself, replaced by `'\''`.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Builds the echo command that emits the completion marker
///
/// The marker is split into two quoted halves so the *typed* command line,
/// which also shows up in captured output, never contains the contiguous
/// marker. Only the shell's echo output does.
pub fn marker_echo_command(marker: &str) -> String {
    let mid = marker.len() / 2;
    let (head, tail) = marker.split_at(mid);
    format!("echo {}{}", shell_quote(head), shell_quote(tail))
}

/// Normalizes a job name into a session-safe identifier
///
/// tmux treats `.` and `:` specially in targets; anything outside
/// `[A-Za-z0-9_-]` is mapped to `-`.
pub fn session_name(job_name: &str) -> String {
    let safe: String = job_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("gantry-{safe}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_values_verbatim() {
        assert_eq!(shell_quote("abc"), "'abc'");
        assert_eq!(shell_quote("a b$c"), "'a b$c'");
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn typed_marker_command_does_not_contain_the_marker() {
        let marker = "GANTRY_DONE_0123456789abcdef";
        let cmd = marker_echo_command(marker);
        assert!(!cmd.contains(marker));
        // joining the echoed halves reproduces it
        let echoed: String = cmd
            .trim_start_matches("echo ")
            .chars()
            .filter(|c| *c != '\'')
            .collect();
        assert_eq!(echoed, marker);
    }

    #[test]
    fn session_names_are_target_safe() {
        assert_eq!(session_name("proj.a:main"), "gantry-proj-a-main");
        assert_eq!(session_name("clean_name-1"), "gantry-clean_name-1");
    }
}
