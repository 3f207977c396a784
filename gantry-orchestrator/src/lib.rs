//! Gantry Orchestrator
//!
//! Engine for running a dependency-ordered graph of test jobs.
//!
//! Architecture:
//! - Config: suite file loading and parse-time validation
//! - Isolation: disposable, revision-pinned workspaces (git worktrees)
//! - Session: detached, pollable background command execution (tmux)
//! - Executor: one job end-to-end, every failure contained as data
//! - Scheduler: phase ordering, parallel fan-out, critical gating
//! - Report: run-level aggregation into a machine-readable artifact
//!
//! The isolation and session layers are trait seams so the scheduler and
//! executor never touch a backing tool directly; tests drive them with
//! in-memory implementations.

pub mod config;
pub mod error;
pub mod executor;
pub mod isolation;
pub mod report;
pub mod run_state;
pub mod scheduler;
pub mod session;

pub use error::{OrchestratorError, Result};
