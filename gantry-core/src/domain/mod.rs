//! Core domain types
//!
//! This module contains the domain structures shared across Gantry crates.
//! Specifications (jobs, phases) are read-only configuration data; outcome
//! and report types are produced by the orchestrator as jobs reach terminal
//! states.

pub mod job;
pub mod phase;
pub mod report;
