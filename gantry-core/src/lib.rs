//! Gantry Core
//!
//! Core types for the Gantry test orchestrator.
//!
//! This crate contains:
//! - Domain types: Core entities (JobSpec, Phase, JobOutcome, etc.)
//! - Report types: the machine-readable run report written after every run

pub mod domain;
