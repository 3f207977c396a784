//! Error types for the orchestrator engine

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors that can occur inside the orchestrator
///
/// Per-job failures never unwind past the executor boundary; these values
/// only reach a caller as data folded into a `JobOutcome`, except for
/// `Configuration`, which is fatal before any execution begins.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed phase graph or suite file; fatal at parse time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Workspace acquisition/release problems
    #[error("isolation failure: {0}")]
    Isolation(String),

    /// Session creation or command-send failures
    #[error("session failure: {0}")]
    Session(String),

    /// Underlying filesystem problem
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an isolation error
    pub fn isolation(message: impl Into<String>) -> Self {
        Self::Isolation(message.into())
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Check if this error is fatal before execution starts
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
