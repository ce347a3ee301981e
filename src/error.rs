//! Error taxonomy for the orchestrator core.
//!
//! Errors from the run store, event log, and decision engine client propagate
//! unmodified through the orchestrator to the caller. A *reported* execution
//! failure from the engine is not an error; it is routed through the `failed`
//! state transition instead.

use thiserror::Error;

use crate::domain::RunStatus;

/// Result alias used throughout the library
pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

/// Errors raised by the orchestrator and its collaborators
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed input, e.g. an event missing provenance fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// No run record exists for the requested id
    #[error("Run not found: {0}")]
    NotFound(String),

    /// Operation is not valid from the run's current status
    #[error("Run {run_id} is {status}, cannot {operation}")]
    State {
        run_id: String,
        status: RunStatus,
        operation: &'static str,
    },

    /// Transport, process, or parse failure talking to the decision engine
    #[error("Decision engine {operation} failed: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    /// The mismatch demonstration did not observe a failed execution
    #[error("Expected run {run_id} to fail on snapshot mismatch, but it ended {status}")]
    MismatchUndetected { run_id: String, status: RunStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub(crate) fn engine(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            message: message.into(),
        }
    }

    /// True for errors that mean the run id is unknown
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
