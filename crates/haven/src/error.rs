//! Error types for the turn pipeline.
//!
//! Hard safety stops are not errors: they are a turn disposition. Everything
//! here is scoped to one step of one turn and never escapes as a process fault.

use std::time::Duration;
use thiserror::Error;

/// Failure of the external text-generation capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generation backend returned an empty completion")]
    Empty,
}

/// Failure of the retrieval backend. "No results" is never an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("Retrieval backend error: {0}")]
    Backend(String),

    #[error("Retrieval timed out after {0:?}")]
    Timeout(Duration),
}

/// Isolated failure of a single tool invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool generation step failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Tool timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tool is not registered")]
    NotRegistered,
}

/// Errors surfaced by the session layer to callers.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session {0} is closed")]
    Closed(String),

    #[error("Turn was cancelled before a response was produced")]
    Cancelled,

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl ToolError {
    /// Short machine-readable code used in tool results and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::Generation(_) => "generation_unavailable",
            ToolError::Timeout(_) => "timeout",
            ToolError::NotRegistered => "not_registered",
        }
    }
}
