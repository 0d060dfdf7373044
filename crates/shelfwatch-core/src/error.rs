//! Core error taxonomy for agent implementations.

use thiserror::Error;

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors surfaced by agent implementations.
///
/// Task failures are caught at the dispatch boundary and converted into a
/// `task_error` reply to the requester; they never leave the agent stuck in
/// a failed state.
#[derive(Error, Debug)]
pub enum AgentError {
    /// One-time setup failed before the poll loop started
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// The task body itself failed
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Task payload was missing required fields or malformed
    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::InvalidPayload(err.to_string())
    }
}
