//! Error types for mesh operations

use shelfwatch_core::AgentId;
use thiserror::Error;

/// Result type for mesh operations
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur during mesh operations.
///
/// Lookups for ids that simply do not exist (poll, unregister, heartbeat)
/// are not errors; those operations return empty results or `false`
/// instead. `MeshError` is reserved for operations that cannot proceed.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Send targeted an agent that is not currently registered
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(AgentId),

    /// Message payload could not be serialized
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::SerializationFailed(err.to_string())
    }
}
