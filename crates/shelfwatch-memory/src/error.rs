//! Error types for memory persistence

use std::path::PathBuf;
use thiserror::Error;

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by memory persistence backends.
///
/// Store operations on [`crate::MemoryStore`] never surface these to the
/// caller; persistence failures are logged and the in-memory state remains
/// authoritative for the process lifetime.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Reading or writing a backing file failed
    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A memory set could not be serialized or parsed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
