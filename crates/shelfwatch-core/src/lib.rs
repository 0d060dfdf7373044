//! # Shelfwatch Core
//!
//! Shared types for the shelfwatch agent fleet: validated identifiers,
//! the agent status machine, and the core error taxonomy. Every other
//! shelfwatch crate builds on these.

pub mod error;
pub mod status;
pub mod types;

pub use error::{AgentError, AgentResult};
pub use status::AgentStatus;
pub use types::{AgentId, AgentKind, IdValidationError};
