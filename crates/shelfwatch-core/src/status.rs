//! Agent lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an agent.
///
/// Transitions are owned by the runtime supervisor: `Idle → Active` on
/// start, `Active → Busy` when a task is accepted, `Busy → Active` when the
/// task finishes (success or failure, the status always resets), and
/// `Active → Stopping → Stopped` on graceful shutdown. `Error` is reserved
/// for an agent that failed outside task execution; task failures recover
/// to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Created but not yet started
    #[default]
    Idle,
    /// Polling its mailbox, ready to accept tasks
    Active,
    /// Executing a task
    Busy,
    /// Graceful shutdown in progress
    Stopping,
    /// Shut down; no longer polling
    Stopped,
    /// Failed outside of task execution
    Error,
}

impl AgentStatus {
    /// Whether the poll loop should keep running in this status.
    pub fn is_running(&self) -> bool {
        matches!(self, AgentStatus::Active | AgentStatus::Busy)
    }

    /// Whether the agent may accept a new task right now.
    pub fn can_accept_tasks(&self) -> bool {
        matches!(self, AgentStatus::Active)
    }

    /// Lowercase status name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Active => "active",
            AgentStatus::Busy => "busy",
            AgentStatus::Stopping => "stopping",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_states() {
        assert!(AgentStatus::Active.is_running());
        assert!(AgentStatus::Busy.is_running());
        assert!(!AgentStatus::Idle.is_running());
        assert!(!AgentStatus::Stopping.is_running());
        assert!(!AgentStatus::Stopped.is_running());
    }

    #[test]
    fn only_active_accepts_tasks() {
        assert!(AgentStatus::Active.can_accept_tasks());
        assert!(!AgentStatus::Busy.can_accept_tasks());
        assert!(!AgentStatus::Error.can_accept_tasks());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Stopping).unwrap(),
            "\"stopping\""
        );
        assert_eq!(AgentStatus::Busy.to_string(), "busy");
    }
}
