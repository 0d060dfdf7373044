//! The task-execution contract supplied by concrete agents.

use async_trait::async_trait;
use serde_json::Value;

use shelfwatch_core::AgentResult;
use shelfwatch_mesh::Message;

/// Behavior a concrete agent plugs into the runtime supervisor.
///
/// The runtime owns the lifecycle and the mailbox; implementations own the
/// work. `initialize` runs once before the poll loop starts and must be
/// idempotent. `process_task` is the task body: arbitrary latency, may
/// await external collaborators, and failures propagate as errors that the
/// runtime converts into a `task_error` reply; the agent itself always
/// recovers to active.
#[async_trait]
pub trait Agent: Send + Sync {
    /// One-time setup before the poll loop starts.
    async fn initialize(&mut self) -> AgentResult<()>;

    /// Execute one task and return its result payload.
    async fn process_task(&mut self, payload: Value) -> AgentResult<Value>;

    /// Called for each broadcast fan-out copy delivered to this agent.
    async fn on_broadcast(&mut self, _payload: &Value) -> AgentResult<()> {
        Ok(())
    }

    /// Called for reply-kind messages (`task_result`, `task_error`,
    /// `status_report`, `memory_result`) delivered to this agent.
    async fn on_reply(&mut self, message: &Message) -> AgentResult<()> {
        tracing::debug!(kind = %message.kind, sender = %message.sender, "Reply received");
        Ok(())
    }
}
