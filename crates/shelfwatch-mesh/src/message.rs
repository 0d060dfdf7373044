//! Message envelope for agent-to-agent communication.
//!
//! Every message has exactly one concrete recipient; a broadcast is fanned
//! out by the broker into independent copies, one per target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use shelfwatch_core::AgentId;

/// Unique identifier for a message (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new random message id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the message id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind tag of a message, driving runtime dispatch.
///
/// The set is closed on purpose: dispatch matches exhaustively, so a new
/// kind is a compile-time-visible gap rather than a silently ignored
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Request to execute a task
    Task,
    /// Request for a status snapshot
    Status,
    /// Request to query the recipient's memory
    Memory,
    /// Fan-out copy produced by a broadcast
    Broadcast,
    /// Successful task outcome, sent back to the requester
    TaskResult,
    /// Failed task outcome, sent back to the requester
    TaskError,
    /// Reply to a status request
    StatusReport,
    /// Reply to a memory query
    MemoryResult,
}

impl MessageKind {
    /// Lowercase kind name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Task => "task",
            MessageKind::Status => "status",
            MessageKind::Memory => "memory",
            MessageKind::Broadcast => "broadcast",
            MessageKind::TaskResult => "task_result",
            MessageKind::TaskError => "task_error",
            MessageKind::StatusReport => "status_report",
            MessageKind::MemoryResult => "memory_result",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for priority validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriority(pub u8);

impl fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "priority must be between {} and {}, got {}",
            Priority::MIN.get(),
            Priority::MAX.get(),
            self.0
        )
    }
}

impl std::error::Error for InvalidPriority {}

/// Message priority, bounded to `1..=5`.
///
/// Priority is carried on the envelope for collaborators to inspect;
/// mailbox delivery order stays strictly FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority (also the default)
    pub const MIN: Priority = Priority(1);
    /// Highest priority
    pub const MAX: Priority = Priority(5);

    /// Create a validated priority.
    pub fn new(value: u8) -> Result<Self, InvalidPriority> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidPriority(value))
        }
    }

    /// Get the numeric priority value.
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<u8> for Priority {
    type Error = InvalidPriority;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message sent between agents in the fleet.
///
/// Created by the sender, enqueued into exactly one recipient mailbox, and
/// consumed when the recipient's runtime polls it. A message whose expiry
/// has elapsed is never handed to a handler; it is dropped silently during
/// poll or sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    #[serde(rename = "message_id")]
    pub id: MessageId,
    /// Sending agent
    #[serde(rename = "sender_id")]
    pub sender: AgentId,
    /// Receiving agent
    #[serde(rename = "recipient_id")]
    pub recipient: AgentId,
    /// Kind tag driving dispatch
    #[serde(rename = "message_type")]
    pub kind: MessageKind,
    /// Opaque structured content
    #[serde(rename = "content")]
    pub payload: Value,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Priority, `1..=5` (default 1)
    #[serde(default)]
    pub priority: Priority,
    /// Optional expiry; elapsed messages are dropped, never delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new message with the current timestamp and default priority.
    pub fn new(sender: AgentId, recipient: AgentId, kind: MessageKind, payload: Value) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            recipient,
            kind,
            payload,
            timestamp: Utc::now(),
            priority: Priority::default(),
            expires_at: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set an absolute expiry timestamp.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the message has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}
