//! # Shelfwatch Mesh
//!
//! In-process agent-to-agent messaging for the shelfwatch fleet.
//!
//! The crate provides the message envelope and the [`MessageBroker`]: a
//! registry of live agents with one FIFO mailbox per agent, point-to-point
//! send, kind-filtered broadcast fan-out, message expiry, a bounded global
//! history ring for diagnostics, and a periodic maintenance sweep.
//!
//! ## Example
//!
//! ```rust
//! use shelfwatch_mesh::{Message, MessageBroker, MessageKind};
//! use shelfwatch_core::{AgentId, AgentKind};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MessageBroker::default();
//! broker
//!     .register(AgentId::from("scout"), "Scout", AgentKind::from("worker"))
//!     .await;
//! broker
//!     .register(AgentId::from("scorer"), "Scorer", AgentKind::from("worker"))
//!     .await;
//!
//! let msg = Message::new(
//!     AgentId::from("scout"),
//!     AgentId::from("scorer"),
//!     MessageKind::Task,
//!     json!({ "task_id": "t-1" }),
//! );
//! broker.send(msg).await?;
//!
//! let inbox = broker.poll(&AgentId::from("scorer"), 10).await;
//! assert_eq!(inbox.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod error;
pub mod message;
pub mod sweep;

pub use broker::{AgentRecord, BrokerConfig, BrokerStats, MessageBroker};
pub use error::{MeshError, MeshResult};
pub use message::{InvalidPriority, Message, MessageId, MessageKind, Priority};
pub use sweep::{SweepHandle, SweepReport};
