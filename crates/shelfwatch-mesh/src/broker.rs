//! Agent registry, mailboxes and broadcast fan-out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use shelfwatch_core::{AgentId, AgentKind, AgentStatus};

use crate::error::{MeshError, MeshResult};
use crate::message::{Message, MessageKind};

/// Registry entry for a live agent.
///
/// Owned exclusively by the broker: created on registration, updated on
/// heartbeat and status changes, destroyed on unregistration. Query methods
/// hand out clones, never references into broker state.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    /// Agent identifier
    pub id: AgentId,
    /// Display name
    pub name: String,
    /// Declared kind tag, used for broadcast filtering
    pub kind: AgentKind,
    /// Last status reported by the agent's runtime
    pub status: AgentStatus,
    /// When the agent registered
    pub registered_at: DateTime<Utc>,
    /// Last heartbeat received
    pub last_heartbeat: DateTime<Utc>,
}

/// Broker tuning knobs.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How often the background sweep runs
    pub sweep_interval: Duration,
    /// Capacity bound of the global message history ring
    pub history_capacity: usize,
    /// Age after which history entries are trimmed by the sweep
    pub history_retention: Duration,
    /// Heartbeat silence after which an agent is flagged inactive
    pub inactive_threshold: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            history_capacity: 1000,
            history_retention: Duration::from_secs(24 * 60 * 60),
            inactive_threshold: Duration::from_secs(10 * 60),
        }
    }
}

/// Point-in-time broker counters.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerStats {
    /// Registered agents
    pub total_agents: usize,
    /// Registered agents per kind tag
    pub agents_by_kind: HashMap<AgentKind, usize>,
    /// Messages currently queued across all mailboxes
    pub total_queued_messages: usize,
    /// Entries in the history ring
    pub history_size: usize,
    /// Mailboxes with at least one queued message
    pub active_mailboxes: usize,
}

pub(crate) struct BrokerState {
    pub(crate) agents: HashMap<AgentId, AgentRecord>,
    pub(crate) mailboxes: HashMap<AgentId, VecDeque<Message>>,
    pub(crate) kinds: HashMap<AgentKind, Vec<AgentId>>,
    pub(crate) history: VecDeque<Message>,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            agents: HashMap::new(),
            mailboxes: HashMap::new(),
            kinds: HashMap::new(),
            history: VecDeque::new(),
        }
    }

    fn push_history(&mut self, message: Message, capacity: usize) {
        if self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }

    fn remove_kind_entry(&mut self, kind: &AgentKind, id: &AgentId) {
        if let Some(ids) = self.kinds.get_mut(kind) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.kinds.remove(kind);
            }
        }
    }
}

/// In-process message broker for the agent fleet.
///
/// Tracks live agents, owns one FIFO mailbox per agent, and fans broadcasts
/// out as independent per-target copies. All registry, index, mailbox and
/// history state lives behind a single lock: the maintenance sweep runs
/// concurrently with foreground calls, and broadcast must observe a
/// consistent target set, so every mutation is one critical section.
pub struct MessageBroker {
    pub(crate) state: Mutex<BrokerState>,
    pub(crate) config: BrokerConfig,
}

impl MessageBroker {
    /// Create a broker with the given configuration.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            state: Mutex::new(BrokerState::new()),
            config,
        }
    }

    /// The broker's configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Register an agent, or overwrite its record if the id is known.
    ///
    /// Idempotent by id. A re-register under a different kind moves the
    /// agent in the kind index; an existing mailbox is kept as-is.
    pub async fn register(&self, id: AgentId, name: impl Into<String>, kind: AgentKind) {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let previous_kind = state
            .agents
            .get(&id)
            .filter(|record| record.kind != kind)
            .map(|record| record.kind.clone());
        if let Some(previous_kind) = previous_kind {
            state.remove_kind_entry(&previous_kind, &id);
        }

        let name = name.into();
        state.agents.insert(
            id.clone(),
            AgentRecord {
                id: id.clone(),
                name: name.clone(),
                kind: kind.clone(),
                status: AgentStatus::Idle,
                registered_at: now,
                last_heartbeat: now,
            },
        );

        let index = state.kinds.entry(kind).or_default();
        if !index.contains(&id) {
            index.push(id.clone());
        }
        state.mailboxes.entry(id.clone()).or_default();

        info!(agent_id = %id, name = %name, "Registered agent");
    }

    /// Remove an agent, its kind-index entry, and its mailbox.
    ///
    /// Returns `false` if the id was unknown. Queued messages are dropped
    /// with the mailbox.
    pub async fn unregister(&self, id: &AgentId) -> bool {
        let mut state = self.state.lock().await;
        let Some(record) = state.agents.remove(id) else {
            return false;
        };
        state.remove_kind_entry(&record.kind, id);
        state.mailboxes.remove(id);
        info!(agent_id = %id, "Unregistered agent");
        true
    }

    /// Enqueue a message into its recipient's mailbox.
    ///
    /// Fails with [`MeshError::UnknownRecipient`] if the recipient is not
    /// currently registered. On success the message is also appended to the
    /// history ring, where it remains observable even if it later expires
    /// before delivery.
    pub async fn send(&self, message: Message) -> MeshResult<()> {
        let mut state = self.state.lock().await;
        if !state.agents.contains_key(&message.recipient) {
            warn!(recipient = %message.recipient, "Recipient agent not found");
            return Err(MeshError::UnknownRecipient(message.recipient));
        }

        state.push_history(message.clone(), self.config.history_capacity);
        debug!(
            message_id = %message.id,
            sender = %message.sender,
            recipient = %message.recipient,
            kind = %message.kind,
            "Message enqueued"
        );
        let recipient = message.recipient.clone();
        state
            .mailboxes
            .entry(recipient)
            .or_default()
            .push_back(message);
        Ok(())
    }

    /// Fan a payload out to every matching agent.
    ///
    /// With a kind filter, the target set is the union of agents under each
    /// listed kind; without one it is every registered agent except the
    /// sender. Targets are deduplicated, each receives an independent
    /// `broadcast`-kind copy, and the count of targets reached is returned.
    /// Zero targets is not an error.
    pub async fn broadcast(
        &self,
        sender: &AgentId,
        payload: Value,
        kind_filter: Option<&[AgentKind]>,
    ) -> usize {
        let mut state = self.state.lock().await;

        let targets: HashSet<AgentId> = match kind_filter {
            Some(kinds) => kinds
                .iter()
                .filter_map(|kind| state.kinds.get(kind))
                .flatten()
                .cloned()
                .collect(),
            None => state
                .agents
                .keys()
                .filter(|id| *id != sender)
                .cloned()
                .collect(),
        };

        let mut sent = 0;
        for target in targets {
            let message = Message::new(
                sender.clone(),
                target.clone(),
                MessageKind::Broadcast,
                payload.clone(),
            );
            state.push_history(message.clone(), self.config.history_capacity);
            state
                .mailboxes
                .entry(target)
                .or_default()
                .push_back(message);
            sent += 1;
        }

        debug!(sender = %sender, sent, "Broadcast delivered");
        sent
    }

    /// Pop up to `limit` messages from the head of an agent's mailbox.
    ///
    /// The scan examines up to `limit` physical queue entries in FIFO
    /// order; an entry whose expiry has elapsed is discarded (not returned,
    /// not re-enqueued) but still consumes one of the scanned slots. An
    /// unknown agent id yields an empty list, not an error.
    pub async fn poll(&self, id: &AgentId, limit: usize) -> Vec<Message> {
        let mut state = self.state.lock().await;
        let Some(queue) = state.mailboxes.get_mut(id) else {
            return Vec::new();
        };

        let now = Utc::now();
        let scan = limit.min(queue.len());
        let mut messages = Vec::new();
        for _ in 0..scan {
            let Some(message) = queue.pop_front() else {
                break;
            };
            if message.is_expired(now) {
                debug!(message_id = %message.id, "Dropped expired message at poll");
                continue;
            }
            messages.push(message);
        }
        messages
    }

    /// Snapshot of one agent's registry record.
    pub async fn agent_record(&self, id: &AgentId) -> Option<AgentRecord> {
        self.state.lock().await.agents.get(id).cloned()
    }

    /// Snapshot of every registered agent.
    pub async fn all_agents(&self) -> Vec<AgentRecord> {
        self.state.lock().await.agents.values().cloned().collect()
    }

    /// Ids of all agents registered under a kind tag.
    pub async fn agents_by_kind(&self, kind: &AgentKind) -> Vec<AgentId> {
        self.state
            .lock()
            .await
            .kinds
            .get(kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a heartbeat for an agent. Returns `false` for unknown ids.
    pub async fn heartbeat(&self, id: &AgentId) -> bool {
        let mut state = self.state.lock().await;
        match state.agents.get_mut(id) {
            Some(record) => {
                record.last_heartbeat = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Update an agent's registry status. Returns `false` for unknown ids.
    pub async fn set_status(&self, id: &AgentId, status: AgentStatus) -> bool {
        let mut state = self.state.lock().await;
        match state.agents.get_mut(id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// Current broker counters.
    pub async fn stats(&self) -> BrokerStats {
        let state = self.state.lock().await;
        BrokerStats {
            total_agents: state.agents.len(),
            agents_by_kind: state
                .kinds
                .iter()
                .map(|(kind, ids)| (kind.clone(), ids.len()))
                .collect(),
            total_queued_messages: state.mailboxes.values().map(VecDeque::len).sum(),
            history_size: state.history.len(),
            active_mailboxes: state.mailboxes.values().filter(|q| !q.is_empty()).count(),
        }
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}
