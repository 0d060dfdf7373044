//! The per-agent supervisor: lifecycle, mailbox polling and dispatch.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shelfwatch_core::{AgentId, AgentKind, AgentResult, AgentStatus};
use shelfwatch_memory::{EpisodicQuery, MemoryStats, MemoryStore};
use shelfwatch_mesh::{Message, MessageBroker, MessageKind, MeshResult};

use crate::traits::Agent;

/// Runtime tuning knobs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay between poll iterations
    pub poll_interval: Duration,
    /// Maximum messages pulled per poll iteration
    pub poll_batch: usize,
    /// Delay before the next iteration after a dispatch failure
    pub error_backoff: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            poll_batch: 10,
            error_backoff: Duration::from_secs(1),
        }
    }
}

struct RuntimeState {
    status: AgentStatus,
    last_activity: DateTime<Utc>,
    current_task: Option<Value>,
}

struct RuntimeInner<A: Agent> {
    id: AgentId,
    name: String,
    kind: AgentKind,
    config: RuntimeConfig,
    broker: Arc<MessageBroker>,
    handler: Mutex<A>,
    memory: Mutex<MemoryStore>,
    state: RwLock<RuntimeState>,
}

/// Supervisor for one agent instance.
///
/// `start` registers the agent with the broker and spawns the poll loop as
/// an independent task; `stop` unregisters and cancels the loop. An
/// in-flight task is never cancelled by `stop`: it runs to completion, and
/// if the original requester has unregistered in the meantime its reply
/// send fails silently. That race is accepted and logged at debug level.
pub struct AgentRuntime<A: Agent + 'static> {
    inner: Arc<RuntimeInner<A>>,
    cancel: CancellationToken,
    loop_handle: Option<JoinHandle<()>>,
}

impl<A: Agent + 'static> AgentRuntime<A> {
    /// Create a runtime with default configuration.
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        kind: AgentKind,
        broker: Arc<MessageBroker>,
        memory: MemoryStore,
        handler: A,
    ) -> Self {
        Self::with_config(id, name, kind, broker, memory, handler, RuntimeConfig::default())
    }

    /// Create a runtime with explicit configuration.
    pub fn with_config(
        id: AgentId,
        name: impl Into<String>,
        kind: AgentKind,
        broker: Arc<MessageBroker>,
        memory: MemoryStore,
        handler: A,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                id,
                name: name.into(),
                kind,
                config,
                broker,
                handler: Mutex::new(handler),
                memory: Mutex::new(memory),
                state: RwLock::new(RuntimeState {
                    status: AgentStatus::Idle,
                    last_activity: Utc::now(),
                    current_task: None,
                }),
            }),
            cancel: CancellationToken::new(),
            loop_handle: None,
        }
    }

    /// The agent's id.
    pub fn id(&self) -> &AgentId {
        &self.inner.id
    }

    /// The agent's display name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The agent's kind tag.
    pub fn kind(&self) -> &AgentKind {
        &self.inner.kind
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> AgentStatus {
        self.inner.state.read().await.status
    }

    /// The task currently being executed, if any.
    pub async fn current_task(&self) -> Option<Value> {
        self.inner.state.read().await.current_task.clone()
    }

    /// Start the agent: initialize the handler, register with the broker,
    /// and launch the mailbox poll loop.
    ///
    /// A second `start` on a running agent is a no-op. An initialization
    /// failure leaves the agent in `Error` status without registering it.
    pub async fn start(&mut self) -> AgentResult<()> {
        if self.inner.state.read().await.status.is_running() {
            return Ok(());
        }
        info!(agent_id = %self.inner.id, name = %self.inner.name, "Starting agent");
        self.inner.state.write().await.status = AgentStatus::Active;

        {
            let mut handler = self.inner.handler.lock().await;
            if let Err(err) = handler.initialize().await {
                error!(agent_id = %self.inner.id, error = %err, "Agent initialization failed");
                self.inner.state.write().await.status = AgentStatus::Error;
                return Err(err);
            }
        }

        self.inner
            .broker
            .register(
                self.inner.id.clone(),
                self.inner.name.clone(),
                self.inner.kind.clone(),
            )
            .await;
        self.inner.set_status(AgentStatus::Active).await;

        self.cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = self.cancel.clone();
        self.loop_handle = Some(tokio::spawn(async move {
            inner.poll_loop(token).await;
        }));
        Ok(())
    }

    /// Stop the agent gracefully: unregister from the broker and cancel
    /// the poll loop.
    ///
    /// Does not wait for an in-flight task; see the type-level note on the
    /// accepted result-delivery race.
    pub async fn stop(&mut self) {
        info!(agent_id = %self.inner.id, name = %self.inner.name, "Stopping agent");
        self.inner.set_status(AgentStatus::Stopping).await;
        self.cancel.cancel();
        self.inner.broker.unregister(&self.inner.id).await;
        self.inner.set_status(AgentStatus::Stopped).await;
        // the loop task winds down on its own after the cancel signal
        self.loop_handle.take();
    }

    /// Send a message to another agent, stamping this agent as the sender.
    pub async fn send_message(
        &self,
        recipient: AgentId,
        kind: MessageKind,
        payload: Value,
    ) -> MeshResult<()> {
        self.inner
            .broker
            .send(Message::new(self.inner.id.clone(), recipient, kind, payload))
            .await
    }

    /// Broadcast a payload, optionally filtered by agent kind.
    pub async fn broadcast_message(
        &self,
        payload: Value,
        kind_filter: Option<&[AgentKind]>,
    ) -> usize {
        self.inner
            .broker
            .broadcast(&self.inner.id, payload, kind_filter)
            .await
    }

    /// Append an event to this agent's episodic memory.
    pub async fn store_episodic(&self, data: Value) -> u64 {
        self.inner.memory.lock().await.store_episodic(data)
    }

    /// Store a semantic fact for this agent.
    pub async fn store_semantic(&self, key: impl Into<String>, value: Value) {
        self.inner.memory.lock().await.store_semantic(key, value)
    }

    /// This agent's memory usage counters.
    pub async fn memory_stats(&self) -> MemoryStats {
        self.inner.memory.lock().await.stats()
    }
}

impl<A: Agent + 'static> RuntimeInner<A> {
    /// Update local status and mirror it into the broker registry.
    async fn set_status(&self, status: AgentStatus) {
        self.state.write().await.status = status;
        self.broker.set_status(&self.id, status).await;
    }

    async fn poll_loop(&self, token: CancellationToken) {
        debug!(agent_id = %self.id, "Poll loop started");
        loop {
            if token.is_cancelled() || !self.state.read().await.status.is_running() {
                break;
            }

            let messages = self.broker.poll(&self.id, self.config.poll_batch).await;
            let mut errored = false;
            for message in messages {
                if let Err(err) = self.dispatch(message).await {
                    error!(agent_id = %self.id, error = %err, "Error handling message");
                    errored = true;
                }
            }
            self.broker.heartbeat(&self.id).await;

            let delay = if errored {
                self.config.error_backoff
            } else {
                self.config.poll_interval
            };
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!(agent_id = %self.id, "Poll loop stopped");
    }

    async fn dispatch(&self, message: Message) -> AgentResult<()> {
        self.state.write().await.last_activity = Utc::now();

        match message.kind {
            MessageKind::Task => self.handle_task(message).await,
            MessageKind::Status => self.handle_status(message).await,
            MessageKind::Memory => self.handle_memory(message).await,
            MessageKind::Broadcast => {
                let mut handler = self.handler.lock().await;
                handler.on_broadcast(&message.payload).await
            }
            MessageKind::TaskResult
            | MessageKind::TaskError
            | MessageKind::StatusReport
            | MessageKind::MemoryResult => {
                let mut handler = self.handler.lock().await;
                handler.on_reply(&message).await
            }
        }
    }

    async fn handle_task(&self, message: Message) -> AgentResult<()> {
        if !self.state.read().await.status.can_accept_tasks() {
            warn!(agent_id = %self.id, "Received task while not active, ignoring");
            return Ok(());
        }

        {
            let mut state = self.state.write().await;
            state.status = AgentStatus::Busy;
            state.current_task = Some(message.payload.clone());
        }
        self.broker.set_status(&self.id, AgentStatus::Busy).await;

        let task_id = message.payload.get("task_id").cloned().unwrap_or(Value::Null);
        let outcome = {
            let mut handler = self.handler.lock().await;
            handler.process_task(message.payload.clone()).await
        };

        match outcome {
            Ok(result) => {
                self.reply(
                    &message.sender,
                    MessageKind::TaskResult,
                    json!({
                        "task_id": task_id,
                        "result": result.clone(),
                        "status": "completed",
                    }),
                )
                .await;
                self.memory.lock().await.store_episodic(json!({
                    "event": "task_completed",
                    "task": message.payload,
                    "result": result,
                }));
            }
            Err(err) => {
                error!(agent_id = %self.id, error = %err, "Error processing task");
                self.reply(
                    &message.sender,
                    MessageKind::TaskError,
                    json!({
                        "task_id": task_id,
                        "error": err.to_string(),
                        "status": "failed",
                    }),
                )
                .await;
            }
        }

        {
            let mut state = self.state.write().await;
            state.current_task = None;
            state.status = AgentStatus::Active;
        }
        self.broker.set_status(&self.id, AgentStatus::Active).await;
        Ok(())
    }

    async fn handle_status(&self, message: Message) -> AgentResult<()> {
        let snapshot = {
            let state = self.state.read().await;
            json!({
                "agent_id": &self.id,
                "name": &self.name,
                "status": state.status,
                "last_activity": state.last_activity,
                "current_task": &state.current_task,
            })
        };
        self.reply(&message.sender, MessageKind::StatusReport, snapshot)
            .await;
        Ok(())
    }

    async fn handle_memory(&self, message: Message) -> AgentResult<()> {
        let payload = &message.payload;
        if payload.get("operation").and_then(Value::as_str) != Some("retrieve") {
            debug!(agent_id = %self.id, "Unsupported memory operation, ignoring");
            return Ok(());
        }
        let limit = payload
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10) as usize;

        let memories = match payload.get("memory_type").and_then(Value::as_str) {
            Some("episodic") => {
                let query = parse_episodic_query(payload.get("query"));
                let memory = self.memory.lock().await;
                serde_json::to_value(memory.retrieve_episodic(query.as_ref(), limit))?
            }
            Some("semantic") => {
                let query = payload.get("query").and_then(Value::as_str).unwrap_or("");
                let memory = self.memory.lock().await;
                serde_json::to_value(memory.retrieve_semantic(query, limit))?
            }
            _ => Value::Array(Vec::new()),
        };

        self.reply(
            &message.sender,
            MessageKind::MemoryResult,
            json!({ "memories": memories }),
        )
        .await;
        Ok(())
    }

    async fn reply(&self, recipient: &AgentId, kind: MessageKind, payload: Value) {
        let message = Message::new(self.id.clone(), recipient.clone(), kind, payload);
        if let Err(err) = self.broker.send(message).await {
            // the requester may have unregistered while we worked
            debug!(agent_id = %self.id, recipient = %recipient, error = %err, "Reply not delivered");
        }
    }
}

fn parse_episodic_query(value: Option<&Value>) -> Option<EpisodicQuery> {
    let value = value?.as_object()?;
    let query = EpisodicQuery {
        event: value
            .get("event")
            .and_then(Value::as_str)
            .map(str::to_string),
        start: value
            .get("start_date")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        end: value
            .get("end_date")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
    };
    if query.event.is_none() && query.start.is_none() && query.end.is_none() {
        None
    } else {
        Some(query)
    }
}
