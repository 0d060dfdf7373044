//! End-to-end tests for the runtime supervisor: task dispatch, replies,
//! status recovery and lifecycle.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use shelfwatch_core::{AgentError, AgentId, AgentKind, AgentResult, AgentStatus};
use shelfwatch_memory::{InMemoryStore, MemoryConfig, MemoryStore};
use shelfwatch_mesh::{Message, MessageBroker, MessageKind};

use shelfwatch_agent::{Agent, AgentRuntime, RuntimeConfig};

/// Test double: echoes a fixed result, records broadcasts and replies.
struct EchoAgent {
    result: Value,
    fail_with: Option<String>,
    broadcasts: Arc<StdMutex<Vec<Value>>>,
    replies: Arc<StdMutex<Vec<MessageKind>>>,
}

impl EchoAgent {
    fn returning(result: Value) -> Self {
        Self {
            result,
            fail_with: None,
            broadcasts: Arc::new(StdMutex::new(Vec::new())),
            replies: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    fn failing(error: &str) -> Self {
        Self {
            result: Value::Null,
            fail_with: Some(error.to_string()),
            broadcasts: Arc::new(StdMutex::new(Vec::new())),
            replies: Arc::new(StdMutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Agent for EchoAgent {
    async fn initialize(&mut self) -> AgentResult<()> {
        Ok(())
    }

    async fn process_task(&mut self, _payload: Value) -> AgentResult<Value> {
        match &self.fail_with {
            Some(error) => Err(AgentError::TaskFailed(error.clone())),
            None => Ok(self.result.clone()),
        }
    }

    async fn on_broadcast(&mut self, payload: &Value) -> AgentResult<()> {
        self.broadcasts.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn on_reply(&mut self, message: &Message) -> AgentResult<()> {
        self.replies.lock().unwrap().push(message.kind);
        Ok(())
    }
}

fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        poll_interval: Duration::from_millis(10),
        poll_batch: 10,
        error_backoff: Duration::from_millis(20),
    }
}

fn memory(agent: &str) -> MemoryStore {
    MemoryStore::open(
        AgentId::from(agent),
        MemoryConfig::default(),
        Arc::new(InMemoryStore::new()),
    )
}

fn runtime(
    agent: &str,
    kind: &str,
    broker: &Arc<MessageBroker>,
    handler: EchoAgent,
) -> AgentRuntime<EchoAgent> {
    AgentRuntime::with_config(
        AgentId::from(agent),
        agent.to_string(),
        AgentKind::from(kind),
        Arc::clone(broker),
        memory(agent),
        handler,
        fast_config(),
    )
}

async fn wait_for_message(broker: &MessageBroker, id: &AgentId) -> Message {
    for _ in 0..200 {
        let mut messages = broker.poll(id, 10).await;
        if !messages.is_empty() {
            return messages.remove(0);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for a message for {id}");
}

/// The reply is sent before the runtime resets its state, so observing the
/// reply does not yet guarantee the dispatch epilogue ran. Poll for it.
async fn wait_for_status(runtime: &AgentRuntime<EchoAgent>, expected: AgentStatus) {
    for _ in 0..200 {
        if runtime.status().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent never reached status {expected}");
}

#[tokio::test]
async fn worker_task_round_trip_delivers_task_result() {
    let broker = Arc::new(MessageBroker::default());
    // requester A registers directly with the broker
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut reporter = runtime("b", "reporter", &broker, EchoAgent::returning(json!({ "x": 1 })));
    reporter.start().await.unwrap();

    broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Task,
            json!({ "task_id": "t-1" }),
        ))
        .await
        .unwrap();

    let reply = wait_for_message(&broker, &AgentId::from("a")).await;
    assert_eq!(reply.kind, MessageKind::TaskResult);
    assert_eq!(reply.sender, AgentId::from("b"));
    assert_eq!(reply.payload["task_id"], "t-1");
    assert_eq!(reply.payload["result"], json!({ "x": 1 }));
    assert_eq!(reply.payload["status"], "completed");

    // exactly one reply
    assert!(broker.poll(&AgentId::from("a"), 10).await.is_empty());

    // dispatch recovery: status back to active, no current task
    wait_for_status(&reporter, AgentStatus::Active).await;
    assert_eq!(reporter.current_task().await, None);

    reporter.stop().await;
}

#[tokio::test]
async fn failing_task_delivers_task_error_and_recovers() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut worker = runtime("b", "worker", &broker, EchoAgent::failing("shelf scan failed"));
    worker.start().await.unwrap();

    broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Task,
            json!({ "task_id": "t-2" }),
        ))
        .await
        .unwrap();

    let reply = wait_for_message(&broker, &AgentId::from("a")).await;
    assert_eq!(reply.kind, MessageKind::TaskError);
    assert_eq!(reply.payload["task_id"], "t-2");
    assert_eq!(reply.payload["status"], "failed");
    assert!(
        reply.payload["error"]
            .as_str()
            .unwrap()
            .contains("shelf scan failed")
    );

    // a handler failure never leaves the agent stuck busy or errored
    wait_for_status(&worker, AgentStatus::Active).await;
    assert_eq!(worker.current_task().await, None);

    worker.stop().await;
}

#[tokio::test]
async fn completed_task_is_recorded_in_episodic_memory() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(json!({ "ok": true })));
    worker.start().await.unwrap();

    broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Task,
            json!({ "task_id": "t-3" }),
        ))
        .await
        .unwrap();
    wait_for_message(&broker, &AgentId::from("a")).await;

    // the audit write lands after the reply send
    for _ in 0..200 {
        if worker.memory_stats().await.episodic_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stats = worker.memory_stats().await;
    assert_eq!(stats.episodic_count, 1);
    assert!(stats.newest_episodic.is_some());

    worker.stop().await;
}

#[tokio::test]
async fn status_request_yields_snapshot_report() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(Value::Null));
    worker.start().await.unwrap();

    broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Status,
            Value::Null,
        ))
        .await
        .unwrap();

    let reply = wait_for_message(&broker, &AgentId::from("a")).await;
    assert_eq!(reply.kind, MessageKind::StatusReport);
    assert_eq!(reply.payload["agent_id"], "b");
    assert_eq!(reply.payload["name"], "b");
    assert_eq!(reply.payload["status"], "active");
    assert_eq!(reply.payload["current_task"], Value::Null);
    assert!(reply.payload.get("last_activity").is_some());

    worker.stop().await;
}

#[tokio::test]
async fn memory_query_returns_matching_semantic_entries() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(Value::Null));
    worker.start().await.unwrap();
    worker
        .store_semantic("compliance_threshold", json!(85.0))
        .await;

    broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Memory,
            json!({
                "memory_type": "semantic",
                "operation": "retrieve",
                "query": "threshold",
                "limit": 10,
            }),
        ))
        .await
        .unwrap();

    let reply = wait_for_message(&broker, &AgentId::from("a")).await;
    assert_eq!(reply.kind, MessageKind::MemoryResult);
    let memories = reply.payload["memories"].as_array().unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0]["key"], "compliance_threshold");
    assert_eq!(memories[0]["value"], json!(85.0));

    worker.stop().await;
}

#[tokio::test]
async fn unsupported_memory_type_yields_empty_result_set() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(Value::Null));
    worker.start().await.unwrap();

    broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Memory,
            json!({ "memory_type": "procedural", "operation": "retrieve" }),
        ))
        .await
        .unwrap();

    let reply = wait_for_message(&broker, &AgentId::from("a")).await;
    assert_eq!(reply.kind, MessageKind::MemoryResult);
    assert_eq!(reply.payload["memories"], json!([]));

    worker.stop().await;
}

#[tokio::test]
async fn broadcast_reaches_handler_hook() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let handler = EchoAgent::returning(Value::Null);
    let broadcasts = Arc::clone(&handler.broadcasts);
    let mut worker = runtime("b", "worker", &broker, handler);
    worker.start().await.unwrap();

    let sent = broker
        .broadcast(&AgentId::from("a"), json!({ "refresh": "planograms" }), None)
        .await;
    assert_eq!(sent, 1);

    for _ in 0..200 {
        if !broadcasts.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let seen = broadcasts.lock().unwrap();
    assert_eq!(seen.as_slice(), &[json!({ "refresh": "planograms" })]);
    drop(seen);

    worker.stop().await;
}

#[tokio::test]
async fn runtime_to_runtime_task_flow_delivers_reply_hook() {
    let broker = Arc::new(MessageBroker::default());

    let requester_handler = EchoAgent::returning(Value::Null);
    let replies = Arc::clone(&requester_handler.replies);
    let mut requester = runtime("asker", "worker", &broker, requester_handler);
    let mut responder = runtime(
        "doer",
        "reporter",
        &broker,
        EchoAgent::returning(json!({ "x": 1 })),
    );
    requester.start().await.unwrap();
    responder.start().await.unwrap();

    requester
        .send_message(
            AgentId::from("doer"),
            MessageKind::Task,
            json!({ "task_id": "t-9" }),
        )
        .await
        .unwrap();

    for _ in 0..200 {
        if !replies.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(replies.lock().unwrap().as_slice(), &[MessageKind::TaskResult]);

    requester.stop().await;
    responder.stop().await;
}

#[tokio::test]
async fn stop_unregisters_and_halts_processing() {
    let broker = Arc::new(MessageBroker::default());
    broker
        .register(AgentId::from("a"), "A", AgentKind::from("worker"))
        .await;

    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(Value::Null));
    worker.start().await.unwrap();
    assert!(broker.agent_record(&AgentId::from("b")).await.is_some());

    worker.stop().await;
    assert_eq!(worker.status().await, AgentStatus::Stopped);
    assert!(broker.agent_record(&AgentId::from("b")).await.is_none());

    // sends to the stopped agent now fail fast
    let result = broker
        .send(Message::new(
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Task,
            json!({}),
        ))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let broker = Arc::new(MessageBroker::default());
    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(Value::Null));
    worker.start().await.unwrap();
    worker.start().await.unwrap();
    assert_eq!(worker.status().await, AgentStatus::Active);
    worker.stop().await;
}

#[tokio::test]
async fn registry_status_mirrors_runtime_lifecycle() {
    let broker = Arc::new(MessageBroker::default());
    let mut worker = runtime("b", "worker", &broker, EchoAgent::returning(Value::Null));
    worker.start().await.unwrap();

    let record = broker.agent_record(&AgentId::from("b")).await.unwrap();
    assert_eq!(record.status, AgentStatus::Active);

    worker.stop().await;
}
