//! Wiring for the compliance monitoring system: broker, sweep, the
//! orchestrator agent, and a requester identity for the CLI itself.

use chrono::NaiveDate;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use shelfwatch_agent::AgentRuntime;
use shelfwatch_core::{AgentError, AgentId, AgentKind};
use shelfwatch_memory::{FileStore, MemoryConfig, MemoryStore};
use shelfwatch_mesh::{Message, MessageBroker, MessageKind, MeshError, SweepHandle};

use crate::compliance::ComplianceAgent;
use crate::mockdata::MockDataGenerator;
use crate::reports::{ReportError, ReportStore};
use crate::settings::Settings;

const ORCHESTRATOR_ID: &str = "compliance-orchestrator";
const REQUESTER_ID: &str = "shelfwatch-cli";

/// Errors surfaced while driving the system from the CLI.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Messaging failed: {0}")]
    Mesh(#[from] MeshError),

    #[error("Agent failed: {0}")]
    Agent(#[from] AgentError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact persistence failed: {0}")]
    Report(#[from] ReportError),

    #[error("Timed out waiting for workflow result (task {0})")]
    Timeout(String),
}

/// The assembled compliance monitoring system.
pub struct ComplianceSystem {
    settings: Settings,
    broker: Arc<MessageBroker>,
    sweep: Option<SweepHandle>,
    orchestrator: AgentRuntime<ComplianceAgent>,
    requester: AgentId,
}

impl ComplianceSystem {
    /// Assemble the system from settings. Nothing runs until [`start`].
    ///
    /// [`start`]: ComplianceSystem::start
    pub fn new(settings: Settings) -> Self {
        let broker = Arc::new(MessageBroker::default());

        let orchestrator_id = AgentId::from(ORCHESTRATOR_ID);
        let memory = MemoryStore::open(
            orchestrator_id.clone(),
            MemoryConfig {
                retention_days: settings.memory_retention_days,
            },
            Arc::new(FileStore::new(settings.data_dir.join("memory"))),
        );
        let handler = ComplianceAgent::new(
            ReportStore::new(&settings.data_dir),
            settings.compliance_threshold,
        );
        let orchestrator = AgentRuntime::new(
            orchestrator_id,
            "Compliance Orchestrator",
            AgentKind::from("orchestrator"),
            Arc::clone(&broker),
            memory,
            handler,
        );

        Self {
            settings,
            broker,
            sweep: None,
            orchestrator,
            requester: AgentId::from(REQUESTER_ID),
        }
    }

    /// Start the broker sweep and the orchestrator agent, and register the
    /// CLI's own requester identity.
    pub async fn start(&mut self) -> Result<(), SystemError> {
        info!("Initializing compliance monitoring system");
        self.settings.ensure_directories()?;
        self.sweep = Some(self.broker.spawn_sweep());
        self.orchestrator.start().await?;
        self.broker
            .register(self.requester.clone(), "Shelfwatch CLI", AgentKind::from("cli"))
            .await;
        info!("System initialization complete");
        Ok(())
    }

    /// Stop the orchestrator and the sweep, and deregister the requester.
    pub async fn shutdown(&mut self) {
        info!("Shutting down compliance monitoring system");
        self.orchestrator.stop().await;
        self.broker.unregister(&self.requester).await;
        if let Some(sweep) = self.sweep.take() {
            sweep.shutdown().await;
        }
    }

    /// Run one compliance check and wait for its result.
    ///
    /// Sends a task message to the orchestrator, then polls the CLI's own
    /// mailbox until the matching `task_result` or `task_error` arrives.
    pub async fn run_check(
        &self,
        store_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Value, SystemError> {
        let task_id = Uuid::new_v4().to_string();
        let mut payload = json!({ "task_id": task_id });
        if let Some(store_id) = store_id {
            payload["store_id"] = json!(store_id);
        }
        if let Some(date) = date {
            payload["date"] = json!(date.format("%Y-%m-%d").to_string());
        }

        info!(task_id = %task_id, store_id = store_id.unwrap_or("all stores"), "Starting compliance check");
        self.broker
            .send(Message::new(
                self.requester.clone(),
                AgentId::from(ORCHESTRATOR_ID),
                MessageKind::Task,
                payload,
            ))
            .await?;

        let deadline = Instant::now() + Duration::from_secs(self.settings.task_timeout_secs);
        loop {
            for message in self.broker.poll(&self.requester, 10).await {
                match message.kind {
                    MessageKind::TaskResult | MessageKind::TaskError
                        if message.payload["task_id"].as_str() == Some(task_id.as_str()) =>
                    {
                        return Ok(message.payload);
                    }
                    other => {
                        debug!(kind = %other, "Ignoring unrelated message while waiting");
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(SystemError::Timeout(task_id));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Run checks on the monitoring interval until the caller cancels the
    /// future (the CLI races this against ctrl-c).
    pub async fn run_monitoring(&self) {
        info!(
            interval_secs = self.settings.monitoring_interval_secs,
            "Starting continuous monitoring"
        );
        loop {
            match self.run_check(None, None).await {
                Ok(result) => {
                    info!(
                        status = %result["status"],
                        score = ?result["compliance_score"],
                        "Scheduled compliance check finished"
                    );
                    tokio::time::sleep(Duration::from_secs(self.settings.monitoring_interval_secs))
                        .await;
                }
                Err(err) => {
                    error!(error = %err, "Scheduled compliance check failed");
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            }
        }
    }

    /// Generate and persist mock artifacts for development.
    pub fn generate_mock_data(
        &self,
        contracts: usize,
        planograms: usize,
        images: usize,
    ) -> Result<(), SystemError> {
        self.settings.ensure_directories()?;
        let generator = MockDataGenerator::new();
        let store = ReportStore::new(&self.settings.data_dir);

        for contract in generator.generate_contracts(contracts) {
            store.upload_contract(&contract)?;
        }
        for planogram in generator.generate_planograms(planograms) {
            store.upload_planogram(&planogram)?;
        }
        for image in generator.generate_store_images(images) {
            store.upload_image(&image)?;
        }

        info!(contracts, planograms, images, "Mock data generated");
        Ok(())
    }
}
