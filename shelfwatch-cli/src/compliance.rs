//! The compliance workflow handler.
//!
//! This is a task body plugged into the agent runtime, not part of the
//! messaging core. Scoring is a mock-grade stand-in: it produces plausible
//! scores, violations and recommendations without calling any external
//! analysis service.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{info, warn};

use shelfwatch_agent::Agent;
use shelfwatch_core::{AgentError, AgentResult};

use crate::models::{
    ComplianceReport, ComplianceStatus, Violation, WorkflowResult, WorkflowStatus,
};
use crate::reports::ReportStore;
use uuid::Uuid;

const MAX_WORKFLOW_HISTORY: usize = 100;

fn violation_pool() -> Vec<Violation> {
    vec![
        Violation {
            violation_type: "product_placement".to_string(),
            severity: "medium".to_string(),
            description: "Products not placed at eye level as per contract".to_string(),
            location: "Aisle 3, Shelf 2".to_string(),
        },
        Violation {
            violation_type: "promotional_display".to_string(),
            severity: "high".to_string(),
            description: "Missing promotional end cap display for seasonal campaign".to_string(),
            location: "End of Aisle 5".to_string(),
        },
    ]
}

const RECOMMENDATION_POOL: &[&str] = &[
    "Relocate products to eye-level positions in the beverage aisle",
    "Install the promotional end cap display for the seasonal campaign",
    "Ensure proper spacing between competing products",
    "Update shelf tags to match current promotional pricing",
];

/// Agent that executes compliance-check workflows.
///
/// Tracks in-flight workflows and keeps a bounded history of finished
/// ones; every finished workflow is persisted through the report store.
pub struct ComplianceAgent {
    threshold: f64,
    reports: ReportStore,
    initialized: bool,
    active_workflows: HashMap<String, WorkflowResult>,
    history: Vec<WorkflowResult>,
}

impl ComplianceAgent {
    /// Create a handler that persists results through `reports`.
    pub fn new(reports: ReportStore, threshold: f64) -> Self {
        Self {
            threshold,
            reports,
            initialized: false,
            active_workflows: HashMap::new(),
            history: Vec::new(),
        }
    }

    /// Run one compliance workflow for a store on a date.
    pub fn run_workflow(&mut self, store_id: &str, date: NaiveDate) -> WorkflowResult {
        let mut workflow = WorkflowResult::running(store_id, date);
        let workflow_id = workflow.workflow_id.clone();
        info!(workflow_id = %workflow_id, store_id, "Starting compliance workflow");
        self.active_workflows
            .insert(workflow_id.clone(), workflow.clone());

        let mut rng = rand::rng();
        let score = (rng.random_range(75.0..95.0_f64) * 100.0).round() / 100.0;
        let pool = violation_pool();
        let violations: Vec<Violation> = pool
            .into_iter()
            .take(rng.random_range(0..=2))
            .collect();
        let recommendations: Vec<String> = RECOMMENDATION_POOL
            .iter()
            .take(rng.random_range(1..=3))
            .map(|r| r.to_string())
            .collect();

        workflow.compliance_score = Some(score);
        workflow.violations = violations;
        workflow.recommendations = recommendations;
        workflow.result = Some(json!({
            "compliant": score >= self.threshold,
            "threshold": self.threshold,
        }));
        workflow.status = WorkflowStatus::Completed;
        workflow.completed_at = Some(Utc::now());

        if let Err(err) = self.reports.save_workflow_result(&workflow) {
            warn!(workflow_id = %workflow_id, error = %err, "Failed to persist workflow result");
        }
        let report = self.build_report(&workflow, score);
        if let Err(err) = self.reports.save_report(&report) {
            warn!(workflow_id = %workflow_id, error = %err, "Failed to persist compliance report");
        }

        self.active_workflows.remove(&workflow_id);
        self.history.push(workflow.clone());
        if self.history.len() > MAX_WORKFLOW_HISTORY {
            let excess = self.history.len() - MAX_WORKFLOW_HISTORY;
            self.history.drain(..excess);
        }

        info!(workflow_id = %workflow_id, score, "Compliance workflow completed");
        workflow
    }

    fn build_report(&self, workflow: &WorkflowResult, score: f64) -> ComplianceReport {
        let status = if score >= self.threshold {
            ComplianceStatus::Compliant
        } else if score >= self.threshold - 10.0 {
            ComplianceStatus::PartialCompliance
        } else {
            ComplianceStatus::NonCompliant
        };
        ComplianceReport {
            report_id: Uuid::new_v4().to_string(),
            workflow_id: workflow.workflow_id.clone(),
            store_id: workflow.store_id.clone(),
            date: workflow.date,
            compliance_score: score,
            status,
            violations: workflow.violations.clone(),
            recommendations: workflow.recommendations.clone(),
            generated_at: Utc::now(),
        }
    }

    /// Look up a workflow by id, in-flight or finished.
    pub fn workflow_status(&self, workflow_id: &str) -> Option<&WorkflowResult> {
        self.active_workflows.get(workflow_id).or_else(|| {
            self.history
                .iter()
                .find(|w| w.workflow_id == workflow_id)
        })
    }

    /// Most recently started workflows, newest first.
    pub fn recent_workflows(&self, limit: usize) -> Vec<WorkflowResult> {
        let mut all: Vec<WorkflowResult> = self
            .active_workflows
            .values()
            .chain(self.history.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all.truncate(limit);
        all
    }
}

#[async_trait]
impl Agent for ComplianceAgent {
    async fn initialize(&mut self) -> AgentResult<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        info!(threshold = self.threshold, "Compliance agent initialized");
        Ok(())
    }

    async fn process_task(&mut self, payload: Value) -> AgentResult<Value> {
        match payload.get("operation").and_then(Value::as_str) {
            None | Some("check") => {
                let store_id = payload
                    .get("store_id")
                    .and_then(Value::as_str)
                    .unwrap_or("all-stores")
                    .to_string();
                let date = match payload.get("date").and_then(Value::as_str) {
                    Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| {
                        AgentError::InvalidPayload(format!("bad date '{raw}': {err}"))
                    })?,
                    None => Utc::now().date_naive(),
                };

                let workflow = self.run_workflow(&store_id, date);

                Ok(json!({
                    "workflow_id": workflow.workflow_id,
                    "store_id": workflow.store_id,
                    "status": workflow.status,
                    "compliance_score": workflow.compliance_score,
                    "violations": workflow.violations,
                    "recommendations": workflow.recommendations,
                    "result": workflow.result,
                    "completed_at": workflow.completed_at,
                    "error_message": workflow.error_message,
                }))
            }
            Some("workflow_status") => {
                let workflow_id = payload
                    .get("workflow_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AgentError::InvalidPayload("workflow_status requires workflow_id".into())
                    })?;
                Ok(json!({ "workflow": self.workflow_status(workflow_id) }))
            }
            Some("recent_workflows") => {
                let limit = payload.get("limit").and_then(Value::as_u64).unwrap_or(10) as usize;
                Ok(json!({ "workflows": self.recent_workflows(limit) }))
            }
            Some(other) => Err(AgentError::InvalidPayload(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}
