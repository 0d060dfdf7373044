//! Compliance domain models.
//!
//! These are collaborator-facing shapes produced and consumed by task
//! handlers; the messaging core only ever sees them as opaque JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution status of a compliance workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Overall compliance verdict for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    PartialCompliance,
    Unknown,
}

/// A single compliance violation found during a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: String,
    /// low, medium, high, critical
    pub severity: String,
    pub description: String,
    pub location: String,
}

/// Result of one compliance workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub store_id: String,
    pub date: NaiveDate,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<f64>,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowResult {
    /// Start tracking a new running workflow.
    pub fn running(store_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            store_id: store_id.into(),
            date,
            status: WorkflowStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            compliance_score: None,
            violations: Vec::new(),
            recommendations: Vec::new(),
            result: None,
            error_message: None,
        }
    }
}

/// Generated compliance report, persisted for management review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub report_id: String,
    pub workflow_id: String,
    pub store_id: String,
    pub date: NaiveDate,
    pub compliance_score: f64,
    pub status: ComplianceStatus,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Retail placement agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: String,
    pub name: String,
    pub store_id: String,
    pub effective_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    pub content: String,
    pub compliance_rules: Vec<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Expected shelf layout for one store section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planogram {
    pub planogram_id: String,
    pub name: String,
    pub store_id: String,
    pub section: String,
    pub layout_data: Value,
    pub effective_date: NaiveDate,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Photo captured in a store, possibly with analysis attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreImage {
    pub image_id: String,
    pub store_id: String,
    pub image_url: String,
    pub captured_at: DateTime<Utc>,
    pub section: String,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_result: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_result_starts_running() {
        let result = WorkflowResult::running("STORE_0001", NaiveDate::from_ymd_opt(2026, 8, 7).unwrap());
        assert_eq!(result.status, WorkflowStatus::Running);
        assert!(result.completed_at.is_none());
        assert!(result.violations.is_empty());
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&ComplianceStatus::NonCompliant).unwrap(),
            "\"non_compliant\""
        );
    }
}
