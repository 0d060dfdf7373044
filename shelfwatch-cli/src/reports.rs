//! JSON artifact persistence, standing in for blob storage.
//!
//! Reports and mock artifacts land as JSON files under the data directory.
//! Writes go through a temporary file and a rename so readers never see a
//! half-written artifact.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ComplianceReport, Contract, Planogram, StoreImage, WorkflowResult};

/// Errors raised while persisting artifacts.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// File-backed artifact store.
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    /// Create a store rooted at the data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist a workflow result under `reports/`.
    pub fn save_workflow_result(&self, result: &WorkflowResult) -> Result<PathBuf, ReportError> {
        let path = self
            .root
            .join("reports")
            .join(format!("workflow_{}.json", result.workflow_id));
        self.write_json(&path, result)?;
        info!(workflow_id = %result.workflow_id, path = ?path, "Saved workflow result");
        Ok(path)
    }

    /// Persist a generated compliance report under `reports/`.
    pub fn save_report(&self, report: &ComplianceReport) -> Result<PathBuf, ReportError> {
        let path = self
            .root
            .join("reports")
            .join(format!("report_{}.json", report.report_id));
        self.write_json(&path, report)?;
        info!(report_id = %report.report_id, path = ?path, "Saved compliance report");
        Ok(path)
    }

    /// Persist a contract under `contracts/`.
    pub fn upload_contract(&self, contract: &Contract) -> Result<PathBuf, ReportError> {
        let path = self
            .root
            .join("contracts")
            .join(format!("{}.json", contract.contract_id));
        self.write_json(&path, contract)?;
        Ok(path)
    }

    /// Persist a planogram under `planograms/`.
    pub fn upload_planogram(&self, planogram: &Planogram) -> Result<PathBuf, ReportError> {
        let path = self
            .root
            .join("planograms")
            .join(format!("{}.json", planogram.planogram_id));
        self.write_json(&path, planogram)?;
        Ok(path)
    }

    /// Persist a store image record under `images/`.
    pub fn upload_image(&self, image: &StoreImage) -> Result<PathBuf, ReportError> {
        let path = self
            .root
            .join("images")
            .join(format!("{}.json", image.image_id));
        self.write_json(&path, image)?;
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(value)?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|source| ReportError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = ?path, "Wrote artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowStatus;
    use chrono::NaiveDate;

    #[test]
    fn workflow_result_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());

        let mut result = WorkflowResult::running(
            "STORE_0003",
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
        );
        result.status = WorkflowStatus::Completed;
        result.compliance_score = Some(88.5);

        let path = store.save_workflow_result(&result).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded: WorkflowResult =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.workflow_id, result.workflow_id);
        assert_eq!(loaded.compliance_score, Some(88.5));
    }
}
