//! Application settings with file and environment overrides.
//!
//! Precedence, lowest to highest: built-in defaults, an optional
//! `shelfwatch.toml`, then `SHELFWATCH_*` environment variables.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Application-wide configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment tag (development, production, mock)
    pub environment: String,
    /// `single` runs one check; `continuous` keeps monitoring
    pub run_mode: String,
    /// Root directory for reports, mock artifacts and agent memory
    pub data_dir: PathBuf,
    /// Seconds between checks in continuous monitoring mode
    pub monitoring_interval_secs: u64,
    /// Score below which a store counts as non-compliant
    pub compliance_threshold: f64,
    /// Episodic memory retention in days
    pub memory_retention_days: u32,
    /// Seconds to wait for a workflow result before giving up
    pub task_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            run_mode: "single".to_string(),
            data_dir: PathBuf::from("data"),
            monitoring_interval_secs: 3600,
            compliance_threshold: 85.0,
            memory_retention_days: 30,
            task_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings: defaults, then the config file (if present), then
    /// environment overrides.
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new("shelfwatch.toml");
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env_overrides();
        settings
    }

    fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = ?path, error = %err, "Failed to parse config file, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = ?path, error = %err, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("SHELFWATCH_ENVIRONMENT") {
            self.environment = value;
        }
        if let Ok(value) = env::var("SHELFWATCH_RUN_MODE") {
            self.run_mode = value;
        }
        if let Ok(value) = env::var("SHELFWATCH_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Ok(value) = env::var("SHELFWATCH_MONITORING_INTERVAL") {
            match value.parse() {
                Ok(parsed) => self.monitoring_interval_secs = parsed,
                Err(_) => warn!(value = %value, "Ignoring invalid SHELFWATCH_MONITORING_INTERVAL"),
            }
        }
        if let Ok(value) = env::var("SHELFWATCH_COMPLIANCE_THRESHOLD") {
            match value.parse() {
                Ok(parsed) => self.compliance_threshold = parsed,
                Err(_) => warn!(value = %value, "Ignoring invalid SHELFWATCH_COMPLIANCE_THRESHOLD"),
            }
        }
        if let Ok(value) = env::var("SHELFWATCH_MEMORY_RETENTION_DAYS") {
            match value.parse() {
                Ok(parsed) => self.memory_retention_days = parsed,
                Err(_) => warn!(value = %value, "Ignoring invalid SHELFWATCH_MEMORY_RETENTION_DAYS"),
            }
        }
        if let Ok(value) = env::var("SHELFWATCH_TASK_TIMEOUT") {
            match value.parse() {
                Ok(parsed) => self.task_timeout_secs = parsed,
                Err(_) => warn!(value = %value, "Ignoring invalid SHELFWATCH_TASK_TIMEOUT"),
            }
        }
    }

    /// Create the data directory tree this process writes into.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for subdir in ["contracts", "planograms", "images", "reports", "memory"] {
            std::fs::create_dir_all(self.data_dir.join(subdir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.run_mode, "single");
        assert_eq!(settings.compliance_threshold, 85.0);
        assert_eq!(settings.memory_retention_days, 30);
    }

    #[test]
    fn toml_overrides_defaults() {
        let parsed: Settings = toml::from_str(
            r#"
            environment = "production"
            compliance_threshold = 92.5
            "#,
        )
        .unwrap();
        assert_eq!(parsed.environment, "production");
        assert_eq!(parsed.compliance_threshold, 92.5);
        // untouched fields keep their defaults
        assert_eq!(parsed.monitoring_interval_secs, 3600);
    }

    #[test]
    fn ensure_directories_builds_tree() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().join("data"),
            ..Settings::default()
        };
        settings.ensure_directories().unwrap();
        assert!(dir.path().join("data/reports").is_dir());
        assert!(dir.path().join("data/memory").is_dir());
    }
}
