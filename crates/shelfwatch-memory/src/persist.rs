//! Durable storage backends for agent memory.
//!
//! The store writes whole sets, never deltas: after every episodic or
//! semantic mutation the full updated set is handed to the backend. The
//! backend owns the storage technology; the store does not care what it is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, warn};

use shelfwatch_core::AgentId;

use crate::error::{MemoryError, MemoryResult};
use crate::store::{EpisodicEntry, SemanticEntry};

/// Durable storage contract for per-agent memory sets.
pub trait MemoryPersistence: Send + Sync {
    /// Replace the persisted episodic set for an agent.
    fn write_episodic(&self, agent_id: &AgentId, entries: &[EpisodicEntry]) -> MemoryResult<()>;

    /// Replace the persisted semantic set for an agent.
    fn write_semantic(
        &self,
        agent_id: &AgentId,
        entries: &BTreeMap<String, SemanticEntry>,
    ) -> MemoryResult<()>;

    /// Read the episodic set for an agent. No stored data yields an empty set.
    fn read_episodic(&self, agent_id: &AgentId) -> MemoryResult<Vec<EpisodicEntry>>;

    /// Read the semantic set for an agent. No stored data yields an empty map.
    fn read_semantic(&self, agent_id: &AgentId) -> MemoryResult<BTreeMap<String, SemanticEntry>>;
}

#[derive(Serialize, Deserialize)]
struct EpisodicFile {
    agent_id: AgentId,
    last_updated: DateTime<Utc>,
    memories: Vec<EpisodicEntry>,
}

/// File-backed persistence: one directory per agent under a root, holding
/// `episodic.json` and `semantic.json`.
///
/// Writes go to a temporary file and are renamed into place so a crash
/// mid-write never leaves a truncated set. A file that fails to parse is
/// backed up alongside the original and treated as absent.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn agent_dir(&self, agent_id: &AgentId) -> PathBuf {
        self.root.join(agent_id.as_str())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> MemoryResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| MemoryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(value)?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|source| MemoryError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| MemoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = ?path, "Persisted memory set");
        Ok(())
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> MemoryResult<Option<T>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "Memory file not found, starting fresh");
                return Ok(None);
            }
            Err(source) => {
                return Err(MemoryError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                error!(path = ?path, error = %err, "Failed to parse memory file, starting fresh");
                let backup = path.with_extension(format!("corrupted.{}", Utc::now().timestamp()));
                if let Err(copy_err) = fs::copy(path, &backup) {
                    warn!(path = ?path, error = %copy_err, "Failed to back up corrupted memory file");
                }
                Ok(None)
            }
        }
    }
}

impl MemoryPersistence for FileStore {
    fn write_episodic(&self, agent_id: &AgentId, entries: &[EpisodicEntry]) -> MemoryResult<()> {
        let file = EpisodicFile {
            agent_id: agent_id.clone(),
            last_updated: Utc::now(),
            memories: entries.to_vec(),
        };
        self.write_json(&self.agent_dir(agent_id).join("episodic.json"), &file)
    }

    fn write_semantic(
        &self,
        agent_id: &AgentId,
        entries: &BTreeMap<String, SemanticEntry>,
    ) -> MemoryResult<()> {
        self.write_json(&self.agent_dir(agent_id).join("semantic.json"), entries)
    }

    fn read_episodic(&self, agent_id: &AgentId) -> MemoryResult<Vec<EpisodicEntry>> {
        let file: Option<EpisodicFile> =
            self.read_json(&self.agent_dir(agent_id).join("episodic.json"))?;
        Ok(file.map(|f| f.memories).unwrap_or_default())
    }

    fn read_semantic(&self, agent_id: &AgentId) -> MemoryResult<BTreeMap<String, SemanticEntry>> {
        Ok(self
            .read_json(&self.agent_dir(agent_id).join("semantic.json"))?
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct InMemorySets {
    episodic: HashMap<AgentId, Vec<EpisodicEntry>>,
    semantic: HashMap<AgentId, BTreeMap<String, SemanticEntry>>,
}

/// Ephemeral persistence backend. Useful for tests and for agents whose
/// memory should not outlive the process.
#[derive(Default)]
pub struct InMemoryStore {
    sets: Mutex<InMemorySets>,
}

impl InMemoryStore {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemorySets> {
        // a poisoned lock only means another writer panicked mid-update;
        // the sets themselves are still whole
        self.sets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MemoryPersistence for InMemoryStore {
    fn write_episodic(&self, agent_id: &AgentId, entries: &[EpisodicEntry]) -> MemoryResult<()> {
        self.lock()
            .episodic
            .insert(agent_id.clone(), entries.to_vec());
        Ok(())
    }

    fn write_semantic(
        &self,
        agent_id: &AgentId,
        entries: &BTreeMap<String, SemanticEntry>,
    ) -> MemoryResult<()> {
        self.lock()
            .semantic
            .insert(agent_id.clone(), entries.clone());
        Ok(())
    }

    fn read_episodic(&self, agent_id: &AgentId) -> MemoryResult<Vec<EpisodicEntry>> {
        Ok(self.lock().episodic.get(agent_id).cloned().unwrap_or_default())
    }

    fn read_semantic(&self, agent_id: &AgentId) -> MemoryResult<BTreeMap<String, SemanticEntry>> {
        Ok(self.lock().semantic.get(agent_id).cloned().unwrap_or_default())
    }
}
