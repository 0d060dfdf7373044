//! The per-agent memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use shelfwatch_core::AgentId;

use crate::persist::MemoryPersistence;

/// One event in an agent's episodic log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicEntry {
    /// Monotonic per-agent sequence id
    pub id: u64,
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
    /// Owning agent
    pub agent_id: AgentId,
    /// Opaque event payload
    pub data: Value,
}

/// One fact in an agent's semantic map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticEntry {
    /// Opaque stored value
    pub value: Value,
    /// When the fact was last stored
    pub timestamp: DateTime<Utc>,
    /// Owning agent
    pub agent_id: AgentId,
}

/// A semantic retrieval hit: the key together with its entry.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticMatch {
    /// The matched key
    pub key: String,
    #[serde(flatten)]
    pub entry: SemanticEntry,
}

#[derive(Debug, Clone)]
struct WorkingEntry {
    value: Value,
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
}

/// Filter for episodic retrieval. All fields are optional and combine
/// conjunctively; the timestamp range is inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct EpisodicQuery {
    /// Match entries whose `data.event` equals this value
    pub event: Option<String>,
    /// Earliest timestamp to include
    pub start: Option<DateTime<Utc>>,
    /// Latest timestamp to include
    pub end: Option<DateTime<Utc>>,
}

impl EpisodicQuery {
    fn matches(&self, entry: &EpisodicEntry) -> bool {
        if let Some(event) = &self.event {
            if entry.data.get("event").and_then(Value::as_str) != Some(event.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if entry.timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Memory store tuning knobs.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Episodic entries older than this many days are pruned on every write
    pub retention_days: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// Memory usage counters for one agent.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub agent_id: AgentId,
    pub episodic_count: usize,
    pub semantic_count: usize,
    pub working_count: usize,
    pub oldest_episodic: Option<DateTime<Utc>>,
    pub newest_episodic: Option<DateTime<Utc>>,
}

/// Episodic, semantic and working memory for a single agent.
///
/// State is private to the owning agent instance; callers that share a
/// store across dispatch paths must serialize access externally. Every
/// episodic or semantic write persists the full updated set synchronously
/// through the configured [`MemoryPersistence`] backend; a failed write is
/// logged and the in-memory state stays authoritative.
pub struct MemoryStore {
    agent_id: AgentId,
    config: MemoryConfig,
    persistence: Arc<dyn MemoryPersistence>,
    episodic: Vec<EpisodicEntry>,
    semantic: BTreeMap<String, SemanticEntry>,
    working: HashMap<String, WorkingEntry>,
    next_sequence: u64,
}

impl MemoryStore {
    /// Open the store for an agent, loading any previously persisted sets.
    ///
    /// A backend read failure starts the affected set fresh; it does not
    /// prevent the store from opening.
    pub fn open(
        agent_id: AgentId,
        config: MemoryConfig,
        persistence: Arc<dyn MemoryPersistence>,
    ) -> Self {
        let episodic = match persistence.read_episodic(&agent_id) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "Failed to load episodic memory, starting fresh");
                Vec::new()
            }
        };
        let semantic = match persistence.read_semantic(&agent_id) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "Failed to load semantic memory, starting fresh");
                BTreeMap::new()
            }
        };

        let next_sequence = episodic.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        debug!(
            agent_id = %agent_id,
            episodic = episodic.len(),
            semantic = semantic.len(),
            "Loaded memories"
        );

        Self {
            agent_id,
            config,
            persistence,
            episodic,
            semantic,
            working: HashMap::new(),
            next_sequence,
        }
    }

    /// The owning agent's id.
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Append an episodic event, returning its sequence id.
    ///
    /// Retention pruning runs on every write, then the full updated set is
    /// persisted synchronously.
    pub fn store_episodic(&mut self, data: Value) -> u64 {
        let id = self.next_sequence;
        self.next_sequence += 1;
        self.episodic.push(EpisodicEntry {
            id,
            timestamp: Utc::now(),
            agent_id: self.agent_id.clone(),
            data,
        });

        self.prune_episodic();

        if let Err(err) = self
            .persistence
            .write_episodic(&self.agent_id, &self.episodic)
        {
            warn!(agent_id = %self.agent_id, error = %err, "Failed to persist episodic memory");
        }
        debug!(agent_id = %self.agent_id, sequence = id, "Stored episodic memory");
        id
    }

    /// Upsert a semantic fact under `key` and persist the updated set.
    pub fn store_semantic(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.semantic.insert(
            key.clone(),
            SemanticEntry {
                value,
                timestamp: Utc::now(),
                agent_id: self.agent_id.clone(),
            },
        );

        if let Err(err) = self
            .persistence
            .write_semantic(&self.agent_id, &self.semantic)
        {
            warn!(agent_id = %self.agent_id, error = %err, "Failed to persist semantic memory");
        }
        debug!(agent_id = %self.agent_id, key = %key, "Stored semantic memory");
    }

    /// Retrieve episodic entries, most recent first, truncated to `limit`.
    pub fn retrieve_episodic(
        &self,
        query: Option<&EpisodicQuery>,
        limit: usize,
    ) -> Vec<EpisodicEntry> {
        let mut matches: Vec<EpisodicEntry> = self
            .episodic
            .iter()
            .filter(|entry| query.is_none_or(|q| q.matches(entry)))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit);
        matches
    }

    /// Retrieve semantic entries.
    ///
    /// An empty query returns the first `limit` entries in key order; a
    /// non-empty query does a case-insensitive substring match against the
    /// key or the stringified value.
    pub fn retrieve_semantic(&self, query: &str, limit: usize) -> Vec<SemanticMatch> {
        let needle = query.to_lowercase();
        self.semantic
            .iter()
            .filter(|(key, entry)| {
                needle.is_empty()
                    || key.to_lowercase().contains(&needle)
                    || entry.value.to_string().to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|(key, entry)| SemanticMatch {
                key: key.clone(),
                entry: entry.clone(),
            })
            .collect()
    }

    /// Set a working-memory value. Never persisted.
    pub fn set_working(&mut self, key: impl Into<String>, value: Value) {
        self.working.insert(
            key.into(),
            WorkingEntry {
                value,
                timestamp: Utc::now(),
            },
        );
    }

    /// Get a working-memory value.
    pub fn get_working(&self, key: &str) -> Option<Value> {
        self.working.get(key).map(|entry| entry.value.clone())
    }

    /// Clear all working memory.
    pub fn clear_working(&mut self) {
        self.working.clear();
        debug!(agent_id = %self.agent_id, "Cleared working memory");
    }

    /// Memory usage counters.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            agent_id: self.agent_id.clone(),
            episodic_count: self.episodic.len(),
            semantic_count: self.semantic.len(),
            working_count: self.working.len(),
            oldest_episodic: self.episodic.iter().map(|e| e.timestamp).min(),
            newest_episodic: self.episodic.iter().map(|e| e.timestamp).max(),
        }
    }

    fn prune_episodic(&mut self) {
        let Some(cutoff) = chrono::Duration::try_days(i64::from(self.config.retention_days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
        else {
            return;
        };

        let before = self.episodic.len();
        self.episodic.retain(|entry| entry.timestamp > cutoff);
        let removed = before - self.episodic.len();
        if removed > 0 {
            info!(agent_id = %self.agent_id, removed, "Pruned old episodic memories");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::InMemoryStore;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::open(
            AgentId::from("tester"),
            MemoryConfig::default(),
            Arc::new(InMemoryStore::new()),
        )
    }

    #[test]
    fn episodic_sequence_ids_are_monotonic() {
        let mut mem = store();
        let a = mem.store_episodic(json!({ "event": "one" }));
        let b = mem.store_episodic(json!({ "event": "two" }));
        assert_eq!(b, a + 1);
    }

    #[test]
    fn episodic_retrieval_is_newest_first_and_limited() {
        let mut mem = store();
        for n in 0..5 {
            mem.store_episodic(json!({ "event": "tick", "n": n }));
        }

        let results = mem.retrieve_episodic(None, 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].id > results[1].id);
        assert!(results[1].id > results[2].id);
    }

    #[test]
    fn episodic_event_filter() {
        let mut mem = store();
        mem.store_episodic(json!({ "event": "task_completed", "task": "t-1" }));
        mem.store_episodic(json!({ "event": "broadcast_received" }));

        let query = EpisodicQuery {
            event: Some("task_completed".to_string()),
            ..EpisodicQuery::default()
        };
        let results = mem.retrieve_episodic(Some(&query), 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].data["task"], "t-1");
    }

    #[test]
    fn episodic_time_range_is_inclusive() {
        let mut mem = store();
        mem.store_episodic(json!({ "event": "tick" }));
        let stamp = mem.retrieve_episodic(None, 1)[0].timestamp;

        let query = EpisodicQuery {
            start: Some(stamp),
            end: Some(stamp),
            ..EpisodicQuery::default()
        };
        assert_eq!(mem.retrieve_episodic(Some(&query), 10).len(), 1);

        let excludes = EpisodicQuery {
            start: Some(stamp + chrono::Duration::seconds(1)),
            ..EpisodicQuery::default()
        };
        assert!(mem.retrieve_episodic(Some(&excludes), 10).is_empty());
    }

    #[test]
    fn retention_prunes_old_entries_on_write() {
        let agent = AgentId::from("pruner");
        let persistence = Arc::new(InMemoryStore::new());
        // seed the backend with an entry far outside the retention window
        persistence
            .write_episodic(
                &agent,
                &[EpisodicEntry {
                    id: 1,
                    timestamp: Utc::now() - chrono::Duration::days(90),
                    agent_id: agent.clone(),
                    data: json!({ "event": "ancient" }),
                }],
            )
            .unwrap();

        let mut mem = MemoryStore::open(agent, MemoryConfig::default(), persistence);
        assert_eq!(mem.retrieve_episodic(None, usize::MAX).len(), 1);

        mem.store_episodic(json!({ "event": "fresh" }));
        let remaining = mem.retrieve_episodic(None, usize::MAX);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].data["event"], "fresh");
        // sequence ids continue past the pruned entry
        assert_eq!(remaining[0].id, 2);
    }

    #[test]
    fn semantic_overwrites_on_restore() {
        let mut mem = store();
        mem.store_semantic("threshold", json!(85.0));
        mem.store_semantic("threshold", json!(90.0));

        let results = mem.retrieve_semantic("threshold", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.value, json!(90.0));
    }

    #[test]
    fn semantic_substring_match_is_case_insensitive() {
        let mut mem = store();
        mem.store_semantic("store_layout", json!("Beverage aisle, END-CAP"));
        mem.store_semantic("unrelated", json!(42));

        assert_eq!(mem.retrieve_semantic("LAYOUT", 10).len(), 1);
        assert_eq!(mem.retrieve_semantic("end-cap", 10).len(), 1);
        assert!(mem.retrieve_semantic("missing", 10).is_empty());
    }

    #[test]
    fn semantic_empty_query_returns_entries_in_key_order() {
        let mut mem = store();
        mem.store_semantic("b_key", json!(2));
        mem.store_semantic("a_key", json!(1));
        mem.store_semantic("c_key", json!(3));

        let results = mem.retrieve_semantic("", 2);
        let keys: Vec<&str> = results.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a_key", "b_key"]);
    }

    #[test]
    fn working_memory_is_scratch_only() {
        let mut mem = store();
        mem.set_working("cursor", json!("aisle-3"));
        assert_eq!(mem.get_working("cursor"), Some(json!("aisle-3")));
        assert_eq!(mem.get_working("missing"), None);

        mem.clear_working();
        assert_eq!(mem.get_working("cursor"), None);
    }

    #[test]
    fn stats_report_counts_and_bounds() {
        let mut mem = store();
        mem.store_episodic(json!({ "event": "a" }));
        mem.store_episodic(json!({ "event": "b" }));
        mem.store_semantic("k", json!(1));
        mem.set_working("w", json!(true));

        let stats = mem.stats();
        assert_eq!(stats.episodic_count, 2);
        assert_eq!(stats.semantic_count, 1);
        assert_eq!(stats.working_count, 1);
        assert!(stats.oldest_episodic <= stats.newest_episodic);
    }
}
