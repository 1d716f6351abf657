//! Knowledge store: named facts shared between agents.
//!
//! Each key holds one record; the most recent write wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::timestamp;

/// A durable named fact and the agent that last wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub value: Value,
    /// Last writer.
    pub agent: String,
    /// Last write time.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Key/value map of [`KnowledgeRecord`]s, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeStore {
    records: BTreeMap<String, KnowledgeRecord>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record under `key`.
    pub fn upsert(
        &mut self,
        key: impl Into<String>,
        value: Value,
        agent: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) {
        self.records.insert(
            key.into(),
            KnowledgeRecord {
                value,
                agent: agent.into(),
                timestamp,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&KnowledgeRecord> {
        self.records.get(key)
    }

    /// All values, optionally restricted to keys starting with `prefix`.
    pub fn values_with_prefix(&self, prefix: Option<&str>) -> BTreeMap<String, Value> {
        self.records
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, record)| (key.clone(), record.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_last_writer_wins() {
        let mut store = KnowledgeStore::new();
        let t0 = Utc::now();
        store.upsert("target.host", json!("a.example"), "scout", t0);
        store.upsert("target.host", json!("b.example"), "miner", t0);

        assert_eq!(store.len(), 1);
        let record = store.get("target.host").unwrap();
        assert_eq!(record.value, json!("b.example"));
        assert_eq!(record.agent, "miner");
    }

    #[test]
    fn test_values_with_prefix() {
        let mut store = KnowledgeStore::new();
        let now = Utc::now();
        store.upsert("net.dns", json!(1), "a", now);
        store.upsert("net.http", json!(2), "a", now);
        store.upsert("fs.root", json!(3), "b", now);

        let net = store.values_with_prefix(Some("net."));
        assert_eq!(net.len(), 2);
        assert_eq!(net["net.http"], json!(2));

        assert_eq!(store.values_with_prefix(None).len(), 3);
        assert!(store.values_with_prefix(Some("zzz")).is_empty());
    }

    #[test]
    fn test_missing_key() {
        let store = KnowledgeStore::new();
        assert!(store.get("nope").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_serializes_as_map() {
        let mut store = KnowledgeStore::new();
        store.upsert("k", json!({"x": 1}), "a", Utc::now());
        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["k"]["value"]["x"], 1);
        assert_eq!(value["k"]["agent"], "a");
        assert!(value["k"]["timestamp"].is_string());
    }
}
