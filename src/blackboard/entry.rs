//! Blackboard entry: a single immutable observation posted by an agent.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BlackboardError, Result};

/// Entry type used when the poster does not supply one.
pub const DEFAULT_ENTRY_TYPE: &str = "info";

/// Number of hex characters in a derived entry id.
pub const ENTRY_ID_LEN: usize = 12;

fn default_confidence() -> f64 {
    1.0
}

fn default_entry_type() -> String {
    DEFAULT_ENTRY_TYPE.to_string()
}

/// An observation on the blackboard.
///
/// Entries are created only through [`Blackboard::post`](crate::Blackboard::post)
/// and are never modified afterwards; fields are exposed read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    agent: String,
    content: Value,
    #[serde(with = "timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_entry_type")]
    entry_type: String,
}

impl Entry {
    /// Producer of this entry.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Opaque payload.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Time the entry was posted.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    /// Short deterministic id derived from agent, timestamp and content.
    ///
    /// Two entries with the same agent, timestamp and content share an id
    /// and are treated as the same logical entry on lookup.
    ///
    /// The digest covers `agent|<RFC 3339 micros>|<sorted compact JSON>`. Ids
    /// recorded by tools that hash a different byte layout (no separators, a
    /// naive local timestamp) will not resolve through
    /// [`Blackboard::get_by_id`](crate::Blackboard::get_by_id); look such
    /// entries up by agent and time instead.
    pub fn id(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.agent.as_bytes());
        hasher.update(b"|");
        hasher.update(timestamp::format(&self.timestamp).as_bytes());
        hasher.update(b"|");
        hasher.update(canonical_content(&self.content).as_bytes());
        let mut id = format!("{:x}", hasher.finalize());
        id.truncate(ENTRY_ID_LEN);
        id
    }
}

/// Compact JSON with object keys in sorted order.
///
/// `serde_json::Map` is a `BTreeMap` unless `preserve_order` is enabled,
/// which this crate does not do.
fn canonical_content(content: &Value) -> String {
    serde_json::to_string(content).unwrap_or_default()
}

/// Builder for a new entry; turned into an [`Entry`] by the blackboard at post time.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub agent: String,
    pub content: Value,
    pub confidence: f64,
    pub tags: Vec<String>,
    pub entry_type: String,
}

impl EntryDraft {
    /// Draft with confidence `1.0`, no tags and entry type `"info"`.
    pub fn new(agent: impl Into<String>, content: Value) -> Self {
        Self {
            agent: agent.into(),
            content,
            confidence: default_confidence(),
            tags: Vec::new(),
            entry_type: default_entry_type(),
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Replace the tag list.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = entry_type.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.agent.trim().is_empty() {
            return Err(BlackboardError::invalid_entry("agent must not be empty"));
        }
        if self.confidence.is_nan() {
            return Err(BlackboardError::invalid_entry("confidence must be a number"));
        }
        Ok(())
    }

    pub(crate) fn into_entry(self, timestamp: DateTime<Utc>) -> Result<Entry> {
        self.validate()?;
        Ok(Entry {
            agent: self.agent,
            content: self.content,
            timestamp,
            confidence: self.confidence,
            tags: self.tags,
            entry_type: self.entry_type,
        })
    }
}

/// Snapshot timestamp encoding.
///
/// Written as RFC 3339 with microsecond precision. Reading also accepts
/// ISO-8601 timestamps without an offset, which are taken as host local time.
pub(crate) mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| {
                // Nonexistent local times (DST gap) fall back to UTC.
                naive
                    .and_local_timezone(Local)
                    .earliest()
                    .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc))
            })
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
