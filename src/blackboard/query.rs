//! Query engine: filtering and ranking over the entry store.
//!
//! # Tag matching
//!
//! An empty tag list matches every entry. Otherwise each query tag must be
//! a case-insensitive substring of at least one of the entry's tags. A single
//! entry tag may satisfy several query tags, so `["net", "dns"]` matches an
//! entry tagged `["net.dns"]`. Callers narrow results with prefixed tags.

use chrono::{DateTime, Utc};

use super::entry::Entry;

/// Default cap on the number of results.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Filter and ranking parameters for [`Blackboard::query`](crate::Blackboard::query).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub tags: Vec<String>,
    /// Only entries strictly newer than this.
    pub since: Option<DateTime<Utc>>,
    /// Exact entry type match.
    pub entry_type: Option<String>,
    pub min_confidence: f64,
    pub max_results: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            since: None,
            entry_type: None,
            min_confidence: 0.0,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl Query {
    /// Query matching any entry carrying all of `tags`.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Whether `entry` passes every filter.
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(since) = self.since {
            if entry.timestamp() <= since {
                return false;
            }
        }
        if let Some(entry_type) = &self.entry_type {
            if entry.entry_type() != entry_type {
                return false;
            }
        }
        if entry.confidence() < self.min_confidence {
            return false;
        }
        tags_match(&self.tags, entry.tags())
    }

    /// Filter `entries` (in store order), rank by confidence and cap.
    pub fn run<'a, I>(&self, entries: I) -> Vec<Entry>
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let mut hits: Vec<Entry> = entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();
        // Stable: equal confidences keep store order.
        hits.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        hits.truncate(self.max_results);
        hits
    }
}

/// Case-insensitive substring tag match, all query tags required.
pub fn tags_match(query_tags: &[String], entry_tags: &[String]) -> bool {
    if query_tags.is_empty() {
        return true;
    }
    let entry_tags: Vec<String> = entry_tags.iter().map(|t| t.to_lowercase()).collect();
    query_tags.iter().all(|q| {
        let q = q.to_lowercase();
        entry_tags.iter().any(|t| t.contains(&q))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
