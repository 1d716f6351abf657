//! Aggregate counts for operational inspection.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::Entry;

/// Snapshot of blackboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackboardStats {
    pub total_entries: usize,
    pub knowledge_keys: usize,
    /// Registrations across all topics.
    pub subscribers: usize,
    pub topics: usize,
    pub entries_by_agent: BTreeMap<String, usize>,
    pub entries_by_type: BTreeMap<String, usize>,
    /// Unsaved mutations pending.
    pub dirty: bool,
}

impl BlackboardStats {
    pub(crate) fn tally<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total_entries += 1;
            *stats
                .entries_by_agent
                .entry(entry.agent().to_string())
                .or_default() += 1;
            *stats
                .entries_by_type
                .entry(entry.entry_type().to_string())
                .or_default() += 1;
        }
        stats
    }
}

impl fmt::Display for BlackboardStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Entries:        {}", self.total_entries)?;
        writeln!(f, "Knowledge keys: {}", self.knowledge_keys)?;
        writeln!(f, "Subscribers:    {} ({} topics)", self.subscribers, self.topics)?;
        if !self.entries_by_agent.is_empty() {
            writeln!(f, "By agent:")?;
            for (agent, count) in &self.entries_by_agent {
                writeln!(f, "  {agent:<24} {count}")?;
            }
        }
        if !self.entries_by_type.is_empty() {
            writeln!(f, "By type:")?;
            for (entry_type, count) in &self.entries_by_type {
                writeln!(f, "  {entry_type:<24} {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::entry::EntryDraft;
    use serde_json::json;

    #[test]
    fn test_tally_breakdowns() {
        let now = chrono::Utc::now();
        let entries = vec![
            EntryDraft::new("scout", json!(1)).into_entry(now).unwrap(),
            EntryDraft::new("scout", json!(2)).entry_type("alert").into_entry(now).unwrap(),
            EntryDraft::new("miner", json!(3)).into_entry(now).unwrap(),
        ];
        let stats = BlackboardStats::tally(&entries);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.entries_by_agent["scout"], 2);
        assert_eq!(stats.entries_by_agent["miner"], 1);
        assert_eq!(stats.entries_by_type["info"], 2);
        assert_eq!(stats.entries_by_type["alert"], 1);
    }

    #[test]
    fn test_display_lists_sections() {
        let now = chrono::Utc::now();
        let entries = vec![EntryDraft::new("scout", json!(1)).into_entry(now).unwrap()];
        let mut stats = BlackboardStats::tally(&entries);
        stats.knowledge_keys = 4;
        let text = stats.to_string();
        assert!(text.contains("Entries:        1"));
        assert!(text.contains("Knowledge keys: 4"));
        assert!(text.contains("By agent:"));
        assert!(text.contains("scout"));
    }

    #[test]
    fn test_display_empty() {
        let text = BlackboardStats::default().to_string();
        assert!(!text.contains("By agent:"));
        assert!(text.contains("Subscribers:    0 (0 topics)"));
    }
}
