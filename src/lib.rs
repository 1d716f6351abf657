//! # Agent Blackboard
//!
//! A shared-state coordination service for independent worker agents.
//!
//! Agents post timestamped observations, subscribe to topics, query by tag,
//! and share durable key/value knowledge through one [`Blackboard`]. State is
//! persisted as a single JSON snapshot; subscriptions are process-local.

pub mod blackboard;
pub mod cli;
pub mod config;
pub mod error;

pub use blackboard::{
    AutosaveHandle, Blackboard, BlackboardStats, Entry, EntryDraft, KnowledgeRecord, Query,
};
pub use config::BlackboardConfig;
pub use error::{BlackboardError, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
