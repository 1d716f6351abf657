//! Blackboard: shared state for agents that never talk to each other directly.
//!
//! Agents post immutable [`Entry`] observations, subscribe to topics, and
//! share named facts through the knowledge store. Everything lives behind a
//! single [`Blackboard`] value that callers construct explicitly and pass
//! around by `Arc`; there is no global instance.
//!
//! # Components
//!
//! - [`entry`]: the observation type and its derived id.
//! - [`query`]: tag/time/type/confidence filtering with confidence ranking.
//! - [`subscription`]: topic routing to callbacks and bounded channels.
//! - [`knowledge`]: last-writer-wins key/value facts.
//! - [`persistence`]: JSON snapshot of entries and knowledge.
//! - [`board`]: the locked combination of all of the above.

pub mod board;
pub mod entry;
pub mod knowledge;
pub mod persistence;
pub mod query;
pub mod stats;
pub mod subscription;

pub use board::{AutosaveHandle, Blackboard};
pub use entry::{Entry, EntryDraft, DEFAULT_ENTRY_TYPE};
pub use knowledge::{KnowledgeRecord, KnowledgeStore};
pub use persistence::{Snapshot, SnapshotFile};
pub use query::{tags_match, Query, DEFAULT_MAX_RESULTS};
pub use stats::BlackboardStats;
pub use subscription::{Callback, DeliveryReport, Sink, SubscriptionRegistry};
