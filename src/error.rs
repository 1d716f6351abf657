//! Error types for the blackboard.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by blackboard operations.
///
/// Only contract violations (`InvalidEntry`) are raised by mutating calls.
/// Persistence errors are logged where they occur and returned from
/// [`save_now`](crate::Blackboard::save_now) so callers may retry.
#[derive(Debug, Error)]
pub enum BlackboardError {
    /// A post was rejected because a required field was missing or malformed.
    #[error("Invalid entry: {reason}")]
    InvalidEntry { reason: String },

    /// Reading or writing the snapshot file failed.
    #[error("Snapshot I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file could not be encoded or decoded.
    #[error("Malformed snapshot at {}: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl BlackboardError {
    pub(crate) fn invalid_entry(reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            reason: reason.into(),
        }
    }
}

/// Result alias for blackboard operations.
pub type Result<T> = std::result::Result<T, BlackboardError>;
