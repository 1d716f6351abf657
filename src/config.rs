//! Blackboard configuration.
//!
//! Values come from defaults, builder calls, or the environment:
//!
//! - `BLACKBOARD_PATH`: snapshot file location (default: `.blackboard/blackboard.json`)
//! - `BLACKBOARD_AUTOSAVE_SECS`: background flush interval in seconds (unset: no autosave)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_STORAGE_PATH: &str = ".blackboard/blackboard.json";

/// Default capacity of channel subscriptions.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`Blackboard`](crate::Blackboard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackboardConfig {
    /// Snapshot file. `None` keeps the blackboard purely in memory.
    #[serde(default = "default_storage_path")]
    pub storage_path: Option<PathBuf>,
    /// Attempt a final save when the blackboard is dropped.
    #[serde(default = "default_true")]
    pub save_on_drop: bool,
    /// Interval for the background autosave worker.
    #[serde(default)]
    pub autosave_interval_secs: Option<u64>,
    /// Queue size for [`subscribe_channel`](crate::Blackboard::subscribe_channel).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_storage_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_STORAGE_PATH))
}

fn default_true() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for BlackboardConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            save_on_drop: true,
            autosave_interval_secs: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BlackboardConfig {
    /// Configuration without any snapshot file.
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            ..Self::default()
        }
    }

    /// Build a configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("BLACKBOARD_PATH") {
            if !path.trim().is_empty() {
                config.storage_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(secs) = env::var("BLACKBOARD_AUTOSAVE_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(n) => config.autosave_interval_secs = Some(n),
                Err(_) => log::warn!("Ignoring invalid BLACKBOARD_AUTOSAVE_SECS={:?}", secs),
            }
        }
        config
    }

    /// Set the snapshot file location.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Enable or disable the save-on-drop flush.
    pub fn with_save_on_drop(mut self, save_on_drop: bool) -> Self {
        self.save_on_drop = save_on_drop;
        self
    }

    /// Enable the background autosave worker.
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval_secs = Some(interval.as_secs().max(1));
        self
    }

    /// Set the queue size for channel subscriptions (minimum 1).
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Autosave interval as a `Duration`, if enabled.
    pub fn autosave_interval(&self) -> Option<Duration> {
        self.autosave_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
