//! Blackboard: the shared coordination object.
//!
//! One mutex guards the combined state (entries, knowledge, subscriptions,
//! dirty flag). Every mutation and every multi-step read holds it for its
//! whole critical section. Snapshot I/O and subscriber delivery happen with
//! the state lock released.
//!
//! Posts also take a reentrant dispatch lock *before* the state lock and hold
//! it until their notifications are delivered. Notifications therefore go out
//! in post order, callbacks may read from or post to the blackboard, and
//! readers are never blocked by a slow callback.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::sync::mpsc;

use super::entry::{Entry, EntryDraft};
use super::knowledge::{KnowledgeRecord, KnowledgeStore};
use super::persistence::{Snapshot, SnapshotFile};
use super::query::Query;
use super::stats::BlackboardStats;
use super::subscription::{self, Sink, SubscriptionRegistry};
use crate::config::BlackboardConfig;
use crate::error::Result;

/// Mutable state behind the blackboard lock.
#[derive(Debug, Default)]
struct State {
    /// Sorted by timestamp ascending; ties in insertion order.
    entries: Vec<Entry>,
    knowledge: KnowledgeStore,
    subscriptions: SubscriptionRegistry,
    dirty: bool,
    /// Bumped on every persisted mutation.
    generation: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Loaded entries newer than the local clock do not raise the timestamp floor.
    fn restore(&mut self, snapshot: Snapshot) {
        let now = Utc::now().trunc_subsecs(6);
        self.last_timestamp = snapshot.entries.last().map(|e| e.timestamp().min(now));
        self.entries = snapshot.entries;
        self.knowledge = snapshot.knowledge_base;
    }

    /// Current time at microsecond precision, never earlier than the last post.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let ts = match self.last_timestamp {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn insert(&mut self, entry: Entry) {
        let at = self
            .entries
            .partition_point(|e| e.timestamp() <= entry.timestamp());
        self.entries.insert(at, entry);
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.generation += 1;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.clone(),
            knowledge_base: self.knowledge.clone(),
        }
    }
}

/// Shared blackboard for independent agents.
///
/// Construct one with [`Blackboard::open`] and share it by `Arc`.
///
/// # Example
///
/// ```
/// use agent_blackboard::{Blackboard, BlackboardConfig, EntryDraft, Query};
/// use serde_json::json;
///
/// let bb = Blackboard::open(BlackboardConfig::in_memory());
/// bb.post(EntryDraft::new("scout", json!({"host": "db-1"})).tags(["net.dns"]).confidence(0.7))
///     .unwrap();
///
/// let hits = bb.query("planner", &Query::tags(["dns"]));
/// assert_eq!(hits.len(), 1);
/// ```
pub struct Blackboard {
    config: BlackboardConfig,
    snapshot_file: Option<SnapshotFile>,
    state: Mutex<State>,
    dispatch: ReentrantMutex<()>,
    save_lock: Mutex<()>,
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Blackboard {
    /// Open a blackboard, loading the configured snapshot if one exists.
    ///
    /// An unreadable or corrupt snapshot is logged and the blackboard starts empty.
    pub fn open(config: BlackboardConfig) -> Self {
        let snapshot_file = config.storage_path.clone().map(SnapshotFile::new);
        let mut state = State::default();

        if let Some(file) = &snapshot_file {
            match file.load() {
                Ok(Some(snapshot)) => {
                    log::debug!(
                        "[blackboard] loaded {} entries and {} knowledge keys from {}",
                        snapshot.entries.len(),
                        snapshot.knowledge_base.len(),
                        file.path().display()
                    );
                    state.restore(snapshot);
                }
                Ok(None) => {
                    log::debug!("[blackboard] no snapshot at {}, starting empty", file.path().display());
                }
                Err(e) => {
                    log::error!("[blackboard] failed to load snapshot, starting empty: {}", e);
                }
            }
        }

        Self {
            config,
            snapshot_file,
            state: Mutex::new(state),
            dispatch: ReentrantMutex::new(()),
            save_lock: Mutex::new(()),
        }
    }

    /// Open with [`BlackboardConfig::from_env`].
    pub fn from_env() -> Self {
        Self::open(BlackboardConfig::from_env())
    }

    pub fn config(&self) -> &BlackboardConfig {
        &self.config
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.snapshot_file.as_ref().map(SnapshotFile::path)
    }

    // --- Entry store ---

    /// Post a new entry and notify subscribers of each of its tags.
    ///
    /// Fails only when the draft violates the entry contract (empty agent,
    /// NaN confidence). Subscriber failures never affect the result.
    pub fn post(&self, draft: EntryDraft) -> Result<Entry> {
        draft.validate()?;

        let _dispatch = self.dispatch.lock();
        let (entry, recipients) = {
            let mut state = self.state.lock();
            let timestamp = state.next_timestamp();
            let entry = draft.into_entry(timestamp)?;
            state.insert(entry.clone());
            state.touch();
            let recipients = state.subscriptions.recipients(entry.tags());
            (entry, recipients)
        };

        log::debug!(
            "[blackboard] post by '{}' type={} tags={:?} -> {} subscriber(s)",
            entry.agent(),
            entry.entry_type(),
            entry.tags(),
            recipients.len()
        );

        if !recipients.is_empty() {
            let report = subscription::deliver(&recipients, &entry);
            if !report.closed.is_empty() {
                self.state.lock().subscriptions.remove_ids(&report.closed);
            }
        }

        Ok(entry)
    }

    /// The most recent `limit` entries by `agent`, oldest first.
    pub fn get_latest_by_agent(&self, agent: &str, limit: usize) -> Vec<Entry> {
        let state = self.state.lock();
        let mut latest: Vec<Entry> = state
            .entries
            .iter()
            .rev()
            .filter(|e| e.agent() == agent)
            .take(limit)
            .cloned()
            .collect();
        latest.reverse();
        latest
    }

    /// First entry whose derived id equals `id`.
    pub fn get_by_id(&self, id: &str) -> Option<Entry> {
        let state = self.state.lock();
        state.entries.iter().find(|e| e.id() == id).cloned()
    }

    /// Remove every entry, or only those posted by `agent`.
    ///
    /// Knowledge is untouched. Returns the number of entries removed.
    pub fn clear(&self, agent: Option<&str>) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        match agent {
            Some(agent) => state.entries.retain(|e| e.agent() != agent),
            None => state.entries.clear(),
        }
        let removed = before - state.entries.len();
        if removed > 0 {
            state.touch();
        }
        removed
    }

    /// Copy of every entry in store order.
    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    // --- Query engine ---

    /// Entries matching `query`, highest confidence first.
    pub fn query(&self, requesting_agent: &str, query: &Query) -> Vec<Entry> {
        let state = self.state.lock();
        let hits = query.run(&state.entries);
        log::debug!(
            "[blackboard] query by '{}' tags={:?} -> {} hit(s)",
            requesting_agent,
            query.tags,
            hits.len()
        );
        hits
    }

    // --- Subscription registry ---

    /// Call `callback` synchronously for every future entry tagged with one of `topics`.
    ///
    /// Callbacks run on the posting thread and must not block on other posters.
    pub fn subscribe<F, I, S>(&self, agent: impl Into<String>, callback: F, topics: I)
    where
        F: Fn(&Entry) -> anyhow::Result<()> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .subscriptions
            .subscribe(agent, Sink::Callback(Arc::new(callback)), topics);
    }

    /// Receive future entries tagged with one of `topics` through a bounded queue.
    ///
    /// When the queue is full new entries are dropped for this subscriber.
    /// Dropping the receiver ends the subscription.
    pub fn subscribe_channel<I, S>(&self, agent: impl Into<String>, topics: I) -> mpsc::Receiver<Entry>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        self.state
            .lock()
            .subscriptions
            .subscribe(agent, Sink::Channel(tx), topics);
        rx
    }

    /// Remove `agent`'s registrations under `topics`, or everywhere when `None`.
    pub fn unsubscribe(&self, agent: &str, topics: Option<&[String]>) -> usize {
        self.state.lock().subscriptions.unsubscribe(agent, topics)
    }

    // --- Knowledge store ---

    /// Insert or overwrite a knowledge record; the last writer wins.
    pub fn store_knowledge(&self, key: impl Into<String>, value: Value, agent: impl Into<String>) {
        let key = key.into();
        let agent = agent.into();
        let mut state = self.state.lock();
        log::debug!("[blackboard] knowledge '{}' written by '{}'", key, agent);
        state
            .knowledge
            .upsert(key, value, agent, Utc::now().trunc_subsecs(6));
        state.touch();
    }

    pub fn retrieve_knowledge(&self, key: &str) -> Option<Value> {
        self.state.lock().knowledge.get(key).map(|r| r.value.clone())
    }

    /// Full record for `key`, including its last writer and write time.
    pub fn knowledge_record(&self, key: &str) -> Option<KnowledgeRecord> {
        self.state.lock().knowledge.get(key).cloned()
    }

    /// All knowledge values, optionally limited to keys starting with `prefix`.
    pub fn get_all_knowledge(&self, prefix: Option<&str>) -> BTreeMap<String, Value> {
        self.state.lock().knowledge.values_with_prefix(prefix)
    }

    // --- Stats ---

    pub fn get_stats(&self) -> BlackboardStats {
        let state = self.state.lock();
        let mut stats = BlackboardStats::tally(&state.entries);
        stats.knowledge_keys = state.knowledge.len();
        stats.subscribers = state.subscriptions.subscription_count();
        stats.topics = state.subscriptions.topic_count();
        stats.dirty = state.dirty;
        stats
    }

    // --- Persistence ---

    /// Whether there are mutations not yet written by [`save_now`](Self::save_now).
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Write the snapshot if anything changed since the last save.
    ///
    /// Returns `Ok(true)` when a write happened and `Ok(false)` when there was
    /// nothing to do (clean state or no storage path). On failure the error is
    /// logged, the state stays dirty, and the call may be retried.
    pub fn save_now(&self) -> Result<bool> {
        let Some(file) = &self.snapshot_file else {
            return Ok(false);
        };
        let _saving = self.save_lock.lock();

        let (snapshot, generation) = {
            let state = self.state.lock();
            if !state.dirty {
                return Ok(false);
            }
            (state.snapshot(), state.generation)
        };

        if let Err(e) = file.save(&snapshot) {
            log::error!("[blackboard] save failed, state kept in memory: {}", e);
            return Err(e);
        }

        let mut state = self.state.lock();
        if state.generation == generation {
            state.dirty = false;
        }
        Ok(true)
    }

    /// Final flush; equivalent to [`save_now`](Self::save_now).
    pub fn shutdown(&self) -> Result<bool> {
        self.save_now()
    }

    // --- Autosave ---

    /// Start the autosave worker if the configuration asks for one.
    pub fn start_autosave(self: &Arc<Self>) -> Option<AutosaveHandle> {
        self.config
            .autosave_interval()
            .map(|interval| self.spawn_autosave(interval))
    }

    /// Call [`save_now`](Self::save_now) every `interval` on a background thread.
    ///
    /// The worker holds only a weak reference and exits once the blackboard
    /// is dropped or the handle is stopped.
    pub fn spawn_autosave(self: &Arc<Self>, interval: Duration) -> AutosaveHandle {
        let board: Weak<Blackboard> = Arc::downgrade(self);
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let worker_signal = Arc::clone(&signal);

        let thread = thread::Builder::new()
            .name("blackboard-autosave".to_string())
            .spawn(move || {
                let (stopped, cvar) = &*worker_signal;
                loop {
                    {
                        let mut stopped = stopped.lock();
                        if !*stopped {
                            cvar.wait_for(&mut stopped, interval);
                        }
                        if *stopped {
                            break;
                        }
                    }
                    let Some(board) = board.upgrade() else {
                        break;
                    };
                    // Errors are logged by save_now.
                    let _ = board.save_now();
                }
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("[blackboard] failed to spawn autosave worker: {}", e);
                None
            }
        };

        AutosaveHandle { signal, thread }
    }
}

impl Drop for Blackboard {
    fn drop(&mut self) {
        if self.config.save_on_drop {
            let _ = self.save_now();
        }
    }
}

/// Handle to the autosave worker; stops it when dropped.
#[derive(Debug)]
pub struct AutosaveHandle {
    signal: Arc<(Mutex<bool>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    /// Stop the worker and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let (stopped, cvar) = &*self.signal;
        *stopped.lock() = true;
        cvar.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[blackboard] autosave worker panicked");
            }
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
