//! Subscription registry: topic routing for newly posted entries.
//!
//! Subscribers register a sink under one or more topics. When an entry is
//! posted, every sink registered under each of the entry's tags (exact
//! string match) receives it, in tag order and then registration order.
//!
//! Two sink kinds exist:
//!
//! - **Callbacks** run synchronously on the posting thread. They must be fast.
//!   Errors and panics are logged and isolated per subscriber.
//! - **Channels** are bounded queues. Delivery never blocks: a full queue
//!   drops the entry for that subscriber, a closed queue is pruned.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::entry::Entry;

/// Synchronous subscriber callback.
pub type Callback = Arc<dyn Fn(&Entry) -> anyhow::Result<()> + Send + Sync>;

/// Where notifications for a subscription go.
#[derive(Clone)]
pub enum Sink {
    Callback(Callback),
    Channel(mpsc::Sender<Entry>),
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => write!(f, "Sink::Callback"),
            Self::Channel(tx) => write!(f, "Sink::Channel(capacity={})", tx.max_capacity()),
        }
    }
}

/// One `(agent, sink)` registration under a topic.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    pub agent: String,
    pub sink: Sink,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A subscription selected for one notification.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub topic: String,
    pub subscription: Subscription,
}

/// Outcome of delivering one entry to its recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    /// Channel deliveries dropped because the queue was full.
    pub dropped: usize,
    /// Ids of channel subscriptions whose receiver has gone away.
    pub closed: Vec<u64>,
}

/// Topic → ordered registrations.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: HashMap<String, Vec<Subscription>>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for `agent` under every topic in `topics`.
    ///
    /// Repeated registrations for the same agent and topic are kept and all fire.
    pub fn subscribe<I, S>(&mut self, agent: impl Into<String>, sink: Sink, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agent = agent.into();
        for topic in topics {
            self.next_id += 1;
            self.topics
                .entry(topic.into())
                .or_default()
                .push(Subscription {
                    id: self.next_id,
                    agent: agent.clone(),
                    sink: sink.clone(),
                });
        }
    }

    /// Remove `agent`'s registrations under `topics`, or under every topic when `None`.
    ///
    /// Returns the number of registrations removed.
    pub fn unsubscribe(&mut self, agent: &str, topics: Option<&[String]>) -> usize {
        let mut removed = 0;
        self.topics.retain(|topic, subs| {
            if topics.map_or(true, |wanted| wanted.iter().any(|t| t == topic)) {
                let before = subs.len();
                subs.retain(|s| s.agent != agent);
                removed += before - subs.len();
            }
            !subs.is_empty()
        });
        removed
    }

    /// Drop registrations by id (used for closed channels).
    pub fn remove_ids(&mut self, ids: &[u64]) {
        if ids.is_empty() {
            return;
        }
        self.topics.retain(|_, subs| {
            subs.retain(|s| !ids.contains(&s.id));
            !subs.is_empty()
        });
    }

    /// Registrations to notify for an entry with `tags`, in delivery order.
    pub fn recipients(&self, tags: &[String]) -> Vec<Recipient> {
        tags.iter()
            .filter_map(|tag| self.topics.get(tag).map(|subs| (tag, subs)))
            .flat_map(|(tag, subs)| {
                subs.iter().map(move |s| Recipient {
                    topic: tag.clone(),
                    subscription: s.clone(),
                })
            })
            .collect()
    }

    /// Total number of registrations across all topics.
    pub fn subscription_count(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.topics.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }
}

/// Deliver `entry` to every recipient, isolating failures.
pub fn deliver(recipients: &[Recipient], entry: &Entry) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for recipient in recipients {
        let sub = &recipient.subscription;
        match &sub.sink {
            Sink::Callback(callback) => {
                match catch_unwind(AssertUnwindSafe(|| callback(entry))) {
                    Ok(Ok(())) => report.delivered += 1,
                    Ok(Err(e)) => {
                        report.failed += 1;
                        log::warn!(
                            "[blackboard] subscriber '{}' failed on topic '{}': {:#}",
                            sub.agent,
                            recipient.topic,
                            e
                        );
                    }
                    Err(_) => {
                        report.failed += 1;
                        log::error!(
                            "[blackboard] subscriber '{}' panicked on topic '{}'",
                            sub.agent,
                            recipient.topic
                        );
                    }
                }
            }
            Sink::Channel(tx) => match tx.try_send(entry.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    log::warn!(
                        "[blackboard] queue full for subscriber '{}' on topic '{}', dropping entry",
                        sub.agent,
                        recipient.topic
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    log::debug!(
                        "[blackboard] subscriber '{}' closed its queue for topic '{}'",
                        sub.agent,
                        recipient.topic
                    );
                    report.closed.push(sub.id);
                }
            },
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
