//! Several agents sharing one blackboard from different threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use agent_blackboard::{Blackboard, BlackboardConfig, Entry, EntryDraft, Query};
use serde_json::json;

const AGENTS: usize = 8;
const POSTS_PER_AGENT: usize = 50;

#[test]
fn concurrent_posts_stay_sorted_and_complete() {
    let bb = Arc::new(Blackboard::open(BlackboardConfig::in_memory()));
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    bb.subscribe(
        "observer",
        move |_: &Entry| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        ["work"],
    );

    let handles: Vec<_> = (0..AGENTS)
        .map(|n| {
            let bb = Arc::clone(&bb);
            thread::spawn(move || {
                let agent = format!("worker-{n}");
                for i in 0..POSTS_PER_AGENT {
                    bb.post(
                        EntryDraft::new(agent.clone(), json!({"seq": i}))
                            .tags(["work", "progress"])
                            .confidence((i % 10) as f64 / 10.0),
                    )
                    .unwrap();
                    if i % 10 == 0 {
                        let _ = bb.query(&agent, &Query::tags(["work"]).max_results(5));
                        bb.store_knowledge(format!("last.{agent}"), json!(i), agent.clone());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = bb.entries();
    assert_eq!(entries.len(), AGENTS * POSTS_PER_AGENT);
    assert!(entries
        .windows(2)
        .all(|pair| pair[0].timestamp() <= pair[1].timestamp()));
    assert_eq!(notified.load(Ordering::SeqCst), AGENTS * POSTS_PER_AGENT);

    // Per-agent post order survives interleaving.
    for n in 0..AGENTS {
        let mine = bb.get_latest_by_agent(&format!("worker-{n}"), POSTS_PER_AGENT);
        let seqs: Vec<u64> = mine.iter().map(|e| e.content()["seq"].as_u64().unwrap()).collect();
        assert_eq!(seqs, (0..POSTS_PER_AGENT as u64).collect::<Vec<_>>());
    }

    assert_eq!(bb.get_all_knowledge(Some("last.")).len(), AGENTS);
}

#[test]
fn notifications_arrive_in_post_order() {
    let bb = Arc::new(Blackboard::open(BlackboardConfig::in_memory()));
    let mut rx = bb.subscribe_channel("auditor", ["audit"]);

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let bb = Arc::clone(&bb);
            thread::spawn(move || {
                for i in 0..10 {
                    bb.post(EntryDraft::new(format!("a{n}"), json!(i)).tags(["audit"]))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut received = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        received.push(entry);
    }
    assert_eq!(received.len(), 40);
    assert_eq!(received, bb.entries());
}

#[test]
fn concurrent_saves_persist_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared").join("bb.json");
    let config = BlackboardConfig::default()
        .with_storage_path(&path)
        .with_save_on_drop(false);
    let bb = Arc::new(Blackboard::open(config.clone()));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let bb = Arc::clone(&bb);
            thread::spawn(move || {
                for i in 0..20 {
                    bb.post(EntryDraft::new(format!("w{n}"), json!(i))).unwrap();
                    bb.save_now().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    bb.save_now().unwrap();
    assert!(!bb.is_dirty());

    let reloaded = Blackboard::open(config);
    assert_eq!(reloaded.entries(), bb.entries());
}
