use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tempfile::TempDir;
use tokio::sync::broadcast;

use tagmarks::{
    core::store::{EntryStore, StoreError},
    entry::{Entry, EntryDraft},
    persist::{
        PersistError, PersistResult, SaveReport, SnapshotGate, SnapshotSink, json::JsonFileSink,
        load_or_empty,
    },
    runtime::{
        events::{SaveTrigger, StoreEvent},
        handle::{RuntimeConfig, RuntimeError, spawn_store},
    },
};

fn draft(name: &str, url: &str, tags: &str) -> EntryDraft {
    EntryDraft::from_parts(name, url, tags).expect("draft")
}

fn quiet_config() -> RuntimeConfig {
    RuntimeConfig {
        snapshot_interval_ms: 0,
        save_on_mutation: false,
        save_on_shutdown: false,
        ..RuntimeConfig::default()
    }
}

/// Records the size of every snapshot it is handed.
struct RecordingSink {
    sizes: Arc<Mutex<Vec<usize>>>,
    count: u64,
}

impl SnapshotSink for RecordingSink {
    fn write_snapshot(&mut self, entries: &[Entry]) -> PersistResult<SaveReport> {
        self.count += 1;
        self.sizes.lock().expect("lock").push(entries.len());
        Ok(SaveReport {
            last_saved: 1,
            save_count: self.count,
            size: entries.len(),
        })
    }

    fn load_snapshot(&self) -> PersistResult<Option<Vec<Entry>>> {
        Ok(None)
    }
}

/// Fails the first `failures` writes.
struct FlakySink {
    failures: usize,
    calls: usize,
}

impl SnapshotSink for FlakySink {
    fn write_snapshot(&mut self, entries: &[Entry]) -> PersistResult<SaveReport> {
        self.calls += 1;
        if self.calls <= self.failures {
            return Err(PersistError::Io(std::io::Error::other("disk full")));
        }
        Ok(SaveReport {
            last_saved: 1,
            save_count: self.calls as u64,
            size: entries.len(),
        })
    }

    fn load_snapshot(&self) -> PersistResult<Option<Vec<Entry>>> {
        Ok(None)
    }
}

/// Sleeps inside every write and tracks how many writes overlap.
struct SlowSink {
    in_flight: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
    delay: Duration,
}

impl SnapshotSink for SlowSink {
    fn write_snapshot(&mut self, entries: &[Entry]) -> PersistResult<SaveReport> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(SaveReport {
            last_saved: 1,
            save_count: 0,
            size: entries.len(),
        })
    }

    fn load_snapshot(&self) -> PersistResult<Option<Vec<Entry>>> {
        Ok(None)
    }
}

async fn next_save_event(sub: &mut broadcast::Receiver<StoreEvent>) -> StoreEvent {
    loop {
        let evt = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("event timeout")
            .expect("recv");
        if matches!(evt, StoreEvent::Saved { .. } | StoreEvent::SaveFailed { .. }) {
            return evt;
        }
    }
}

#[tokio::test]
async fn lookups_follow_view_counting_rules() {
    let handle = spawn_store(EntryStore::new(), None, quiet_config());
    handle.add(draft("blog", "https://x.io", "tech,personal")).await.expect("add");

    let by_url = handle.find_by_url("https://x.io").await.expect("url");
    assert_eq!(by_url.views, 0);

    let by_name = handle.find_by_name("blog").await.expect("name");
    assert_eq!(by_name.views, 1);

    let by_tags = handle
        .find_by_tags(vec!["tech".into(), "personal".into()])
        .await
        .expect("tags");
    assert_eq!(by_tags.len(), 2);
    assert_eq!(by_tags[1].views, 3);

    let peek = handle.get("blog").await.expect("get").expect("present");
    assert_eq!(peek.views, 3);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn errors_come_back_as_values() {
    let handle = spawn_store(EntryStore::new(), None, quiet_config());
    handle.add(draft("blog", "https://x.io", "tech")).await.expect("add");

    let dup = handle.add(draft("blog", "https://y.io", "other")).await;
    assert!(matches!(
        dup,
        Err(RuntimeError::Store(StoreError::DuplicateName(ref n))) if n == "blog"
    ));

    let missing = handle.delete("ghost").await;
    assert!(matches!(missing, Err(RuntimeError::Store(StoreError::NotFound(_)))));

    let invalid = handle
        .add(EntryDraft {
            name: "x".into(),
            url: "u".into(),
            tags: vec![],
        })
        .await;
    assert!(matches!(invalid, Err(RuntimeError::Invalid(_))));

    assert!(matches!(handle.save().await, Err(RuntimeError::NoSink)));
    assert_eq!(handle.size().await.expect("size"), 1);

    handle.shutdown().await.expect("shutdown");
    assert!(matches!(handle.size().await, Err(RuntimeError::ChannelClosed)));
}

#[tokio::test]
async fn create_and_delete_trigger_snapshots() {
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        sizes: Arc::clone(&sizes),
        count: 0,
    };
    let cfg = RuntimeConfig {
        save_on_mutation: true,
        ..quiet_config()
    };
    let handle = spawn_store(EntryStore::new(), Some(Box::new(sink)), cfg);
    let mut sub = handle.subscribe();

    handle.add(draft("a", "u1", "x")).await.expect("add a");
    assert_eq!(
        next_save_event(&mut sub).await,
        StoreEvent::Saved {
            trigger: SaveTrigger::Mutation,
            report: SaveReport {
                last_saved: 1,
                save_count: 1,
                size: 1
            },
        }
    );

    handle.add(draft("b", "u2", "x")).await.expect("add b");
    next_save_event(&mut sub).await;
    handle.delete("a").await.expect("delete");
    next_save_event(&mut sub).await;

    assert_eq!(*sizes.lock().expect("lock"), vec![1, 2, 1]);
    assert_eq!(handle.last_save().map(|r| r.size), Some(1));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_duplicate_does_not_trigger_snapshot() {
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        sizes: Arc::clone(&sizes),
        count: 0,
    };
    let cfg = RuntimeConfig {
        save_on_mutation: true,
        ..quiet_config()
    };
    let handle = spawn_store(EntryStore::new(), Some(Box::new(sink)), cfg);

    handle.add(draft("a", "u1", "x")).await.expect("add");
    let _ = handle.add(draft("a", "u2", "y")).await;
    let _ = handle.delete("ghost").await;
    handle.save().await.expect("manual save");

    assert_eq!(*sizes.lock().expect("lock"), vec![1, 1]);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn scheduler_survives_failed_saves() {
    let sink = FlakySink {
        failures: 2,
        calls: 0,
    };
    let cfg = RuntimeConfig {
        snapshot_interval_ms: 30,
        ..quiet_config()
    };
    let handle = spawn_store(EntryStore::new(), Some(Box::new(sink)), cfg);
    let mut sub = handle.subscribe();

    for _ in 0..2 {
        match next_save_event(&mut sub).await {
            StoreEvent::SaveFailed { trigger, reason } => {
                assert_eq!(trigger, SaveTrigger::Interval);
                assert!(reason.contains("disk full"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
    assert!(handle.last_save().is_none());

    match next_save_event(&mut sub).await {
        StoreEvent::Saved { trigger, .. } => assert_eq!(trigger, SaveTrigger::Interval),
        other => panic!("expected save, got {other:?}"),
    }
    assert!(handle.last_save().is_some());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn gate_admits_one_save_at_a_time() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let gate = SnapshotGate::new(Box::new(SlowSink {
        in_flight: Arc::clone(&in_flight),
        max_seen: Arc::clone(&max_seen),
        delay: Duration::from_millis(40),
    }));

    let mut tasks = Vec::new();
    for i in 0..4 {
        let gate = gate.clone();
        let entries = vec![Entry::new(format!("e{i}"), "u", vec!["t".into()])];
        tasks.push(tokio::spawn(async move { gate.save(entries).await }));
    }
    for task in tasks {
        task.await.expect("join").expect("save");
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn queued_manual_save_does_not_stall_lookups() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let sink = SlowSink {
        in_flight: Arc::clone(&in_flight),
        max_seen: Arc::clone(&max_seen),
        delay: Duration::from_millis(400),
    };
    let cfg = RuntimeConfig {
        save_on_mutation: true,
        persist_queue_bound: 1,
        ..quiet_config()
    };
    let handle = spawn_store(EntryStore::new(), Some(Box::new(sink)), cfg);

    // First write occupies the worker, second fills the queue.
    handle.add(draft("a", "u1", "x")).await.expect("add a");
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.add(draft("b", "u2", "x")).await.expect("add b");

    let saver = {
        let h = handle.clone();
        tokio::spawn(async move { h.save().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    let size = tokio::time::timeout(Duration::from_millis(200), handle.size())
        .await
        .expect("size stalled behind a queued save")
        .expect("size");
    assert_eq!(size, 2);
    assert!(started.elapsed() < Duration::from_millis(200));

    let report = tokio::time::timeout(Duration::from_secs(3), saver)
        .await
        .expect("save timeout")
        .expect("join")
        .expect("save");
    assert_eq!(report.size, 2);
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn gate_is_released_after_failure() {
    let gate = SnapshotGate::new(Box::new(FlakySink {
        failures: 1,
        calls: 0,
    }));
    assert!(gate.save(vec![]).await.is_err());
    let report = tokio::time::timeout(Duration::from_secs(1), gate.save(vec![]))
        .await
        .expect("gate stuck")
        .expect("second save");
    assert_eq!(report.save_count, 2);
}

#[tokio::test]
async fn concurrent_callers_see_a_consistent_store() {
    let handle = spawn_store(EntryStore::new(), None, quiet_config());

    let mut tasks = Vec::new();
    for i in 0..32 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.add(draft(&format!("n{i}"), "shared-url", "common")).await
        }));
    }
    for i in 0..8 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.add(draft("contested", &format!("u{i}"), "common")).await
        }));
    }

    let mut ok = 0;
    for task in tasks {
        if task.await.expect("join").is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 33);
    assert_eq!(handle.size().await.expect("size"), 33);
    assert_eq!(
        handle.find_by_tags(vec!["common".into()]).await.expect("tags").len(),
        33
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_flushes_to_disk_and_reload_restores() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("db.dump");

    let cfg = RuntimeConfig {
        save_on_shutdown: true,
        ..quiet_config()
    };
    let handle = spawn_store(
        EntryStore::new(),
        Some(Box::new(JsonFileSink::new(&path))),
        cfg,
    );
    handle.add(draft("blog", "https://x.io", "tech")).await.expect("add");
    handle.add(draft("docs", "https://docs.rs", "tech,ref")).await.expect("add");
    handle.delete("blog").await.expect("delete");
    handle.shutdown().await.expect("shutdown");

    let sink = JsonFileSink::new(&path);
    let restored = load_or_empty(&sink);
    assert_eq!(restored.len(), 1);
    assert!(restored.get("docs").is_some());
    assert_eq!(restored.tag_members("tech").len(), 1);
    let stats = sink.read_stats().expect("stats").expect("present");
    assert_eq!(stats.size, 1);
    assert_eq!(stats.save_count, 1);
}
