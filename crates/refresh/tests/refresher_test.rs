use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corelib::{DeviceId, SnapshotStore};
use parking_lot::Mutex;
use refresh::{
    CommandSource, PublishMode, RefreshConfig, RefreshError, TopologyRefresher, TopologySource,
};

/// Replays a fixed sequence of dump results, then fails every call.
struct ScriptedSource {
    script: Mutex<VecDeque<refresh::Result<String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(script: Vec<refresh::Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopologySource for ScriptedSource {
    async fn dump(&self) -> refresh::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Err(RefreshError::EmptyDump))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn failed() -> refresh::Result<String> {
    Err(RefreshError::CommandFailed {
        command: "ceph --id admin osd dump".into(),
        status: Some(1),
        stderr: "monclient: authenticate timed out".into(),
    })
}

fn dump(devices: &[(u64, &str)]) -> refresh::Result<String> {
    let mut text = String::from("epoch 1\nfsid 00000000-0000-0000-0000-000000000000\n");
    for (id, ip) in devices {
        text.push_str(&format!("osd.{id} up in weight 1 {ip}:6800/100 {ip}:6801/100\n"));
    }
    Ok(text)
}

fn every_ten_seconds(publish: PublishMode) -> RefreshConfig {
    RefreshConfig {
        interval: Duration::from_secs(10),
        publish,
    }
}

// ============================================================================
// Loop behaviour
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_cycles_keep_last_snapshot() {
    let source = ScriptedSource::new(vec![
        dump(&[(0, "10.0.0.1"), (1, "10.0.0.2")]),
        failed(),
        dump(&[(2, "10.0.0.3")]),
        failed(),
    ]);
    let store = Arc::new(SnapshotStore::new());
    let handle = TopologyRefresher::new(source.clone(), store.clone())
        .with_config(every_ten_seconds(PublishMode::EndOfCycle))
        .spawn();

    // Cycles at t=0 and t=10.
    tokio::time::sleep(Duration::from_secs(15)).await;
    let snapshot = store.get();
    assert_eq!(snapshot.generation(), 1);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(
        snapshot.get(DeviceId(1)).map(|r| r.address.as_str()),
        Some("10.0.0.2")
    );

    // Cycles at t=20 and t=30.
    tokio::time::sleep(Duration::from_secs(20)).await;
    let snapshot = store.get();
    assert_eq!(snapshot.generation(), 2);
    assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec![DeviceId(2)]);

    handle.shutdown().await;
    assert_eq!(source.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_before_next_dump() {
    let source = ScriptedSource::new(vec![dump(&[(0, "10.0.0.1")])]);
    let store = Arc::new(SnapshotStore::new());
    let handle = TopologyRefresher::new(source.clone(), store.clone())
        .with_config(every_ten_seconds(PublishMode::EndOfCycle))
        .spawn();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);

    handle.cancel();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(handle.is_finished());
    assert_eq!(source.calls(), 1);
    assert_eq!(store.get().generation(), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_the_loop() {
    let source = ScriptedSource::new(vec![
        dump(&[(0, "10.0.0.1")]),
        dump(&[(0, "10.0.0.1")]),
    ]);
    let store = Arc::new(SnapshotStore::new());
    let handle = TopologyRefresher::new(source.clone(), store.clone())
        .with_config(every_ten_seconds(PublishMode::EndOfCycle))
        .spawn();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);

    drop(handle);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(store.get().generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_per_line_mode_publishes_every_device() {
    let source = ScriptedSource::new(vec![dump(&[
        (0, "10.0.0.1"),
        (1, "10.0.0.2"),
        (2, "10.0.0.3"),
    ])]);
    let store = Arc::new(SnapshotStore::new());
    let refresher = TopologyRefresher::new(source, store.clone())
        .with_config(every_ten_seconds(PublishMode::PerLine));

    let report = refresher.refresh_once().await.unwrap();
    assert_eq!(report.parsed, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.published, 3);
    assert_eq!(store.get().generation(), 3);
    assert_eq!(store.get().len(), 3);
}

// ============================================================================
// Command source
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_command_source_feeds_store() {
    let dir = tempfile::tempdir().unwrap();
    let script = "printf 'epoch 9\\nosd.3 up in weight 0.75 10.0.0.5:6800/123\\n'";
    let source = CommandSource::new(
        "sh",
        vec!["-c".into(), script.into()],
        dir.path().join("osd.dump"),
    );
    let store = Arc::new(SnapshotStore::new());
    let refresher = TopologyRefresher::new(Arc::new(source), store.clone());

    let report = refresher.refresh_once().await.unwrap();
    assert_eq!(report.parsed, 1);

    let record = store.record(DeviceId(3)).unwrap();
    assert_eq!(record.active, "up");
    assert_eq!(record.state, "in");
    assert_eq!(record.weight, 0.75);
    assert_eq!(record.address, "10.0.0.5");
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_failure_is_a_cycle_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = CommandSource::new(
        "sh",
        vec!["-c".into(), "exit 1".into()],
        dir.path().join("osd.dump"),
    );
    let store = Arc::new(SnapshotStore::new());
    let refresher = TopologyRefresher::new(Arc::new(source), store.clone());

    let err = refresher.refresh_once().await.unwrap_err();
    assert!(err.to_string().contains("retc=1"));
    let err: corelib::Error = err.into();
    assert!(matches!(err, corelib::Error::RefreshCycle(_)));
    assert!(store.get().is_empty());
}
