//! FileWatcher against a real temp directory.

use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use issue_preview_core::Fingerprint;
use issue_preview_server::watcher::observe;
use issue_preview_server::{FileWatcher, Observation, ReadPolicy, WatchConfig};

fn config() -> WatchConfig {
    WatchConfig {
        poll_interval: Duration::from_millis(20),
        debounce: Duration::from_millis(120),
        read_policy: ReadPolicy {
            attempts: 2,
            retry_delay: Duration::from_millis(5),
        },
    }
}

#[tokio::test]
async fn burst_of_writes_yields_one_event_with_final_content() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("form.yml");
    std::fs::write(&path, "name: v0\n").expect("write");

    let baseline = observe(&path, &config().read_policy).await;
    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, _) = broadcast::channel(1);
    let handle = tokio::spawn(
        FileWatcher::new(&path, config())
            .with_baseline(baseline)
            .run(tx, shutdown_tx.subscribe()),
    );

    let quiet = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(quiet.is_err(), "baseline must not be re-emitted");

    for body in ["name: v1\n", "name: v2\n", "name: v3\n"] {
        std::fs::write(&path, body).expect("write");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open");
    assert_eq!(
        event.observation,
        Observation::Content(Fingerprint::of(b"name: v3\n"))
    );
    assert_eq!(event.path, path);

    let extra = timeout(Duration::from_millis(400), rx.recv()).await;
    assert!(extra.is_err(), "burst must collapse into a single event");

    shutdown_tx.send(()).expect("shutdown");
    handle.await.expect("join").expect("watcher result");
}

#[tokio::test]
async fn deletion_is_reported_once_and_recovery_emits_again() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("form.yml");
    std::fs::write(&path, "name: v0\n").expect("write");

    let baseline = observe(&path, &config().read_policy).await;
    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, _) = broadcast::channel(1);
    let handle = tokio::spawn(
        FileWatcher::new(&path, config())
            .with_baseline(baseline)
            .run(tx, shutdown_tx.subscribe()),
    );

    std::fs::remove_file(&path).expect("remove");
    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open");
    assert!(matches!(event.observation, Observation::Unreadable { .. }));

    let repeat = timeout(Duration::from_millis(400), rx.recv()).await;
    assert!(repeat.is_err(), "absence is reported once");

    std::fs::write(&path, "name: back\n").expect("restore");
    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open");
    assert_eq!(
        event.observation,
        Observation::Content(Fingerprint::of(b"name: back\n"))
    );

    shutdown_tx.send(()).expect("shutdown");
    handle.await.expect("join").expect("watcher result");
}
