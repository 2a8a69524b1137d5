//! Change notification for collection subscribers.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{fast_config, fields, harness, queued_config};
use schooldb_store::{Database, Record};
use serde_json::json;

const POLL: Duration = Duration::from_millis(1000);

type Seen = Arc<Mutex<Vec<Vec<Record>>>>;

fn recorder() -> (Seen, impl Fn(Vec<Record>) + Send + Sync + 'static) {
    let seen: Seen = Arc::default();
    let sink = seen.clone();
    (seen, move |records: Vec<Record>| sink.lock().unwrap().push(records))
}

fn lengths(seen: &Seen) -> Vec<usize> {
    seen.lock().unwrap().iter().map(Vec::len).collect()
}

async fn settle() {
    tokio::time::sleep(POLL + Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_add_is_delivered_within_one_poll() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let students = h.db.collection("students");
    let (seen, callback) = recorder();

    let _sub = students.subscribe(callback).await.unwrap();
    assert_eq!(lengths(&seen), vec![4]);

    students.add(fields(json!({"name": "X"}))).await.unwrap();
    settle().await;

    assert_eq!(lengths(&seen), vec![4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_view_is_not_redelivered() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let (seen, callback) = recorder();
    let _sub = h.db.collection("events").subscribe(callback).await.unwrap();

    for _ in 0..3 {
        settle().await;
    }
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_external_writer_is_seen_by_polling() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let other = Database::builder(h.backend.clone())
        .config(fast_config())
        .build();

    let (seen, callback) = recorder();
    let _sub = h.db.collection("finance").subscribe(callback).await.unwrap();

    other.collection("finance").delete("tx1").await.unwrap();
    assert_eq!(lengths(&seen), vec![3]);

    settle().await;
    assert_eq!(lengths(&seen), vec![3, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_only_hear_their_collection() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let (seen, callback) = recorder();
    let _sub = h.db.collection("students").subscribe(callback).await.unwrap();

    h.db.collection("finance").delete("tx1").await.unwrap();
    settle().await;

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queued_writes_notify_and_flush_is_silent() {
    let h = harness(queued_config().with_poll_interval(POLL));
    let students = h.db.collection("students");
    let (seen, callback) = recorder();
    let _sub = students.subscribe(callback).await.unwrap();

    students.delete("4").await.unwrap();
    settle().await;
    assert_eq!(lengths(&seen), vec![4, 3]);

    h.db.flush("students").await.unwrap();
    settle().await;
    assert_eq!(lengths(&seen), vec![4, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_delivery() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let students = h.db.collection("students");
    let (seen, callback) = recorder();

    let sub = students.subscribe(callback).await.unwrap();
    assert_eq!(h.db.registry().count_for("students"), 1);
    sub.unsubscribe();
    assert_eq!(h.db.registry().count_for("students"), 0);

    students.add(fields(json!({"name": "Y"}))).await.unwrap();
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_unsubscribes() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let students = h.db.collection("students");
    let (seen, callback) = recorder();

    drop(students.subscribe(callback).await.unwrap());
    assert_eq!(h.db.registry().subscriber_count(), 0);

    students.add(fields(json!({"name": "Z"}))).await.unwrap();
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_watcher_survives_storage_outage() {
    let h = harness(fast_config().with_poll_interval(POLL));
    let (seen, callback) = recorder();
    let _sub = h.db.collection("students").subscribe(callback).await.unwrap();

    h.backend.set_unavailable(true);
    settle().await;
    h.backend.set_unavailable(false);

    let other = Database::builder(h.backend.clone())
        .config(fast_config())
        .build();
    other.collection("students").delete("3").await.unwrap();
    settle().await;

    assert_eq!(lengths(&seen), vec![4, 3]);
}

#[tokio::test]
async fn test_zero_poll_interval_is_refused() {
    let h = harness(fast_config().with_poll_interval(Duration::ZERO));
    let (seen, callback) = recorder();

    let err = h.db.collection("students").subscribe(callback).await.unwrap_err();
    assert!(matches!(
        err,
        schooldb_store::Error::Config(schooldb_store::ConfigError::ZeroPollInterval)
    ));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(h.db.registry().subscriber_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_backed_watcher_sees_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config()
        .with_poll_interval(Duration::from_millis(20))
        .with_data_dir(dir.path());
    let db = Database::open(config.clone());
    let writer = Database::open(config);

    let (seen, callback) = recorder();
    let sub = db.collection("timetable").subscribe(callback).await.unwrap();

    writer.collection("timetable").delete("tt1").await.unwrap();

    let mut delivered = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if lengths(&seen).last() == Some(&1) {
            delivered = true;
            break;
        }
    }
    assert!(delivered, "saw {:?}", lengths(&seen));
    assert!(sub.is_active());
}
