//! Offline queue merge-on-read, queued writes, flush and snapshots.

mod common;

use common::{fast_config, fields, harness, queued_config};
use schooldb_store::{Database, DatabaseSnapshot, MutationKind, Record, StorageBackend, SyncItem};
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

#[tokio::test]
async fn test_create_then_update_resolves_latest() {
    let h = harness(fast_config());
    let queue = h.db.queue();

    queue
        .push(SyncItem::create(
            "q1",
            "finance",
            record(json!({"id": "tx9", "amount": 100})),
            10,
        ))
        .unwrap();
    queue
        .push(SyncItem::update(
            "q2",
            "finance",
            "tx9",
            fields(json!({"amount": 200})),
            20,
        ))
        .unwrap();

    let view = h.db.collection("finance").get().await.unwrap();
    let tx9 = view.iter().find(|r| r.id == "tx9").unwrap();
    assert_eq!(tx9.get("amount"), Some(json!(200)));
    assert_eq!(view.len(), 4);
}

#[tokio::test]
async fn test_delete_of_missing_doc_is_ignored() {
    let h = harness(fast_config());
    let finance = h.db.collection("finance");
    let base = finance.get().await.unwrap();

    h.db
        .queue()
        .push(SyncItem::delete("q1", "finance", "ghost", 5))
        .unwrap();

    assert_eq!(finance.get().await.unwrap(), base);
}

#[tokio::test]
async fn test_replay_follows_timestamps_not_storage_order() {
    let h = harness(fast_config());
    let queue = h.db.queue();

    queue
        .push(SyncItem::update("late", "students", "1", fields(json!({"stream": "B"})), 50))
        .unwrap();
    queue
        .push(SyncItem::update("early", "students", "1", fields(json!({"stream": "A"})), 40))
        .unwrap();

    let view = h.db.collection("students").get().await.unwrap();
    let amani = view.iter().find(|r| r.id == "1").unwrap();
    assert_eq!(amani.get("stream"), Some(json!("B")));
}

#[tokio::test]
async fn test_queue_items_only_affect_their_collection() {
    let h = harness(fast_config());
    h.db
        .queue()
        .push(SyncItem::delete("q1", "finance", "1", 5))
        .unwrap();

    assert_eq!(h.db.collection("students").get().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_read_leaves_base_and_queue_untouched() {
    let h = harness(fast_config());
    h.db
        .queue()
        .push(SyncItem::delete("q1", "students", "3", 5))
        .unwrap();

    let view = h.db.collection("students").get().await.unwrap();
    assert_eq!(view.len(), 3);
    assert_eq!(h.db.resolver().base("students").unwrap().len(), 4);
    assert_eq!(h.db.pending().unwrap().len(), 1);
}

#[tokio::test]
async fn test_loose_enqueue_requires_doc_id() {
    let h = harness(fast_config());
    let queue = h.db.queue();

    let err = queue
        .enqueue("students", MutationKind::Update, fields(json!({"a": 1})), None)
        .unwrap_err();
    assert!(matches!(err, schooldb_store::Error::MissingDocId(MutationKind::Update)));

    let created = queue
        .enqueue("students", MutationKind::Create, fields(json!({"name": "Njeri"})), None)
        .unwrap();
    assert_eq!(created.timestamp, 1_000);
    assert!(created.doc_id().is_none());
    assert_eq!(h.db.pending().unwrap().len(), 1);
}

#[tokio::test]
async fn test_queued_mode_defers_writes() {
    let h = harness(queued_config());
    let students = h.db.collection("students");

    let added = students.add(fields(json!({"name": "Njeri"}))).await.unwrap();
    h.clock.advance(10);
    students
        .update(&added.id, fields(json!({"grade": "Grade 2"})))
        .await
        .unwrap();
    h.clock.advance(10);
    students.delete("4").await.unwrap();

    let pending = h.db.pending().unwrap();
    let kinds: Vec<MutationKind> = pending.iter().map(SyncItem::kind).collect();
    assert_eq!(
        kinds,
        vec![MutationKind::Create, MutationKind::Update, MutationKind::Delete]
    );
    assert_eq!(h.db.resolver().base("students").unwrap().len(), 4);

    let view = students.get().await.unwrap();
    let njeri = view.iter().find(|r| r.id == added.id).unwrap();
    assert_eq!(njeri.get("grade"), Some(json!("Grade 2")));
    assert!(view.iter().all(|r| r.id != "4"));
}

#[tokio::test]
async fn test_queued_batch_shares_one_timestamp() {
    let h = harness(queued_config());
    let rows = vec![
        record(json!({"id": "p1", "studentId": "1", "points": 5})),
        record(json!({"id": "p2", "studentId": "2", "points": 3})),
    ];
    h.db.collection("points").batch_set(rows).await.unwrap();

    let pending = h.db.pending().unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|item| item.timestamp == 1_000));

    let view = h.db.collection("points").get().await.unwrap();
    let tail: Vec<&str> = view.iter().rev().take(2).map(|r| r.id.as_str()).collect();
    assert_eq!(tail, vec!["p2", "p1"]);
}

#[tokio::test]
async fn test_flush_keeps_view_and_drains_queue() {
    let h = harness(queued_config());
    let students = h.db.collection("students");

    students.add(fields(json!({"name": "Njeri"}))).await.unwrap();
    students.delete("2").await.unwrap();
    h.db
        .queue()
        .push(SyncItem::update("stale", "students", "ghost", fields(json!({"a": 1})), 1))
        .unwrap();

    let before = students.get().await.unwrap();
    let report = h.db.flush("students").await.unwrap();

    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].item_id, "stale");
    assert_eq!(report.record_count, before.len());

    assert!(h.db.pending().unwrap().is_empty());
    assert_eq!(h.db.resolver().base("students").unwrap(), before);
    assert_eq!(students.get().await.unwrap(), before);

    assert!(h.db.flush("students").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_flush_all_covers_every_pending_collection() {
    let h = harness(queued_config());
    h.db
        .collection("events")
        .add(fields(json!({"title": "Prize Giving"})))
        .await
        .unwrap();
    h.db.collection("finance").delete("tx3").await.unwrap();

    let reports = h.db.flush_all().await.unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.collection.as_str()).collect();
    assert_eq!(names, vec!["events", "finance"]);
    assert!(h.db.pending().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_queue_replays_over_direct_write() {
    let h = harness(fast_config());
    let students = h.db.collection("students");
    students.get().await.unwrap();

    h.db
        .queue()
        .push(SyncItem::update("q1", "students", "1", fields(json!({"grade": "Grade 7"})), 5))
        .unwrap();
    students
        .update("1", fields(json!({"grade": "Grade 6", "stream": "North"})))
        .await
        .unwrap();

    let view = students.get().await.unwrap();
    let amani = view.iter().find(|r| r.id == "1").unwrap();
    assert_eq!(amani.get("grade"), Some(json!("Grade 7")));
    assert_eq!(amani.get("stream"), Some(json!("North")));
}

#[tokio::test]
async fn test_remove_and_clear_pending() {
    let h = harness(queued_config());
    let students = h.db.collection("students");
    students.delete("1").await.unwrap();
    students.delete("2").await.unwrap();

    let first = h.db.pending().unwrap()[0].id.clone();
    assert!(h.db.remove_pending(&first).unwrap());
    assert!(!h.db.remove_pending(&first).unwrap());

    let view = students.get().await.unwrap();
    assert!(view.iter().any(|r| r.id == "1"));
    assert!(view.iter().all(|r| r.id != "2"));

    h.db.clear_pending().unwrap();
    assert_eq!(students.get().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_corrupt_queue_is_rejected() {
    let h = harness(fast_config());
    h.backend.set("schooldb_sync_queue", "[{\"oops\":").unwrap();

    let err = h.db.collection("students").get().await.unwrap_err();
    assert!(err.is_malformed());
}

#[tokio::test]
async fn test_snapshot_export_import() {
    let source = harness(queued_config());
    source.db.collection("students").get().await.unwrap();
    source
        .db
        .collection("finance")
        .add(fields(json!({"amount": 750, "type": "FEE_PAYMENT"})))
        .await
        .unwrap();

    let snapshot = source.db.export_snapshot().unwrap();
    assert_eq!(snapshot.collections.len(), 1);
    assert_eq!(snapshot.pending_count(), 1);

    let json = snapshot.to_json().unwrap();
    let restored = Database::in_memory(fast_config());
    restored
        .import_snapshot(DatabaseSnapshot::from_json(&json).unwrap())
        .unwrap();

    assert_eq!(
        restored.collection("students").get().await.unwrap(),
        source.db.collection("students").get().await.unwrap()
    );
    assert_eq!(
        restored.collection("finance").get().await.unwrap(),
        source.db.collection("finance").get().await.unwrap()
    );
    assert_eq!(restored.pending().unwrap(), source.db.pending().unwrap());
}

#[tokio::test]
async fn test_import_rejects_future_format() {
    let h = harness(fast_config());
    let mut snapshot = DatabaseSnapshot::new();
    snapshot.format_version = 99;
    assert!(h.db.import_snapshot(snapshot).is_err());
}

/// Memory storage that refuses writes to chosen keys.
#[derive(Debug, Default)]
struct RefusingWrites {
    inner: schooldb_store::MemoryBackend,
    refused: dashmap::DashSet<String>,
}

impl RefusingWrites {
    fn refuse(&self, key: &str) {
        self.refused.insert(key.to_string());
    }
}

impl StorageBackend for RefusingWrites {
    fn get(&self, key: &str) -> schooldb_store::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> schooldb_store::Result<()> {
        if self.refused.contains(key) {
            return Err(schooldb_store::Error::storage(key, "write refused"));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> schooldb_store::Result<()> {
        self.inner.remove(key)
    }

    fn keys(&self) -> schooldb_store::Result<Vec<String>> {
        self.inner.keys()
    }
}

#[tokio::test]
async fn test_failed_flush_does_not_duplicate_records() {
    for refused_key in ["schooldb_sync_queue", "schooldb_students"] {
        let backend = std::sync::Arc::new(RefusingWrites::default());
        let db = Database::builder(backend.clone())
            .config(queued_config())
            .build();
        let students = db.collection("students");

        students.add(fields(json!({"name": "Njeri"}))).await.unwrap();
        let before = students.get().await.unwrap();
        assert_eq!(before.len(), 5);

        backend.refuse(refused_key);
        let err = db.flush("students").await.unwrap_err();
        assert!(err.is_storage_unavailable(), "{refused_key}");

        assert_eq!(students.get().await.unwrap(), before, "{refused_key}");
        assert_eq!(db.pending().unwrap().len(), 1, "{refused_key}");
    }
}
