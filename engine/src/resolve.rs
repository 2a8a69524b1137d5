//! Merge-on-read: projecting queued mutations onto a base snapshot.
//!
//! This is the only place a [`SyncItem`] is interpreted. Given the persisted
//! records of a collection and the full offline queue, the resolver produces
//! the view a reader should see, without touching the base snapshot.
//!
//! # Algorithm
//!
//! 1. Keep only queue items for the target collection
//! 2. Stable-sort them by timestamp (equal timestamps keep queue order)
//! 3. Fold them over a copy of the base:
//!    - `CREATE` appends its payload
//!    - `UPDATE` shallow-merges its payload onto every record with that id
//!    - `DELETE` removes every record with that id
//! 4. Report which items changed something and which found no target

use crate::{CollectionName, Mutation, MutationKind, Record, RecordId, SyncItem, SyncItemId};
use serde::{Deserialize, Serialize};

/// Why a queued item had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// No record with the item's `docId` exists at replay time
    TargetMissing,
}

/// A queued item that was replayed as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skipped {
    pub item_id: SyncItemId,
    pub kind: MutationKind,
    pub doc_id: RecordId,
    pub reason: SkipReason,
}

/// Outcome of replaying a queue onto a base snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// The merged view, in base order with creates appended
    pub records: Vec<Record>,
    /// Items that changed the view, in replay order
    pub applied: Vec<SyncItemId>,
    /// Items that targeted a missing record
    pub skipped: Vec<Skipped>,
}

impl Resolution {
    /// IDs of every item the replay consumed, applied or skipped.
    pub fn consumed(&self) -> impl Iterator<Item = &SyncItemId> {
        self.applied
            .iter()
            .chain(self.skipped.iter().map(|s| &s.item_id))
    }
}

/// Replays the offline queue for one collection.
#[derive(Debug, Clone)]
pub struct Resolver {
    collection: CollectionName,
}

impl Resolver {
    /// Create a resolver for `collection`.
    pub fn new(collection: impl Into<CollectionName>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    /// The collection this resolver filters on.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Queue items for this collection in replay order.
    pub fn replay_order<'q>(&self, queue: &'q [SyncItem]) -> Vec<&'q SyncItem> {
        let mut items: Vec<&SyncItem> = queue
            .iter()
            .filter(|item| item.collection == self.collection)
            .collect();
        items.sort_by_key(|item| item.timestamp);
        items
    }

    /// Fold the queue over a copy of `base`.
    pub fn resolve(&self, base: &[Record], queue: &[SyncItem]) -> Resolution {
        let mut resolution = Resolution {
            records: base.to_vec(),
            ..Default::default()
        };

        for item in self.replay_order(queue) {
            let hit = apply(&mut resolution.records, &item.mutation);
            if hit {
                resolution.applied.push(item.id.clone());
            } else {
                resolution.skipped.push(Skipped {
                    item_id: item.id.clone(),
                    kind: item.kind(),
                    doc_id: item.mutation.target_id().clone(),
                    reason: SkipReason::TargetMissing,
                });
            }
        }

        resolution
    }

    /// Just the merged view.
    pub fn view(&self, base: &[Record], queue: &[SyncItem]) -> Vec<Record> {
        self.resolve(base, queue).records
    }
}

/// Apply one mutation in place. Returns whether any record was affected.
fn apply(records: &mut Vec<Record>, mutation: &Mutation) -> bool {
    match mutation {
        Mutation::Create { payload } => {
            records.push(payload.clone());
            true
        }
        Mutation::Update { doc_id, payload } => {
            let mut hit = false;
            for record in records.iter_mut().filter(|r| &r.id == doc_id) {
                record.merge(payload);
                hit = true;
            }
            hit
        }
        Mutation::Delete { doc_id } => {
            let before = records.len();
            records.retain(|r| &r.id != doc_id);
            records.len() != before
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fields_of;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn base() -> Vec<Record> {
        vec![
            record(json!({"id": "tx1", "amount": 5000, "type": "fee"})),
            record(json!({"id": "tx2", "amount": 1200, "type": "expense"})),
        ]
    }

    #[test]
    fn empty_queue_is_identity() {
        let resolver = Resolver::new("finance");
        let resolution = resolver.resolve(&base(), &[]);
        assert_eq!(resolution.records, base());
        assert!(resolution.applied.is_empty());
        assert!(resolution.skipped.is_empty());
    }

    #[test]
    fn create_then_update_by_timestamp() {
        let queue = vec![
            SyncItem::update(
                "q-2",
                "finance",
                "tx9",
                fields_of(json!({"amount": 200})).unwrap(),
                20,
            ),
            SyncItem::create("q-1", "finance", record(json!({"id": "tx9", "amount": 100})), 10),
        ];

        let resolution = Resolver::new("finance").resolve(&base(), &queue);

        assert_eq!(resolution.records.len(), 3);
        assert_eq!(
            resolution.records[2],
            record(json!({"id": "tx9", "amount": 200}))
        );
        assert_eq!(resolution.applied, vec!["q-1", "q-2"]);
    }

    #[test]
    fn later_update_wins() {
        let queue = vec![
            SyncItem::update(
                "late",
                "finance",
                "tx1",
                fields_of(json!({"status": "paid"})).unwrap(),
                50,
            ),
            SyncItem::update(
                "early",
                "finance",
                "tx1",
                fields_of(json!({"status": "pending", "note": "M-Pesa"})).unwrap(),
                40,
            ),
        ];

        let view = Resolver::new("finance").view(&base(), &queue);
        assert_eq!(view[0].get("status"), Some(json!("paid")));
        assert_eq!(view[0].get("note"), Some(json!("M-Pesa")));
        assert_eq!(view[0].get("amount"), Some(json!(5000)));
    }

    #[test]
    fn equal_timestamps_keep_queue_order() {
        let queue = vec![
            SyncItem::update("a", "finance", "tx1", fields_of(json!({"n": 1})).unwrap(), 7),
            SyncItem::update("b", "finance", "tx1", fields_of(json!({"n": 2})).unwrap(), 7),
        ];
        let view = Resolver::new("finance").view(&base(), &queue);
        assert_eq!(view[0].get("n"), Some(json!(2)));
    }

    #[test]
    fn delete_of_missing_record_changes_nothing() {
        let queue = vec![SyncItem::delete("q-1", "finance", "nope", 1)];
        let resolution = Resolver::new("finance").resolve(&base(), &queue);

        assert_eq!(resolution.records, base());
        assert!(resolution.applied.is_empty());
        assert_eq!(
            resolution.skipped,
            vec![Skipped {
                item_id: "q-1".into(),
                kind: MutationKind::Delete,
                doc_id: "nope".into(),
                reason: SkipReason::TargetMissing,
            }]
        );
    }

    #[test]
    fn update_of_missing_record_is_skipped() {
        let queue = vec![SyncItem::update(
            "q-1",
            "finance",
            "ghost",
            fields_of(json!({"amount": 1})).unwrap(),
            1,
        )];
        let resolution = Resolver::new("finance").resolve(&base(), &queue);
        assert_eq!(resolution.records, base());
        assert_eq!(resolution.skipped.len(), 1);
    }

    #[test]
    fn delete_preserves_order_of_the_rest() {
        let mut records = base();
        records.push(record(json!({"id": "tx3"})));
        let queue = vec![SyncItem::delete("q-1", "finance", "tx2", 1)];

        let view = Resolver::new("finance").view(&records, &queue);
        let ids: Vec<_> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tx1", "tx3"]);
    }

    #[test]
    fn other_collections_are_ignored() {
        let queue = vec![
            SyncItem::delete("q-1", "students", "tx1", 1),
            SyncItem::create("q-2", "staff", record(json!({"id": "s1"})), 2),
        ];
        let resolution = Resolver::new("finance").resolve(&base(), &queue);
        assert_eq!(resolution.records, base());
        assert_eq!(resolution.consumed().count(), 0);
    }

    #[test]
    fn base_is_not_modified() {
        let original = base();
        let queue = vec![SyncItem::delete("q-1", "finance", "tx1", 1)];
        let _ = Resolver::new("finance").resolve(&original, &queue);
        assert_eq!(original, base());
    }
}
