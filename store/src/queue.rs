//! The offline mutation queue.
//!
//! Every pending create, update and delete across all collections lives in
//! one persisted array under `"<prefix>_sync_queue"`. The queue does not
//! interpret items; filtering and replay belong to the resolver.

use std::sync::Arc;

use schooldb_engine::{
    decode_queue, encode_queue, Fields, Mutation, MutationKind, Record, RecordId, SyncItem,
    SyncItemId, ID_FIELD,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MalformedPolicy;
use crate::ids::IdGenerator;
use crate::keyed::{KeyedStore, WriteGuard, QUEUE_KEY};
use crate::{Error, Result};

/// Persisted log of pending mutations.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    store: KeyedStore,
    key: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    policy: MalformedPolicy,
}

impl SyncQueue {
    /// Create a queue stored through `store`.
    pub fn new(
        store: KeyedStore,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        policy: MalformedPolicy,
    ) -> Self {
        let key = store.key(QUEUE_KEY);
        Self {
            store,
            key,
            clock,
            ids,
            policy,
        }
    }

    /// Storage key of the queue.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Queue a mutation in the loose `(type, payload, docId)` form.
    ///
    /// `docId` is required for updates and deletes. A create payload without
    /// an `id` is given a fresh one.
    pub fn enqueue(
        &self,
        collection: &str,
        kind: MutationKind,
        payload: Fields,
        doc_id: Option<RecordId>,
    ) -> Result<SyncItem> {
        let mutation = match (kind, doc_id) {
            (MutationKind::Create, _) => Mutation::Create {
                payload: self.record_from(payload),
            },
            (MutationKind::Update, Some(doc_id)) => Mutation::Update { doc_id, payload },
            (MutationKind::Delete, Some(doc_id)) => Mutation::Delete { doc_id },
            (kind, None) => return Err(Error::MissingDocId(kind)),
        };
        self.enqueue_mutation(collection, mutation)
    }

    /// Hold the store's write lock.
    pub(crate) fn lock_writes(&self) -> WriteGuard<'_> {
        self.store.lock_writes()
    }

    /// Stamp `mutation` with a fresh id and the current time and append it.
    pub fn enqueue_mutation(&self, collection: &str, mutation: Mutation) -> Result<SyncItem> {
        let item = self.stamp(collection, mutation);
        self.push(item.clone())?;
        Ok(item)
    }

    /// Append several mutations with a single write. They share a timestamp
    /// and replay in the order given.
    pub fn enqueue_all(&self, collection: &str, mutations: Vec<Mutation>) -> Result<Vec<SyncItem>> {
        let items: Vec<SyncItem> = mutations
            .into_iter()
            .map(|mutation| self.stamp(collection, mutation))
            .collect();
        self.push_all(items.clone())?;
        Ok(items)
    }

    /// Append an already-built item.
    pub fn push(&self, item: SyncItem) -> Result<()> {
        self.push_all(vec![item])
    }

    /// Append already-built items with a single write.
    pub fn push_all(&self, items: Vec<SyncItem>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let _guard = self.store.lock_writes();
        let mut queue = self.list()?;
        for item in &items {
            debug!(
                item_id = %item.id,
                collection = %item.collection,
                kind = %item.kind(),
                timestamp = item.timestamp,
                "enqueued mutation"
            );
        }
        queue.extend(items);
        self.save(&queue)
    }

    /// Every pending item, in storage order.
    pub fn list(&self) -> Result<Vec<SyncItem>> {
        let Some(raw) = self.store.backend().get(&self.key)? else {
            return Ok(Vec::new());
        };
        match decode_queue(&self.key, &raw) {
            Ok(items) => Ok(items),
            Err(e) => match self.policy {
                MalformedPolicy::Reject => Err(e.into()),
                MalformedPolicy::Reseed => {
                    warn!(key = %self.key, error = %e, "discarding malformed offline queue");
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Number of pending items.
    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove one item by its own id. Returns whether it was present.
    pub fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.remove_many(&[id.to_string()])? > 0)
    }

    /// Remove every item whose id is listed. Returns how many were removed.
    pub fn remove_many(&self, ids: &[SyncItemId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.store.lock_writes();
        let mut queue = self.list()?;
        let before = queue.len();
        queue.retain(|item| !ids.contains(&item.id));
        let removed = before - queue.len();
        if removed > 0 {
            self.save(&queue)?;
        }
        Ok(removed)
    }

    /// Drop every pending item.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.store.lock_writes();
        self.save(&[])?;
        info!(key = %self.key, "cleared offline queue");
        Ok(())
    }

    /// Replace the whole queue.
    pub fn replace(&self, items: &[SyncItem]) -> Result<()> {
        let _guard = self.store.lock_writes();
        self.save(items)
    }

    fn save(&self, items: &[SyncItem]) -> Result<()> {
        let raw = encode_queue(items)?;
        self.store.backend().set(&self.key, &raw)
    }

    fn stamp(&self, collection: &str, mutation: Mutation) -> SyncItem {
        SyncItem::new(
            self.ids.next_id(),
            collection,
            mutation,
            self.clock.now_millis(),
        )
    }

    fn record_from(&self, mut payload: Fields) -> Record {
        match payload.remove(ID_FIELD) {
            Some(serde_json::Value::String(id)) => Record::new(id, payload),
            _ => Record::new(self.ids.next_id(), payload),
        }
    }
}
