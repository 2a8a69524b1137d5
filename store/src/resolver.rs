//! Collection resolution: seeding, merge-on-read, and queue flushing.

use std::sync::Arc;

use schooldb_engine::{Record, Resolution, Resolver, SeedCatalog, Skipped, SyncItemId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MalformedPolicy;
use crate::keyed::KeyedStore;
use crate::queue::SyncQueue;
use crate::Result;

/// What a flush folded into a collection's base snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub collection: String,
    /// Items that changed the base, in replay order
    pub applied: Vec<SyncItemId>,
    /// Items dropped because their target no longer exists
    pub skipped: Vec<Skipped>,
    /// Size of the base after the flush
    pub record_count: usize,
}

impl FlushReport {
    /// Whether the flush consumed any queue items.
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.skipped.is_empty()
    }
}

/// Produces the current view of a collection.
///
/// The base snapshot is seeded from the catalog the first time a collection
/// is read. Every read then replays the offline queue on top of it without
/// writing anything back.
#[derive(Debug, Clone)]
pub struct CollectionResolver {
    store: KeyedStore,
    queue: SyncQueue,
    seeds: Arc<SeedCatalog>,
    policy: MalformedPolicy,
}

impl CollectionResolver {
    pub fn new(
        store: KeyedStore,
        queue: SyncQueue,
        seeds: Arc<SeedCatalog>,
        policy: MalformedPolicy,
    ) -> Self {
        Self {
            store,
            queue,
            seeds,
            policy,
        }
    }

    /// The seed catalog.
    pub fn seeds(&self) -> &SeedCatalog {
        &self.seeds
    }

    /// The persisted base snapshot of `name`, seeding it on first access.
    ///
    /// Reserved names are refused.
    pub fn base(&self, name: &str) -> Result<Vec<Record>> {
        let key = self.store.collection_key(name)?;
        if let Some(records) = self.store.load_with(&key, self.policy)? {
            return Ok(records);
        }

        // another writer may have seeded or written in between
        let _guard = self.store.lock_writes();
        if let Some(records) = self.store.load_with(&key, self.policy)? {
            return Ok(records);
        }

        let defaults = self.seeds.defaults_for(name);
        self.store.save(&key, &defaults)?;
        info!(collection = %name, records = defaults.len(), "seeded collection");
        Ok(defaults)
    }

    /// Replace the base snapshot of `name`.
    pub fn save_base(&self, name: &str, records: &[Record]) -> Result<()> {
        self.store.save(&self.store.collection_key(name)?, records)
    }

    /// Whether `name` has ever been written.
    pub fn is_initialized(&self, name: &str) -> Result<bool> {
        self.store.exists(&self.store.collection_key(name)?)
    }

    /// The base snapshot with every pending mutation for `name` applied.
    pub fn resolve(&self, name: &str) -> Result<Vec<Record>> {
        Ok(self.resolution(name)?.records)
    }

    /// Like [`resolve`](Self::resolve), with the per-item outcome.
    pub fn resolution(&self, name: &str) -> Result<Resolution> {
        let base = self.base(name)?;
        let queue = self.queue.list()?;
        let resolution = Resolver::new(name).resolve(&base, &queue);
        debug!(
            collection = %name,
            base = base.len(),
            applied = resolution.applied.len(),
            skipped = resolution.skipped.len(),
            "resolved collection"
        );
        Ok(resolution)
    }

    /// Fold the pending mutations for `name` into its base snapshot.
    ///
    /// Items replay in timestamp order on top of the *current* base, so a
    /// direct write made after an item was queued is the starting point for
    /// that item. Items whose target is gone are dropped and reported. The
    /// resolved view is the same before and after.
    ///
    /// The items leave the queue before the new base is written. If that
    /// write fails the queue is put back, so a failed flush changes nothing.
    pub fn flush(&self, name: &str) -> Result<FlushReport> {
        let _guard = self.store.lock_writes();
        let resolution = self.resolution(name)?;
        let consumed: Vec<SyncItemId> = resolution.consumed().cloned().collect();

        if !consumed.is_empty() {
            let pending = self.queue.list()?;
            self.queue.remove_many(&consumed)?;
            if let Err(e) = self.save_base(name, &resolution.records) {
                warn!(collection = %name, error = %e, "flush failed, restoring offline queue");
                if let Err(restore) = self.queue.replace(&pending) {
                    warn!(collection = %name, error = %restore, "could not restore offline queue");
                }
                return Err(e);
            }
            info!(
                collection = %name,
                applied = resolution.applied.len(),
                skipped = resolution.skipped.len(),
                "flushed offline queue"
            );
        }

        Ok(FlushReport {
            collection: name.to_string(),
            applied: resolution.applied,
            skipped: resolution.skipped,
            record_count: resolution.records.len(),
        })
    }
}
