//! The Document API.
//!
//! [`Database`] is a cheap-to-clone handle over one storage backend. Every
//! screen-facing call goes through a [`CollectionRef`]: each one waits out
//! the configured latency, then reads or writes the collection and wakes
//! any subscribers.
//!
//! Reads always merge the offline queue into the base snapshot. Where writes
//! go depends on [`WriteMode`]: straight into the base snapshot, or into the
//! offline queue for a later [`Database::flush`].

use std::collections::BTreeSet;
use std::sync::Arc;

use schooldb_engine::{
    fields_of, DatabaseSnapshot, Error as EngineError, Fields, Mutation, Record, SeedCatalog,
    SyncItem,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::backend::{FileBackend, MemoryBackend, StorageBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::{StoreConfig, WriteMode};
use crate::ids::{IdGenerator, UuidGenerator};
use crate::keyed::{KeyedStore, CONFIG_KEY, HEALTH_KEY};
use crate::queue::SyncQueue;
use crate::resolver::{CollectionResolver, FlushReport};
use crate::session::SessionStore;
use crate::settings::{ConfigSnapshot, Health};
use crate::subscription::{spawn_watcher, Callback, Refresh, Subscription, SubscriptionRegistry};
use crate::{Error, Result};

#[derive(Debug)]
struct Inner {
    config: StoreConfig,
    store: KeyedStore,
    queue: SyncQueue,
    resolver: CollectionResolver,
    sessions: SessionStore,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    registry: Arc<SubscriptionRegistry>,
}

/// Handle to a document store. Clones share state.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

/// Builder for [`Database`] with injectable capabilities.
#[derive(Debug)]
pub struct DatabaseBuilder {
    backend: Arc<dyn StorageBackend>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    seeds: SeedCatalog,
}

impl DatabaseBuilder {
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn seeds(mut self, seeds: SeedCatalog) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn build(self) -> Database {
        let policy = self.config.on_malformed;
        let store = KeyedStore::new(self.backend, self.config.prefix.clone());
        let queue = SyncQueue::new(store.clone(), self.clock.clone(), self.ids.clone(), policy);
        let resolver =
            CollectionResolver::new(store.clone(), queue.clone(), Arc::new(self.seeds), policy);
        let sessions = SessionStore::new(store.clone());

        Database {
            inner: Arc::new(Inner {
                config: self.config,
                store,
                queue,
                resolver,
                sessions,
                clock: self.clock,
                ids: self.ids,
                registry: SubscriptionRegistry::new_shared(),
            }),
        }
    }
}

impl Database {
    /// Start building a database over `backend` with the school seed catalog.
    pub fn builder(backend: Arc<dyn StorageBackend>) -> DatabaseBuilder {
        DatabaseBuilder {
            backend,
            config: StoreConfig::default(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            seeds: SeedCatalog::school_defaults(),
        }
    }

    /// An in-memory database, honoring `config.quota_bytes`.
    pub fn in_memory(config: StoreConfig) -> Self {
        let backend = match config.quota_bytes {
            Some(bytes) => MemoryBackend::with_quota(bytes),
            None => MemoryBackend::new(),
        };
        Self::builder(Arc::new(backend)).config(config).build()
    }

    /// File-backed when `config.data_dir` is set, in-memory otherwise.
    pub fn open(config: StoreConfig) -> Self {
        match &config.data_dir {
            Some(dir) => {
                let backend = Arc::new(FileBackend::new(dir.clone()));
                Self::builder(backend).config(config).build()
            }
            None => Self::in_memory(config),
        }
    }

    /// Open using `.env` and `SCHOOLDB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = StoreConfig::from_env()?;
        info!(prefix = %config.prefix, mode = ?config.write_mode, "opening store");
        Ok(Self::open(config))
    }

    /// The active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// A handle to the collection `name`.
    pub fn collection(&self, name: impl Into<String>) -> CollectionRef {
        CollectionRef {
            db: self.clone(),
            name: name.into(),
        }
    }

    /// The offline queue.
    pub fn queue(&self) -> &SyncQueue {
        &self.inner.queue
    }

    /// The collection resolver.
    pub fn resolver(&self) -> &CollectionResolver {
        &self.inner.resolver
    }

    /// The current-user session slot.
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// The subscriber registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.inner.registry
    }

    /// Every pending mutation, in storage order.
    pub fn pending(&self) -> Result<Vec<SyncItem>> {
        self.inner.queue.list()
    }

    /// Drop one pending mutation by its item id.
    pub fn remove_pending(&self, item_id: &str) -> Result<bool> {
        let guard = self.inner.queue.lock_writes();
        let collection = self
            .inner
            .queue
            .list()?
            .into_iter()
            .find(|item| item.id == item_id)
            .map(|item| item.collection);

        let removed = self.inner.queue.remove(item_id)?;
        drop(guard);
        if let Some(collection) = collection.filter(|_| removed) {
            self.inner.registry.notify(&collection);
        }
        Ok(removed)
    }

    /// Drop every pending mutation.
    pub fn clear_pending(&self) -> Result<()> {
        let guard = self.inner.queue.lock_writes();
        let collections = pending_collections(&self.inner.queue.list()?);
        self.inner.queue.clear()?;
        drop(guard);
        for collection in collections {
            self.inner.registry.notify(&collection);
        }
        Ok(())
    }

    /// Fold the pending mutations of `name` into its base snapshot.
    ///
    /// See [`CollectionResolver::flush`] for the reconciliation rule.
    pub async fn flush(&self, name: &str) -> Result<FlushReport> {
        self.simulate_latency().await;
        self.inner.resolver.flush(name)
    }

    /// Flush every collection that has pending mutations.
    pub async fn flush_all(&self) -> Result<Vec<FlushReport>> {
        self.simulate_latency().await;
        let mut reports = Vec::new();
        for collection in pending_collections(&self.inner.queue.list()?) {
            reports.push(self.inner.resolver.flush(&collection)?);
        }
        Ok(reports)
    }

    /// School settings and a storage health report.
    ///
    /// Storage failures degrade the health status instead of failing; the
    /// settings then fall back to the seeded defaults.
    pub async fn get_config(&self) -> Result<ConfigSnapshot> {
        self.simulate_latency().await;

        let now = self.inner.clock.now_millis();
        let probe_key = self.inner.store.key(HEALTH_KEY);
        let storage_ok = match self.inner.store.backend().set(&probe_key, &now.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "storage probe failed");
                false
            }
        };

        let (queue_ok, pending) = match self.inner.queue.list() {
            Ok(items) => (true, items.len()),
            Err(e) => {
                warn!(error = %e, "offline queue unreadable");
                (false, 0)
            }
        };

        let settings = if storage_ok {
            self.settings()?
        } else {
            self.inner.resolver.seeds().settings().clone()
        };

        Ok(ConfigSnapshot {
            settings,
            health: Health::new(storage_ok, queue_ok, pending, now),
        })
    }

    /// Shallow-merge `patch` into the school settings.
    pub async fn update_config(&self, patch: Fields) -> Result<Fields> {
        self.simulate_latency().await;
        let _guard = self.inner.store.lock_writes();
        let mut settings = self.settings()?;
        settings.extend(patch);
        self.inner
            .store
            .save_json(&self.inner.store.key(CONFIG_KEY), &settings)?;
        debug!(fields = settings.len(), "settings updated");
        Ok(settings)
    }

    /// Copy every initialized collection and the offline queue.
    pub fn export_snapshot(&self) -> Result<DatabaseSnapshot> {
        let store = &self.inner.store;
        let mut snapshot = DatabaseSnapshot::new();

        for key in store.backend().keys()? {
            let Some(name) = store.collection_of(&key) else {
                continue;
            };
            if let Some(records) = store.load_with(&key, self.inner.config.on_malformed)? {
                snapshot.insert_collection(name, records);
            }
        }
        snapshot.queue = self.inner.queue.list()?;

        info!(
            collections = snapshot.collections.len(),
            records = snapshot.record_count(),
            pending = snapshot.pending_count(),
            "exported snapshot"
        );
        Ok(snapshot)
    }

    /// Overwrite the collections in `snapshot` and the whole offline queue.
    ///
    /// Collections not named in the snapshot are left as they are.
    pub fn import_snapshot(&self, snapshot: DatabaseSnapshot) -> Result<()> {
        snapshot.check_version()?;
        if let Some(name) = snapshot.collections.keys().find(|n| KeyedStore::is_reserved(n)) {
            return Err(Error::ReservedCollection(name.clone()));
        }

        let guard = self.inner.store.lock_writes();
        for (name, records) in &snapshot.collections {
            self.inner.resolver.save_base(name, records)?;
        }
        self.inner.queue.replace(&snapshot.queue)?;
        drop(guard);

        let mut touched: BTreeSet<String> = snapshot.collections.keys().cloned().collect();
        touched.extend(pending_collections(&snapshot.queue));
        for collection in &touched {
            self.inner.registry.notify(collection);
        }

        info!(
            collections = snapshot.collections.len(),
            pending = snapshot.pending_count(),
            "imported snapshot"
        );
        Ok(())
    }

    fn settings(&self) -> Result<Fields> {
        let store = &self.inner.store;
        let _guard = store.lock_writes();
        let key = store.key(CONFIG_KEY);
        if let Some(settings) = store.load_json::<Fields>(&key, self.inner.config.on_malformed)? {
            return Ok(settings);
        }

        let defaults = self.inner.resolver.seeds().settings().clone();
        store.save_json(&key, &defaults)?;
        info!(fields = defaults.len(), "seeded settings");
        Ok(defaults)
    }

    async fn simulate_latency(&self) {
        let latency = self.inner.config.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn pending_collections(items: &[SyncItem]) -> BTreeSet<String> {
    items.iter().map(|item| item.collection.clone()).collect()
}

/// The Document API for one named collection.
#[derive(Debug, Clone)]
pub struct CollectionRef {
    db: Database,
    name: String,
}

impl CollectionRef {
    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current view: base snapshot (seeded on first access) with pending
    /// mutations applied.
    pub async fn get(&self) -> Result<Vec<Record>> {
        self.ensure_collection()?;
        self.db.simulate_latency().await;
        self.db.inner.resolver.resolve(&self.name)
    }

    /// The current view decoded into `T`. Each record is presented as its
    /// flat JSON object, `id` included.
    pub async fn get_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let records = self.get().await?;
        records
            .iter()
            .map(|record| serde_json::from_value(record.to_value()).map_err(Into::into))
            .collect()
    }

    /// Store `fields` as a new record under a fresh id.
    ///
    /// Any `id` in `fields` is replaced.
    #[instrument(skip(self, fields), fields(collection = %self.name))]
    pub async fn add(&self, fields: Fields) -> Result<Record> {
        self.ensure_collection()?;
        self.db.simulate_latency().await;
        let inner = &self.db.inner;
        let record = Record::new(inner.ids.next_id(), fields);
        let guard = inner.queue.lock_writes();

        match inner.config.write_mode {
            WriteMode::WriteThrough => {
                let mut base = inner.resolver.base(&self.name)?;
                base.push(record.clone());
                inner.resolver.save_base(&self.name, &base)?;
            }
            WriteMode::Queued => {
                inner.queue.enqueue_mutation(
                    &self.name,
                    Mutation::Create {
                        payload: record.clone(),
                    },
                )?;
            }
        }

        drop(guard);
        debug!(id = %record.id, "added record");
        inner.registry.notify(&self.name);
        Ok(record)
    }

    /// Serialize `value` and [`add`](Self::add) it.
    pub async fn add_as<T: Serialize + ?Sized>(&self, value: &T) -> Result<Record> {
        let fields = fields_of(serde_json::to_value(value)?)?;
        self.add(fields).await
    }

    /// Shallow-merge `patch` onto the record `id`.
    ///
    /// Fails with a not-found error, writing nothing, when `id` is absent.
    #[instrument(skip(self, patch), fields(collection = %self.name))]
    pub async fn update(&self, id: &str, patch: Fields) -> Result<()> {
        self.ensure_collection()?;
        self.db.simulate_latency().await;
        let inner = &self.db.inner;
        let _guard = inner.queue.lock_writes();

        match inner.config.write_mode {
            WriteMode::WriteThrough => {
                let mut base = inner.resolver.base(&self.name)?;
                let mut found = false;
                for record in base.iter_mut().filter(|r| r.id == id) {
                    record.merge(&patch);
                    found = true;
                }
                if !found {
                    return Err(EngineError::RecordNotFound(id.to_string()).into());
                }
                inner.resolver.save_base(&self.name, &base)?;
            }
            WriteMode::Queued => {
                self.ensure_visible(id)?;
                inner.queue.enqueue_mutation(
                    &self.name,
                    Mutation::Update {
                        doc_id: id.to_string(),
                        payload: patch,
                    },
                )?;
            }
        }

        debug!(id = %id, "updated record");
        inner.registry.notify(&self.name);
        Ok(())
    }

    /// Remove the record `id`.
    ///
    /// Fails with a not-found error, writing nothing, when `id` is absent.
    #[instrument(skip(self), fields(collection = %self.name))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_collection()?;
        self.db.simulate_latency().await;
        let inner = &self.db.inner;
        let _guard = inner.queue.lock_writes();

        match inner.config.write_mode {
            WriteMode::WriteThrough => {
                let mut base = inner.resolver.base(&self.name)?;
                let before = base.len();
                base.retain(|r| r.id != id);
                if base.len() == before {
                    return Err(EngineError::RecordNotFound(id.to_string()).into());
                }
                inner.resolver.save_base(&self.name, &base)?;
            }
            WriteMode::Queued => {
                self.ensure_visible(id)?;
                inner.queue.enqueue_mutation(
                    &self.name,
                    Mutation::Delete {
                        doc_id: id.to_string(),
                    },
                )?;
            }
        }

        debug!(id = %id, "deleted record");
        inner.registry.notify(&self.name);
        Ok(())
    }

    /// Append every record in `records`, with a single write.
    #[instrument(skip(self, records), fields(collection = %self.name, count = records.len()))]
    pub async fn batch_set(&self, records: Vec<Record>) -> Result<()> {
        self.ensure_collection()?;
        self.db.simulate_latency().await;
        let inner = &self.db.inner;
        let _guard = inner.queue.lock_writes();

        match inner.config.write_mode {
            WriteMode::WriteThrough => {
                let mut base = inner.resolver.base(&self.name)?;
                base.extend(records);
                inner.resolver.save_base(&self.name, &base)?;
            }
            WriteMode::Queued => {
                let mutations = records
                    .into_iter()
                    .map(|payload| Mutation::Create { payload })
                    .collect();
                inner.queue.enqueue_all(&self.name, mutations)?;
            }
        }

        inner.registry.notify(&self.name);
        Ok(())
    }

    /// Watch the collection.
    ///
    /// `callback` is invoked right away with the current view, then again
    /// each time the view changes, until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<Record>) + Send + Sync + 'static,
    {
        self.ensure_collection()?;
        let inner = &self.db.inner;
        inner.config.validate()?;
        let initial = inner.resolver.resolve(&self.name)?;
        callback(initial.clone());

        let resolver = inner.resolver.clone();
        let name = self.name.clone();
        let refresh: Refresh = Arc::new(move || resolver.resolve(&name));
        let callback: Callback = Arc::new(callback);

        Ok(spawn_watcher(
            inner.registry.clone(),
            self.name.clone(),
            inner.config.poll_interval,
            initial,
            refresh,
            callback,
        ))
    }

    fn ensure_collection(&self) -> Result<()> {
        if KeyedStore::is_reserved(&self.name) {
            return Err(Error::ReservedCollection(self.name.clone()));
        }
        Ok(())
    }

    fn ensure_visible(&self, id: &str) -> Result<()> {
        let view = self.db.inner.resolver.resolve(&self.name)?;
        if view.iter().any(|r| r.id == id) {
            Ok(())
        } else {
            Err(EngineError::RecordNotFound(id.to_string()).into())
        }
    }
}
