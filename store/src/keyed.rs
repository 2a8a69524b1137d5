//! Collections persisted as whole snapshots under namespaced keys.

use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use schooldb_engine::{decode_collection, encode_collection, Record};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::backend::StorageBackend;
use crate::config::MalformedPolicy;
use crate::Result;

/// Key suffix of the offline queue.
pub const QUEUE_KEY: &str = "sync_queue";
/// Key suffix of the settings singleton.
pub const CONFIG_KEY: &str = "config";
/// Key suffix of the current-user session.
pub const SESSION_KEY: &str = "session";
/// Key suffix of the health probe.
pub const HEALTH_KEY: &str = "health";

/// Suffixes that never name a collection.
pub const RESERVED_KEYS: [&str; 4] = [QUEUE_KEY, CONFIG_KEY, SESSION_KEY, HEALTH_KEY];

/// Held for the duration of a read-modify-write.
pub type WriteGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// A thin layer over a [`StorageBackend`] that reads and writes whole
/// collections. Writes always replace the full value.
///
/// Clones share one write lock. Every read-modify-write in the crate runs
/// under [`KeyedStore::lock_writes`]; the lock is reentrant so composite
/// operations can call the smaller ones.
#[derive(Debug, Clone)]
pub struct KeyedStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    writes: Arc<ReentrantMutex<()>>,
}

impl KeyedStore {
    /// Create a store namespacing every key with `prefix`.
    pub fn new(backend: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            writes: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Serialize writers sharing this store. Never hold across `.await`.
    pub fn lock_writes(&self) -> WriteGuard<'_> {
        self.writes.lock()
    }

    /// Whether `name` collides with a reserved key.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_KEYS.contains(&name)
    }

    /// `"<prefix>_<name>"` for a collection, refusing reserved names.
    pub fn collection_key(&self, name: &str) -> Result<String> {
        if Self::is_reserved(name) {
            return Err(crate::Error::ReservedCollection(name.to_string()));
        }
        Ok(self.key(name))
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `"<prefix>_<name>"`.
    pub fn key(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// The collection a key belongs to, if it is a collection key.
    pub fn collection_of<'k>(&self, key: &'k str) -> Option<&'k str> {
        let name = key.strip_prefix(self.prefix.as_str())?.strip_prefix('_')?;
        (!name.is_empty() && !Self::is_reserved(name)).then_some(name)
    }

    /// Whether anything was ever written under `key`.
    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.backend.get(key)?.is_some())
    }

    /// Load a collection; unparseable content counts as absent.
    pub fn load(&self, key: &str) -> Result<Option<Vec<Record>>> {
        self.load_with(key, MalformedPolicy::Reseed)
    }

    /// Load a collection; unparseable content is an error.
    pub fn try_load(&self, key: &str) -> Result<Option<Vec<Record>>> {
        self.load_with(key, MalformedPolicy::Reject)
    }

    /// Load a collection, handling unparseable content per `policy`.
    pub fn load_with(&self, key: &str, policy: MalformedPolicy) -> Result<Option<Vec<Record>>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        match decode_collection(key, &raw) {
            Ok(records) => Ok(Some(records)),
            Err(e) => tolerate(policy, key, e.into()),
        }
    }

    /// Persist a collection, replacing whatever was there.
    pub fn save(&self, key: &str, records: &[Record]) -> Result<()> {
        let raw = encode_collection(records)?;
        self.backend.set(key, &raw)?;
        debug!(key = %key, records = records.len(), "saved collection");
        Ok(())
    }

    /// Load any JSON value, handling unparseable content per `policy`.
    pub fn load_json<T: DeserializeOwned>(
        &self,
        key: &str,
        policy: MalformedPolicy,
    ) -> Result<Option<T>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => tolerate(policy, key, schooldb_engine::Error::malformed(key, e).into()),
        }
    }

    /// Persist any JSON value.
    pub fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw)
    }

    /// Delete `key`.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key)
    }
}

fn tolerate<T>(policy: MalformedPolicy, key: &str, err: crate::Error) -> Result<Option<T>> {
    match policy {
        MalformedPolicy::Reject => Err(err),
        MalformedPolicy::Reseed => {
            warn!(key = %key, error = %err, "discarding malformed stored value");
            Ok(None)
        }
    }
}
