//! Serialized forms of collections, the queue, and whole-database backups.
//!
//! Collections and the queue are each persisted as one JSON array under a
//! single key and always rewritten in full. A [`DatabaseSnapshot`] bundles
//! all of them for export and import, using `BTreeMap` so the output is
//! deterministic.

use crate::{error::Result, CollectionName, Error, Record, SyncItem};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Serialize a collection for storage.
pub fn encode_collection(records: &[Record]) -> Result<String> {
    encode(records)
}

/// Parse a stored collection. Anything but an array of records is malformed.
pub fn decode_collection(key: &str, raw: &str) -> Result<Vec<Record>> {
    decode(key, raw)
}

/// Serialize the offline queue for storage.
pub fn encode_queue(items: &[SyncItem]) -> Result<String> {
    encode(items)
}

/// Parse the stored offline queue.
pub fn decode_queue(key: &str, raw: &str) -> Result<Vec<SyncItem>> {
    decode(key, raw)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::InvalidRecord(e.to_string()))
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::malformed(key, e))
}

/// A point-in-time copy of every initialized collection plus the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Base snapshot of each collection, by name
    pub collections: BTreeMap<CollectionName, Vec<Record>>,
    /// Pending offline mutations
    pub queue: Vec<SyncItem>,
}

impl Default for DatabaseSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collections: BTreeMap::new(),
            queue: Vec::new(),
        }
    }

    /// Set the base records of a collection.
    pub fn insert_collection(&mut self, name: impl Into<CollectionName>, records: Vec<Record>) {
        self.collections.insert(name.into(), records);
    }

    /// Count records across all collections (queue excluded).
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Number of pending mutations.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::malformed("snapshot", e))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::malformed("snapshot", e))
    }

    /// Deserialize from JSON, rejecting newer format versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = decode("snapshot", json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Reject snapshots written by a newer format.
    pub fn check_version(&self) -> Result<()> {
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::UnsupportedSnapshotVersion {
                found: self.format_version,
                supported: SNAPSHOT_FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

/// Summary of a snapshot (without the data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub collection_count: usize,
    pub record_count: usize,
    pub pending_count: usize,
}

impl From<&DatabaseSnapshot> for SnapshotMetadata {
    fn from(snapshot: &DatabaseSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            collection_count: snapshot.collections.len(),
            record_count: snapshot.record_count(),
            pending_count: snapshot.pending_count(),
        }
    }
}
