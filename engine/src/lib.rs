//! # schooldb engine
//!
//! The deterministic core of an offline-first document store for school
//! management data (students, finance, staff, transport, ...).
//!
//! Collections are persisted as whole snapshots. Pending local changes live
//! in a separate offline queue and are merged into every read, so callers see
//! their own writes before those writes are folded into the base snapshot.
//!
//! ## Design Principles
//!
//! - **No IO**: storage, time and id generation live in `schooldb-store`
//! - **Deterministic**: the same base and queue always resolve to the same view
//! - **Schema-less**: a record is any JSON object with a string `id`
//!
//! ## Core Concepts
//!
//! - [`Record`]: an untyped document, shallow-merged on update
//! - [`SyncItem`]: one queued [`Mutation`] (`CREATE`, `UPDATE`, `DELETE`)
//! - [`Resolver`]: replays the queue over a base snapshot, ordered by timestamp
//! - [`SeedCatalog`]: the defaults a collection starts with on first read
//!
//! ## Quick Start
//!
//! ```rust
//! use schooldb_engine::{Record, Resolver, SyncItem};
//! use serde_json::json;
//!
//! let base = vec![Record::from_value(json!({"id": "tx1", "amount": 100})).unwrap()];
//! let queue = vec![
//!     SyncItem::create("q1", "finance", Record::from_value(json!({"id": "tx9", "amount": 100})).unwrap(), 10),
//!     SyncItem::update("q2", "finance", "tx9", json!({"amount": 200}).as_object().unwrap().clone(), 20),
//! ];
//!
//! let view = Resolver::new("finance").view(&base, &queue);
//! assert_eq!(view.len(), 2);
//! assert_eq!(view[1].get("amount"), Some(json!(200)));
//! ```

pub mod error;
pub mod mutation;
pub mod record;
pub mod resolve;
pub mod seed;
pub mod snapshot;

// Re-export main types at crate root
pub use error::Error;
pub use mutation::{Mutation, MutationKind, SyncItem, SyncItemId};
pub use record::{fields_of, Fields, Record, ID_FIELD};
pub use resolve::{Resolution, Resolver, SkipReason, Skipped};
pub use seed::{collections, SeedCatalog};
pub use snapshot::{
    decode_collection, decode_queue, encode_collection, encode_queue, DatabaseSnapshot,
    SnapshotMetadata, SNAPSHOT_FORMAT_VERSION,
};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type Timestamp = u64;
