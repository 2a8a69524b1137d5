//! # schooldb store
//!
//! An offline-first document store for school management screens, built on
//! the pure merge logic in `schooldb-engine`.
//!
//! Every collection lives under one key of a [`StorageBackend`] as a JSON
//! array. Pending mutations live under a single queue key and are merged
//! into every read. Reads and writes go through the async Document API on
//! [`CollectionRef`], which waits out a configurable latency before it
//! touches storage.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schooldb_store::{Database, StoreConfig};
//! use serde_json::json;
//!
//! # async fn run() -> schooldb_store::Result<()> {
//! let db = Database::in_memory(StoreConfig::default());
//! let students = db.collection("students");
//!
//! let added = students
//!     .add(json!({"name": "Esther Wambui", "grade": "Grade 4"}).as_object().cloned().unwrap_or_default())
//!     .await?;
//! students.update(&added.id, json!({"grade": "Grade 5"}).as_object().cloned().unwrap_or_default()).await?;
//!
//! let view = students.get().await?;
//! assert!(view.iter().any(|r| r.id == added.id));
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`StoreConfig::from_env`] reads `SCHOOLDB_*` variables (after loading a
//! `.env` file when [`Database::from_env`] is used). See [`config`].

pub mod backend;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod ids;
pub mod keyed;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod subscription;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, MalformedPolicy, StoreConfig, WriteMode};
pub use database::{CollectionRef, Database, DatabaseBuilder};
pub use error::{Error, IgnoreNotFound, Result};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use keyed::KeyedStore;
pub use queue::SyncQueue;
pub use resolver::{CollectionResolver, FlushReport};
pub use session::SessionStore;
pub use settings::{ConfigSnapshot, Health, HealthStatus};
pub use subscription::{Subscription, SubscriptionId, SubscriptionRegistry};

pub use schooldb_engine::{
    DatabaseSnapshot, Fields, Mutation, MutationKind, Record, RecordId, SeedCatalog, SyncItem,
};
