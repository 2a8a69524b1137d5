//! Unified error handling for the store.

use schooldb_engine::MutationKind;

use crate::config::ConfigError;

/// Store error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage unavailable for '{key}': {reason}")]
    StorageUnavailable { key: String, reason: String },

    #[error(transparent)]
    Engine(#[from] schooldb_engine::Error),

    #[error("'{0}' is a reserved key and cannot name a collection")]
    ReservedCollection(String),

    #[error("{0} mutation requires a docId")]
    MissingDocId(MutationKind),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::StorageUnavailable`] for `key`.
    pub fn storage(key: impl Into<String>, reason: impl ToString) -> Self {
        Error::StorageUnavailable {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// `update`/`delete` found no record with the given id.
    ///
    /// Callers that want the silent behavior can filter on this.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Engine(e) if e.is_not_found())
    }

    /// The backend refused a read or write.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable { .. })
    }

    /// The collection name collides with a reserved key.
    pub fn is_reserved_collection(&self) -> bool {
        matches!(self, Error::ReservedCollection(_))
    }

    /// Stored content could not be parsed.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::Engine(schooldb_engine::Error::MalformedSnapshot { .. })
        )
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience for swallowing [`Error::is_not_found`].
pub trait IgnoreNotFound {
    /// Turn a not-found failure into `Ok(())`.
    fn ignore_not_found(self) -> Result<()>;
}

impl IgnoreNotFound for Result<()> {
    fn ignore_not_found(self) -> Result<()> {
        match self {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}
