//! Error types for the schooldb engine.

use crate::RecordId;
use thiserror::Error;

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("malformed snapshot under '{key}': {reason}")]
    MalformedSnapshot { key: String, reason: String },

    #[error("unsupported snapshot format version: {found} (max supported: {supported})")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },
}

impl Error {
    /// Build a [`Error::MalformedSnapshot`] for content stored under `key`.
    pub fn malformed(key: impl Into<String>, reason: impl ToString) -> Self {
        Error::MalformedSnapshot {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this is the soft "nothing to act on" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
