//! Raw key-value storage.
//!
//! A backend stores opaque strings under string keys, like browser local
//! storage. It knows nothing about collections; see [`crate::KeyedStore`].

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::Result;

/// Low-level storage backend.
///
/// Implementors must be `Send + Sync` so one backend can be shared by every
/// handle in the process. Failures surface as
/// [`crate::Error::StorageUnavailable`].
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Read the value under `key`, `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Every key currently stored, sorted.
    fn keys(&self) -> Result<Vec<String>>;
}
