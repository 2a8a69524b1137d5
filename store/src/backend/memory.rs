//! In-memory backend.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use super::StorageBackend;
use crate::{Error, Result};

/// A process-local backend with an optional byte quota.
///
/// Usage is counted as the byte length of every key plus its value.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Create an unbounded backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that refuses writes beyond `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Simulate storage being disabled (every call fails) or restored.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Bytes currently used.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }

    fn check_available(&self, key: &str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::storage(key, "storage is disabled"));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available(key)?;
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available(key)?;

        if let Some(quota) = self.quota_bytes {
            let current = self
                .entries
                .get(key)
                .map(|v| key.len() + v.value().len())
                .unwrap_or(0);
            let projected = self.used_bytes() - current + key.len() + value.len();
            if projected > quota {
                return Err(Error::storage(
                    key,
                    format!("quota exceeded ({projected} > {quota} bytes)"),
                ));
            }
        }

        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_available(key)?;
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.check_available("*")?;
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}
