//! Identifier generation for records and queue items.

use std::sync::atomic::{AtomicU64, Ordering};

/// A source of fresh, unique string ids.
pub trait IdGenerator: Send + Sync + std::fmt::Debug {
    fn next_id(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `"<prefix>-<n>"` ids, starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| UuidGenerator.next_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn sequential_ids() {
        let ids = SequentialIds::new("stu");
        assert_eq!(ids.next_id(), "stu-1");
        assert_eq!(ids.next_id(), "stu-2");
    }
}
