//! Offline mutation types.
//!
//! A pending change is stored as a [`SyncItem`]: a queued create, update or
//! delete against one collection, stamped with the time it was issued. The
//! persisted layout is flat:
//!
//! ```json
//! {"id": "...", "collection": "finance", "type": "UPDATE",
//!  "docId": "tx9", "payload": {"amount": 200}, "timestamp": 20}
//! ```

use crate::{record::Fields, CollectionName, Record, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Unique identifier of a queued item (not of the record it targets).
pub type SyncItemId = String;

/// Kind of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Create => write!(f, "CREATE"),
            MutationKind::Update => write!(f, "UPDATE"),
            MutationKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// The change a queued item carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Mutation {
    /// Append `payload` as a new record
    Create { payload: Record },
    /// Shallow-merge `payload` onto the record with `id == doc_id`
    Update {
        #[serde(rename = "docId")]
        doc_id: RecordId,
        payload: Fields,
    },
    /// Remove the record with `id == doc_id`
    Delete {
        #[serde(rename = "docId")]
        doc_id: RecordId,
    },
}

impl Mutation {
    /// Get the mutation kind.
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create { .. } => MutationKind::Create,
            Mutation::Update { .. } => MutationKind::Update,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }

    /// Get the record ID this mutation targets.
    pub fn target_id(&self) -> &RecordId {
        match self {
            Mutation::Create { payload } => &payload.id,
            Mutation::Update { doc_id, .. } => doc_id,
            Mutation::Delete { doc_id } => doc_id,
        }
    }
}

/// One pending mutation in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Queue item ID
    pub id: SyncItemId,
    /// Target collection
    pub collection: CollectionName,
    /// The change itself
    #[serde(flatten)]
    pub mutation: Mutation,
    /// When the mutation was issued (milliseconds since epoch)
    pub timestamp: Timestamp,
}

impl SyncItem {
    /// Create a queued item.
    pub fn new(
        id: impl Into<SyncItemId>,
        collection: impl Into<CollectionName>,
        mutation: Mutation,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            mutation,
            timestamp,
        }
    }

    /// Queue a create of `record`.
    pub fn create(
        id: impl Into<SyncItemId>,
        collection: impl Into<CollectionName>,
        record: Record,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(id, collection, Mutation::Create { payload: record }, timestamp)
    }

    /// Queue a shallow-merge of `patch` onto `doc_id`.
    pub fn update(
        id: impl Into<SyncItemId>,
        collection: impl Into<CollectionName>,
        doc_id: impl Into<RecordId>,
        patch: Fields,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            id,
            collection,
            Mutation::Update {
                doc_id: doc_id.into(),
                payload: patch,
            },
            timestamp,
        )
    }

    /// Queue a removal of `doc_id`.
    pub fn delete(
        id: impl Into<SyncItemId>,
        collection: impl Into<CollectionName>,
        doc_id: impl Into<RecordId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            id,
            collection,
            Mutation::Delete {
                doc_id: doc_id.into(),
            },
            timestamp,
        )
    }

    /// Get the mutation kind.
    pub fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }

    /// The `docId` of an update or delete; `None` for creates.
    pub fn doc_id(&self) -> Option<&RecordId> {
        match &self.mutation {
            Mutation::Create { .. } => None,
            Mutation::Update { doc_id, .. } | Mutation::Delete { doc_id } => Some(doc_id),
        }
    }
}
