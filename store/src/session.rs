//! The current-user session slot.
//!
//! Authentication lives elsewhere; this only persists whichever user record
//! it hands over, under `"<prefix>_session"`.

use schooldb_engine::Record;
use tracing::debug;

use crate::config::MalformedPolicy;
use crate::keyed::{KeyedStore, SESSION_KEY};
use crate::Result;

/// Persisted current-user record.
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: KeyedStore,
    key: String,
}

impl SessionStore {
    pub fn new(store: KeyedStore) -> Self {
        let key = store.key(SESSION_KEY);
        Self { store, key }
    }

    /// Remember `user` as the signed-in user.
    pub fn save(&self, user: &Record) -> Result<()> {
        self.store.save_json(&self.key, user)?;
        debug!(user = %user.id, "session saved");
        Ok(())
    }

    /// The signed-in user, if any. A corrupt entry reads as signed out.
    pub fn load(&self) -> Result<Option<Record>> {
        self.store.load_json(&self.key, MalformedPolicy::Reseed)
    }

    /// Forget the signed-in user.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.key)?;
        debug!("session cleared");
        Ok(())
    }
}
