//! Repository trait for the persisted lockout record.
//!
//! The attempt tracker never touches a storage backend directly; it goes
//! through [`LockoutRepository`], which lets tests substitute in-memory
//! storage and lets applications pick any [`KeyValueStore`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Error,
    error::StorageError,
    lockout::LockoutRecord,
    storage::{KeyValueStore, LOCKOUT_KEY},
};

/// Storage port for the lockout record.
///
/// There is a single global slot: the lock is not scoped per account.
#[async_trait]
pub trait LockoutRepository: Send + Sync + 'static {
    /// Load the persisted record, if any.
    ///
    /// Returns `StorageError::Corrupt` when a record exists but cannot be
    /// decoded.
    async fn load(&self) -> Result<Option<LockoutRecord>, Error>;

    /// Replace the persisted record.
    async fn save(&self, record: &LockoutRecord) -> Result<(), Error>;

    /// Delete the persisted record. Clearing an empty slot is a no-op.
    async fn clear(&self) -> Result<(), Error>;
}

/// [`LockoutRepository`] that stores the record as JSON under a single key.
pub struct KeyValueLockoutRepository<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    key: String,
}

impl<S: KeyValueStore + ?Sized> KeyValueLockoutRepository<S> {
    /// Create a repository using the default `loginLockout` key.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, LOCKOUT_KEY)
    }

    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> LockoutRepository for KeyValueLockoutRepository<S> {
    async fn load(&self) -> Result<Option<LockoutRecord>, Error> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };

        let record = serde_json::from_str(&raw).map_err(|e| {
            tracing::warn!(key = %self.key, error = %e, "Failed to decode lockout record");
            StorageError::Corrupt {
                key: self.key.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Some(record))
    }

    async fn save(&self, record: &LockoutRecord) -> Result<(), Error> {
        let raw = serde_json::to_string(record).map_err(|e| StorageError::Corrupt {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&self.key, &raw).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.store.remove(&self.key).await
    }
}
