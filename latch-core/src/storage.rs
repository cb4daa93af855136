//! Key-value storage ports
//!
//! The gate talks to two string key-value slots: a durable one that survives
//! restarts (lockout record, remembered session token) and an ephemeral one
//! that lives only as long as the current session. Both sit behind
//! [`KeyValueStore`] so backends can be swapped freely.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::Error;

/// Key under which the session token is stored.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Key under which the lockout record is stored.
pub const LOCKOUT_KEY: &str = "loginLockout";

/// A string key-value store.
///
/// Each call must be atomic on its own: a reader sees either the old value
/// or the new one, never a partial write.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), Error>;
}

/// In-process store. Used as the ephemeral session store and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, as happens when a browsing session ends.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}
