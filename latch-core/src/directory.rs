//! User directory port
//!
//! Stands in for real user storage behind the remote authority. The gate
//! itself never consults a directory; only authority implementations do.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A stored credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub email: String,
    pub password: String,
}

impl CredentialRecord {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
pub trait Directory: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, Error>;

    /// `true` when `email` exists and `password` matches it.
    async fn verify(&self, email: &str, password: &str) -> Result<bool, Error> {
        Ok(self
            .find_by_email(email)
            .await?
            .is_some_and(|record| record.password == password))
    }
}

/// Directory held in memory, keyed by exact email.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<String, CredentialRecord>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, replacing any existing record for the same email.
    pub fn add_user(&self, record: CredentialRecord) {
        self.users.insert(record.email.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, Error> {
        Ok(self.users.get(email).map(|r| r.value().clone()))
    }
}
