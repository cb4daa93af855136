//! SQLite durable store for the latch login gate
//!
//! Backs the durable [`KeyValueStore`] slot: the lockout record and the
//! remembered session token survive process restarts here.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use latch_core::KeyValueLockoutRepository;
//! use latch_storage_sqlite::SqliteStorage;
//!
//! # async fn run() -> Result<(), latch_core::Error> {
//! let storage = Arc::new(SqliteStorage::connect("sqlite://latch.db").await?);
//! storage.migrate().await?;
//! let lockouts = KeyValueLockoutRepository::new(storage.clone());
//! # Ok(())
//! # }
//! ```
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use latch_core::{Error, KeyValueStore, error::StorageError};
use latch_migration::MigrationManager;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod migrations;

use migrations::SqliteMigrationManager;

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url, "Failed to open SQLite database");
                StorageError::Connection(e.to_string())
            })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            StorageError::Migration("Failed to initialize migrations".to_string())
        })?;

        let applied = manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            StorageError::Migration("Failed to run migrations".to_string())
        })?;
        if !applied.is_empty() {
            tracing::info!(?applied, "Storage schema updated");
        }

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "Failed to read key");
                StorageError::Database("Failed to read key".to_string())
            })?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key, "Failed to write key");
            StorageError::Database("Failed to write key".to_string())
        })?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "Failed to delete key");
                StorageError::Database("Failed to delete key".to_string())
            })?;

        Ok(())
    }
}
