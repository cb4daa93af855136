//! Builder for [`LoginController`] instances
//!
//! The builder uses the same type-state shape for every backend: a durable
//! store must be chosen before [`LatchBuilder::build`] is available.
//!
//! ```rust,no_run
//! use latch::LatchBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = LatchBuilder::new()
//!     .with_sqlite("sqlite://latch.db?mode=rwc")
//!     .await?
//!     .apply_migrations(true)
//!     .with_http_authority("https://auth.example.com/api/auth/login")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use latch_core::{
    AttemptTracker, Clock, KeyValueLockoutRepository, KeyValueStore, LockoutPolicy,
    LockoutRepository, SystemClock, events::EventBus,
};

use crate::authority::{Authority, HttpAuthority};
use crate::config::{DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS, LatchConfig};
use crate::controller::{DEFAULT_DESTINATION, LoginController};

#[derive(Debug, thiserror::Error)]
pub enum LatchBuilderError {
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Failed to restore lockout state: {0}")]
    Restore(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Marker type: no durable store configured yet.
pub struct NoStorage;

/// Marker type: durable store configured.
pub struct WithStorage {
    durable: Arc<dyn KeyValueStore>,
    #[cfg(feature = "sqlite")]
    sqlite: Option<Arc<latch_storage_sqlite::SqliteStorage>>,
}

pub struct LatchBuilder<Storage> {
    storage: Storage,
    authority: Option<Arc<dyn Authority>>,
    endpoint: String,
    request_timeout: Duration,
    ephemeral: Option<Arc<dyn KeyValueStore>>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
    events: EventBus,
    destination: String,
    apply_migrations: bool,
}

impl Default for LatchBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl LatchBuilder<NoStorage> {
    /// Defaults: 5 attempts, 15 minute lock, 1 second expiry check, HTTP
    /// authority at the default endpoint, system clock.
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            authority: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            ephemeral: None,
            policy: LockoutPolicy::default(),
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
            destination: DEFAULT_DESTINATION.to_string(),
            apply_migrations: false,
        }
    }

    /// Start from a loaded [`LatchConfig`]. The database URL is not opened
    /// here; pass it to [`with_sqlite`](Self::with_sqlite).
    pub fn from_config(config: &LatchConfig) -> Result<Self, LatchBuilderError> {
        let policy = config
            .policy()
            .map_err(|e| LatchBuilderError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            request_timeout: config.request_timeout(),
            policy,
            destination: config.destination.clone(),
            ..Self::new()
        })
    }

    /// Use any [`KeyValueStore`] as the durable slot.
    pub fn with_store(self, durable: Arc<dyn KeyValueStore>) -> LatchBuilder<WithStorage> {
        self.into_storage(WithStorage {
            durable,
            #[cfg(feature = "sqlite")]
            sqlite: None,
        })
    }

    fn into_storage(self, storage: WithStorage) -> LatchBuilder<WithStorage> {
        LatchBuilder {
            storage,
            authority: self.authority,
            endpoint: self.endpoint,
            request_timeout: self.request_timeout,
            ephemeral: self.ephemeral,
            policy: self.policy,
            clock: self.clock,
            events: self.events,
            destination: self.destination,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl LatchBuilder<NoStorage> {
    /// Open the SQLite database at `url` as the durable slot.
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<LatchBuilder<WithStorage>, LatchBuilderError> {
        let storage = latch_storage_sqlite::SqliteStorage::connect(url)
            .await
            .map_err(|e| LatchBuilderError::StorageConnection(e.to_string()))?;
        Ok(self.with_sqlite_storage(Arc::new(storage)))
    }

    pub fn with_sqlite_storage(
        self,
        storage: Arc<latch_storage_sqlite::SqliteStorage>,
    ) -> LatchBuilder<WithStorage> {
        self.into_storage(WithStorage {
            durable: storage.clone(),
            sqlite: Some(storage),
        })
    }
}

impl<S> LatchBuilder<S> {
    pub fn with_authority(mut self, authority: Arc<dyn Authority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Post credentials to `endpoint`. The client is created at build time.
    pub fn with_http_authority(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self.authority = None;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_ephemeral_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.ephemeral = Some(store);
        self
    }

    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Run storage migrations during [`build`](LatchBuilder::build). Only
    /// SQLite storage has migrations.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

impl LatchBuilder<WithStorage> {
    /// Wire everything together, restore any persisted lock and resume its
    /// expiry check.
    pub async fn build(self) -> Result<LoginController, LatchBuilderError> {
        #[cfg(feature = "sqlite")]
        if self.apply_migrations {
            if let Some(sqlite) = &self.storage.sqlite {
                sqlite
                    .migrate()
                    .await
                    .map_err(|e| LatchBuilderError::Migration(e.to_string()))?;
            }
        }

        let authority = match self.authority {
            Some(authority) => authority,
            None => Arc::new(
                HttpAuthority::new(&self.endpoint, self.request_timeout)
                    .map_err(|e| LatchBuilderError::InvalidConfiguration(e.to_string()))?,
            ),
        };

        let repository: Arc<dyn LockoutRepository> =
            Arc::new(KeyValueLockoutRepository::new(self.storage.durable.clone()));
        let mut tracker = AttemptTracker::new(repository, self.policy, self.clock)
            .with_events(self.events.clone());
        tracker
            .restore()
            .await
            .map_err(|e| LatchBuilderError::Restore(e.to_string()))?;

        let mut controller =
            LoginController::new(tracker.into_shared(), authority, self.storage.durable)
                .with_events(self.events)
                .with_destination(self.destination);
        if let Some(ephemeral) = self.ephemeral {
            controller = controller.with_ephemeral_store(ephemeral);
        }

        controller.resume_timer().await;
        Ok(controller)
    }
}
