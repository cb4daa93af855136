use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::EventError;

/// Reason why the gate was unlocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockReason {
    /// Lockout period expired naturally
    LockoutExpired,
    /// A persisted lock was found already expired at startup
    StaleRecord,
}

/// Represents events that can be emitted by the event bus
///
/// Events notify interested parties (audit logs, UI refreshers) about
/// submissions and lock transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A submission was accepted by the remote authority.
    LoginSucceeded {
        email: String,
        remember: bool,
        timestamp: DateTime<Utc>,
    },

    /// The remote authority rejected the credentials.
    LoginFailed {
        /// The email address that was attempted
        email: String,
        /// Consecutive failures including this one
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Too many failures engaged the lock.
    AccountLocked {
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// The lock was lifted.
    AccountUnlocked {
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// Implementors can be registered with the [`EventBus`] to receive every
/// emitted event.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that fans events out to registered handlers
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first error
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }

    /// Emit an event, logging rather than returning handler failures.
    ///
    /// Gate behavior never depends on observers.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.emit(&event).await {
            tracing::warn!(error = %e, ?event, "Event handler failed");
        }
    }
}
