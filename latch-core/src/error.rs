use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Lockout error: {0}")]
    Lockout(#[from] LockoutError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Corrupt record under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockoutError {
    #[error("Account is locked until {until}")]
    Locked { until: DateTime<Utc> },

    #[error("Lock engaged at {locked_at} has no representable expiry")]
    ExpiryOutOfRange { locked_at: DateTime<Utc> },
}

/// Returned by event handlers. The bus logs these; they never reach
/// gate operations.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Error::Lockout(LockoutError::Locked { .. }))
    }
}
