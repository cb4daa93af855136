use chrono::{DateTime, Utc};
use latch_core::RemainingLockout;
use latch_core::validation::FieldErrors;
use thiserror::Error;

pub const SYSTEM_ERROR: &str = "System error, please try again later.";
pub const ACCOUNT_LOCKED: &str = "Account is locked. Please try again later.";
pub const LOGIN_FAILED: &str = "Login failed";

/// Why a submission did not sign the user in.
///
/// Every variant is recoverable: retrying works for all of them except the
/// two lockout variants, which clear once the lock expires.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Malformed input; nothing was sent.
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),

    /// The authority answered 401 and the lock threshold is not reached yet.
    #[error("Invalid credentials. {}", remaining_text(.remaining))]
    AuthenticationRejected { attempts: u32, remaining: u32 },

    /// The authority answered 401 and this failure engaged the lock.
    #[error("Account locked due to too many failed attempts. Please try again in {remaining}.")]
    LockoutEngaged {
        attempts: u32,
        expires_at: DateTime<Utc>,
        remaining: RemainingLockout,
    },

    /// The gate is locked; nothing was sent.
    #[error("Account is locked. Please try again later.")]
    AccountLocked { remaining: RemainingLockout },

    /// Network or parse failure, or a 5xx answer. Never counted against the user.
    #[error("System error, please try again later.")]
    RemoteUnavailable(String),

    /// Any other non-success status.
    #[error("{}", .message.as_deref().unwrap_or(LOGIN_FAILED))]
    ClientRejected {
        status: u16,
        message: Option<String>,
    },

    /// Another submission from this form is still in flight.
    #[error("A sign-in request is already in progress.")]
    Busy,

    /// Local storage failed while recording the outcome.
    #[error("System error, please try again later.")]
    Internal(#[source] latch_core::Error),
}

fn remaining_text(remaining: &u32) -> String {
    match remaining {
        1 => "1 attempt remaining.".to_string(),
        n => format!("{n} attempts remaining."),
    }
}

impl LoginError {
    /// The form-level message, or `None` when the errors belong to fields.
    pub fn general_message(&self) -> Option<String> {
        match self {
            LoginError::Validation(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            LoginError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            LoginError::LockoutEngaged { .. } | LoginError::AccountLocked { .. }
        )
    }

    /// Time left on the lock, for the lockout variants.
    pub fn remaining_lockout(&self) -> Option<RemainingLockout> {
        match self {
            LoginError::LockoutEngaged { remaining, .. }
            | LoginError::AccountLocked { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Whether this failure was counted toward the lock.
    pub fn counted(&self) -> bool {
        matches!(
            self,
            LoginError::AuthenticationRejected { .. } | LoginError::LockoutEngaged { .. }
        )
    }
}
