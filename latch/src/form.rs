//! View model for a login form.
//!
//! Holds what the user typed and what the last submission left behind, so a
//! surface (the CLI here, a UI elsewhere) only has to render it.

use latch_core::RemainingLockout;
use latch_core::validation::{Field, FieldErrors};

use crate::controller::{Credentials, GateStatus, LoginSuccess};
use crate::error::LoginError;

#[derive(Debug, Clone, Default)]
pub struct FormState {
    credentials: Credentials,
    field_errors: FieldErrors,
    general_error: Option<String>,
    loading: bool,
    locked: bool,
    remaining: Option<RemainingLockout>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.credentials.email = email.into();
        self.field_errors.remove(Field::Email);
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.credentials.password = password.into();
        self.field_errors.remove(Field::Password);
    }

    pub fn set_remember(&mut self, remember: bool) {
        self.credentials.remember = remember;
    }

    pub fn field_error(&self, field: Field) -> Option<&str> {
        self.field_errors.message(field)
    }

    pub fn general_error(&self) -> Option<&str> {
        self.general_error.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Mark a submission as started. Cleared again by [`apply`](Self::apply).
    pub fn begin_submit(&mut self) {
        self.loading = true;
    }

    /// The submit control is disabled while locked or loading.
    pub fn can_submit(&self) -> bool {
        !self.locked && !self.loading
    }

    /// "Time remaining: N minutes" while locked.
    pub fn time_remaining(&self) -> Option<String> {
        self.remaining
            .filter(|_| self.locked)
            .map(|remaining| format!("Time remaining: {remaining}"))
    }

    /// Sync the lock indicator with the controller.
    pub fn refresh(&mut self, status: &GateStatus) {
        self.locked = status.locked;
        self.remaining = status.remaining;
    }

    /// Apply a submission result. Returns the destination on success.
    pub fn apply(&mut self, result: &Result<LoginSuccess, LoginError>) -> Option<String> {
        self.general_error = None;
        self.loading = false;

        match result {
            Ok(success) => {
                self.field_errors = FieldErrors::new();
                self.locked = false;
                self.remaining = None;
                Some(success.destination.clone())
            }
            Err(LoginError::Validation(errors)) => {
                self.field_errors = errors.clone();
                None
            }
            Err(err) => {
                self.field_errors = FieldErrors::new();
                self.general_error = err.general_message();
                if let Some(remaining) = err.remaining_lockout() {
                    self.locked = true;
                    self.remaining = Some(remaining);
                }
                None
            }
        }
    }
}
