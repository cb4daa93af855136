//! Credential validation
//!
//! Field-level well-formedness checks run before anything is sent to the
//! remote authority. These are pure functions; strength rules for passwords
//! belong to the authority and are not enforced here.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::ValidationError;

/// Something shaped like `local-part@domain.tld`: one `@`, no whitespace and
/// at least one `.` after the `@`.
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern"));

pub const EMAIL_REQUIRED: &str = "Email is required";
pub const EMAIL_INVALID: &str = "Please enter a valid email address";
pub const PASSWORD_REQUIRED: &str = "Password is required";

/// A credential form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Email,
    Password,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Password => "password",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValidationError {
    /// The human readable message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            ValidationError::MissingField(msg) | ValidationError::InvalidFormat(msg) => msg,
        }
    }
}

/// Per-field validation failures. An empty set means the credentials are
/// well formed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, ValidationError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, error: ValidationError) {
        self.0.insert(field, error);
    }

    pub fn get(&self, field: Field) -> Option<&ValidationError> {
        self.0.get(&field)
    }

    pub fn remove(&mut self, field: Field) -> Option<ValidationError> {
        self.0.remove(&field)
    }

    /// The message to show next to `field`, if any.
    pub fn message(&self, field: Field) -> Option<&str> {
        self.get(field).map(ValidationError::message)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &ValidationError)> {
        self.0.iter().map(|(field, error)| (*field, error))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {}", error.message())?;
            first = false;
        }
        Ok(())
    }
}

/// Validates an email address.
///
/// Returns `MissingField` for empty or whitespace-only input and
/// `InvalidFormat` for anything that is not shaped like an address.
///
/// ```rust
/// use latch_core::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("bad@x").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField(EMAIL_REQUIRED.to_string()));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat(EMAIL_INVALID.to_string()))
    }
}

/// Validates that a password was entered.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::MissingField(PASSWORD_REQUIRED.to_string()));
    }

    Ok(())
}

/// Validates both credential fields and collects every failure.
pub fn validate_credentials(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if let Err(e) = validate_email(email) {
        errors.insert(Field::Email, e);
    }
    if let Err(e) = validate_password(password) {
        errors.insert(Field::Password, e);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("test.email+tag@domain.co.uk").is_ok());
        assert!(validate_email("a@b.c").is_ok());
    }

    #[test]
    fn test_validate_email_missing() {
        assert_eq!(
            validate_email(""),
            Err(ValidationError::MissingField(EMAIL_REQUIRED.to_string()))
        );
        assert_eq!(
            validate_email("   "),
            Err(ValidationError::MissingField(EMAIL_REQUIRED.to_string()))
        );
    }

    #[test]
    fn test_validate_email_invalid_format() {
        for email in [
            "bad@x",
            "invalid-email",
            "@domain.com",
            "user@",
            "user@.",
            "us er@example.com",
            "user@exam ple.com",
            "user@@example.com",
        ] {
            assert!(
                matches!(validate_email(email), Err(ValidationError::InvalidFormat(_))),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("x").is_ok());
        assert!(validate_password("short").is_ok());
        assert!(matches!(
            validate_password(""),
            Err(ValidationError::MissingField(_))
        ));
        assert!(matches!(
            validate_password(" \t "),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_validate_credentials_collects_all_fields() {
        let errors = validate_credentials("", "");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.message(Field::Email), Some(EMAIL_REQUIRED));
        assert_eq!(errors.message(Field::Password), Some(PASSWORD_REQUIRED));

        let errors = validate_credentials("bad@x", "secret");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors.get(Field::Email),
            Some(ValidationError::InvalidFormat(_))
        ));
        assert_eq!(errors.message(Field::Password), None);

        assert!(validate_credentials("user@example.com", "secret").is_empty());
    }

    #[test]
    fn test_field_errors_display() {
        let errors = validate_credentials("bad@x", "");
        assert_eq!(
            errors.to_string(),
            "email: Please enter a valid email address; password: Password is required"
        );
    }
}
