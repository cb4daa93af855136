//! Session token generation
//!
//! Tokens look like `{prefix}_{random}` where the random part is 96 bits
//! from the OS RNG, base64 URL-safe encoded without padding.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

use crate::error::AuthorityError;

pub const TOKEN_PREFIX: &str = "tok";

const TOKEN_BYTES: usize = 12;

pub fn generate_prefixed_id(prefix: &str) -> Result<String, AuthorityError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        tracing::error!(error = %e, "OS random number generator failed");
        AuthorityError::Internal("Failed to generate token".to_string())
    })?;

    Ok(format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes)))
}

/// Whether `id` has the expected prefix and a full-length random part.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    BASE64_URL_SAFE_NO_PAD
        .decode(random)
        .is_ok_and(|decoded| decoded.len() >= TOKEN_BYTES)
}
