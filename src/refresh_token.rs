//! Opaque refresh token generation.

use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;

use crate::error::AuthError;

/// Number of random bytes in a refresh token before encoding.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// A freshly generated refresh token and its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    /// Standard base64 of 64 random bytes
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a refresh token valid for `lifetime_hours` from now.
/// The caller is responsible for persisting it.
pub fn generate_refresh_token(lifetime_hours: i64) -> Result<RefreshToken, AuthError> {
    let expires_at = TimeDelta::try_hours(lifetime_hours)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::internal("refresh token expiry out of range"))?;

    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);

    Ok(RefreshToken {
        value: base64::engine::general_purpose::STANDARD.encode(bytes),
        expires_at,
    })
}
