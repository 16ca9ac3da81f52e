//! Audience selection from the caller's `Origin` header.
//!
//! The audience claim is chosen per request so that one signing key can serve
//! several trusted front ends.

use crate::error::AuthError;

/// Select the audience for a request.
///
/// Returns the origin when it is listed in `allowed`. Absent or blank origins
/// fail with `OriginMissing`, anything not in the list with `AudienceNotAllowed`.
pub fn resolve_audience(origin: Option<&str>, allowed: &[String]) -> Result<String, AuthError> {
    let origin = origin
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .ok_or(AuthError::OriginMissing)?;

    if allowed.iter().any(|a| a == origin) {
        Ok(origin.to_string())
    } else {
        Err(AuthError::AudienceNotAllowed)
    }
}
