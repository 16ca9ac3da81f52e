//! Access token refresh.
//!
//! The presented access token may be expired but must be authentic. The
//! presented refresh token must equal the one stored for the token's subject
//! and that stored token must not have expired. The refresh token is returned
//! unchanged (no rotation).

use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::SessionTokens;
use super::store::{IdentityStore, SessionStore};
use crate::audience::resolve_audience;
use crate::error::AuthError;
use crate::jwt::JwtConfig;

/// Token pair presented for refresh.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchange an expired access token and a valid refresh token for a new
/// access token.
pub async fn refresh(
    jwt: &JwtConfig,
    identity: &dyn IdentityStore,
    sessions: &dyn SessionStore,
    request: &RefreshRequest,
    origin: Option<&str>,
) -> Result<SessionTokens, AuthError> {
    if request.access_token.trim().is_empty() {
        return Err(AuthError::InputValidation("accessToken"));
    }
    if request.refresh_token.trim().is_empty() {
        return Err(AuthError::InputValidation("refreshToken"));
    }

    let claimed = jwt.validate_expired_token(&request.access_token, origin)?;

    let principal = identity
        .find_by_id(&claimed.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let stored = sessions.get(&principal.id).await?;
    let valid = stored.as_ref().is_some_and(|session| {
        let matches: bool = session
            .refresh_token
            .as_bytes()
            .ct_eq(request.refresh_token.as_bytes())
            .into();
        matches && session.expires_at > Utc::now()
    });
    if !valid {
        warn!(user_id = %principal.id, "Refresh token expired or mismatched");
        return Err(AuthError::RefreshTokenExpiredOrMismatched);
    }

    let audience = resolve_audience(origin, jwt.config().audiences())?;
    let access = jwt.issue_access_token(&principal, &audience)?;

    debug!(user_id = %principal.id, "Access token refreshed");

    Ok(SessionTokens {
        access_token: access.token,
        refresh_token: request.refresh_token.clone(),
        valid_to: access.expires_at,
    })
}
