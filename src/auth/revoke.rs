//! Sign-out: drop the refresh token held by the bearer of an access token.

use tracing::info;

use super::store::SessionStore;
use crate::error::AuthError;
use crate::jwt::JwtConfig;

/// Clear the caller's stored refresh token. Returns true if one existed.
///
/// Signature, issuer and audience are checked. Expiry is not, since a client
/// usually signs out after its access token has lapsed.
pub async fn revoke(
    jwt: &JwtConfig,
    sessions: &dyn SessionStore,
    access_token: &str,
    origin: Option<&str>,
) -> Result<bool, AuthError> {
    let identity = jwt.validate_expired_token(access_token, origin)?;
    let cleared = sessions.clear(&identity.user_id).await?;
    info!(user_id = %identity.user_id, cleared, "Refresh token revoked");
    Ok(cleared)
}
