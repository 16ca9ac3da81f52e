//! Password login: verify credentials, store a new refresh token, mint an
//! access token for the caller's origin.

use chrono::Utc;
use tracing::{info, warn};

use super::SessionTokens;
use super::store::{IdentityStore, PasswordCheck, SessionStore, StoredSession};
use crate::audience::resolve_audience;
use crate::error::AuthError;
use crate::jwt::JwtConfig;
use crate::refresh_token::generate_refresh_token;

/// Login credentials as submitted by the client.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Authenticate a user and issue a fresh token pair.
///
/// Any refresh token the user held before is replaced.
pub async fn login(
    jwt: &JwtConfig,
    identity: &dyn IdentityStore,
    sessions: &dyn SessionStore,
    credentials: &Credentials,
    origin: Option<&str>,
) -> Result<SessionTokens, AuthError> {
    let email = credentials.email.trim();
    if email.is_empty() {
        return Err(AuthError::InputValidation("email"));
    }
    if credentials.password.trim().is_empty() {
        return Err(AuthError::InputValidation("password"));
    }

    let principal = identity
        .find_by_email(email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    match identity
        .check_password(&principal, &credentials.password)
        .await?
    {
        PasswordCheck::Succeeded => {}
        PasswordCheck::LockedOut => {
            warn!(user_id = %principal.id, "Login refused, account locked");
            return Err(AuthError::AccountLocked);
        }
        PasswordCheck::Failed => {
            info!(user_id = %principal.id, "Login failed, invalid password");
            return Err(AuthError::InvalidCredentials);
        }
    }

    let refresh = generate_refresh_token(jwt.config().refresh_token_lifetime_hours())?;
    sessions
        .set(
            &principal.id,
            &StoredSession {
                refresh_token: refresh.value.clone(),
                expires_at: refresh.expires_at,
            },
        )
        .await?;

    let audience = resolve_audience(origin, jwt.config().audiences())?;
    let access = jwt.issue_access_token(&principal, &audience)?;

    if refresh.value.is_empty() {
        return Err(AuthError::internal("generated refresh token is empty"));
    }
    if access.token.is_empty() {
        return Err(AuthError::internal("generated access token is empty"));
    }
    if access.expires_at <= Utc::now() {
        return Err(AuthError::internal("access token expiry is not in the future"));
    }

    info!(user_id = %principal.id, audience = %audience, "Login succeeded");

    Ok(SessionTokens {
        access_token: access.token,
        refresh_token: refresh.value,
        valid_to: access.expires_at,
    })
}
