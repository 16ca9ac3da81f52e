//! Access token issuance and validation.
//!
//! Access tokens are HS256 JWTs bound to the configured issuer and to an
//! audience chosen from the caller's origin. They are never stored. Refresh
//! relies on `validate_expired_token`, which performs the full cryptographic
//! and claim checks except for the expiry time.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::audience::resolve_audience;
use crate::auth::Principal;
use crate::config::AudienceConfiguration;
use crate::error::AuthError;

/// JWT claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal id)
    pub sub: String,
    /// Display name (principal email)
    pub name: String,
    /// Unique token id
    pub jti: String,
    /// One entry per role the principal holds
    #[serde(rename = "role", default)]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Result of issuing an access token.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity recovered from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: String,
    pub name: String,
    pub roles: Vec<String>,
}

/// Signing keys plus the configuration they were derived from.
#[derive(Clone)]
pub struct JwtConfig {
    config: AudienceConfiguration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    pub fn new(config: AudienceConfiguration) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret());
        let decoding_key = DecodingKey::from_secret(config.secret());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn config(&self) -> &AudienceConfiguration {
        &self.config
    }

    /// Build and sign an access token for `principal`, bound to `audience`.
    pub fn issue_access_token(
        &self,
        principal: &Principal,
        audience: &str,
    ) -> Result<IssuedAccessToken, AuthError> {
        if principal.id.trim().is_empty() {
            return Err(AuthError::PrincipalIncomplete("id"));
        }
        if principal.email.trim().is_empty() {
            return Err(AuthError::PrincipalIncomplete("email"));
        }

        let now = Utc::now().timestamp();
        let exp = now
            .checked_add(self.config.access_token_lifetime_secs())
            .ok_or_else(|| AuthError::internal("token expiry out of range"))?;
        let jti = uuid::Uuid::new_v4().to_string();

        let claims = AccessClaims {
            sub: principal.id.clone(),
            name: principal.email.clone(),
            jti: jti.clone(),
            roles: principal.roles.clone(),
            iss: self.config.issuer().to_string(),
            aud: audience.to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("failed to encode token: {}", e)))?;

        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::internal("token expiry out of range"))?;

        Ok(IssuedAccessToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Validate a possibly expired access token presented for refresh.
    ///
    /// Signature, issuer and audience are checked; the expiry claim must be
    /// present but its value is ignored.
    pub fn validate_expired_token(
        &self,
        token: &str,
        origin: Option<&str>,
    ) -> Result<TokenIdentity, AuthError> {
        let audience = resolve_audience(origin, self.config.audiences())?;
        let claims = self.decode(token, &audience, false)?;

        if claims.sub.trim().is_empty() || claims.name.trim().is_empty() {
            return Err(AuthError::TokenMalformed);
        }

        Ok(TokenIdentity {
            user_id: claims.sub,
            name: claims.name,
            roles: claims.roles,
        })
    }

    /// Validate an access token including its expiry, with no leeway.
    pub fn validate_access_token(
        &self,
        token: &str,
        origin: Option<&str>,
    ) -> Result<AccessClaims, AuthError> {
        let audience = resolve_audience(origin, self.config.audiences())?;
        self.decode(token, &audience, true)
    }

    fn decode(
        &self,
        token: &str,
        audience: &str,
        validate_exp: bool,
    ) -> Result<AccessClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::SignatureInvalid,
        ErrorKind::InvalidIssuer => AuthError::ClaimRejected("iss"),
        ErrorKind::InvalidAudience => AuthError::ClaimRejected("aud"),
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenMalformed,
    }
}
