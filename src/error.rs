//! Error taxonomy shared by the token core and the orchestrators.

use thiserror::Error;

/// Coarse failure category used by the HTTP boundary and by callers that only
/// need to know what class of problem occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    AuthFailure,
    NotFound,
    TokenInvalid,
    SessionMismatch,
    ConfigurationMissing,
    Internal,
}

/// Errors produced by login, refresh, registration and the token primitives.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} is required")]
    InputValidation(&'static str),
    #[error("password does not meet policy: {0}")]
    PasswordPolicy(&'static str),
    #[error("origin header is missing or blank")]
    OriginMissing,
    #[error("origin is not an allowed audience")]
    AudienceNotAllowed,
    #[error("configuration value {0} is missing")]
    ConfigurationMissing(&'static str),
    #[error("principal has no resolvable {0}")]
    PrincipalIncomplete(&'static str),
    #[error("user not found")]
    UserNotFound,
    #[error("user already exists")]
    UserExists,
    #[error("account is locked out")]
    AccountLocked,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token is malformed")]
    TokenMalformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token claim rejected: {0}")]
    ClaimRejected(&'static str),
    #[error("token has expired")]
    TokenExpired,
    #[error("refresh token expired or does not match")]
    RefreshTokenExpiredOrMismatched,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InputValidation(_)
            | AuthError::PasswordPolicy(_)
            | AuthError::OriginMissing
            | AuthError::AudienceNotAllowed => ErrorKind::InputValidation,
            AuthError::AccountLocked | AuthError::InvalidCredentials | AuthError::UserExists => {
                ErrorKind::AuthFailure
            }
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::TokenMalformed
            | AuthError::SignatureInvalid
            | AuthError::ClaimRejected(_)
            | AuthError::TokenExpired => ErrorKind::TokenInvalid,
            AuthError::RefreshTokenExpiredOrMismatched => ErrorKind::SessionMismatch,
            AuthError::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
            AuthError::PrincipalIncomplete(_) | AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code sent to clients instead of the message text.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InputValidation(_) => "input_validation",
            AuthError::PasswordPolicy(_) => "password_policy",
            AuthError::OriginMissing => "origin_missing",
            AuthError::AudienceNotAllowed => "audience_not_allowed",
            AuthError::ConfigurationMissing(_) => "configuration_missing",
            AuthError::PrincipalIncomplete(_) => "principal_incomplete",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserExists => "user_exists",
            AuthError::AccountLocked => "account_locked",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::ClaimRejected(_) => "claim_rejected",
            AuthError::TokenExpired => "token_expired",
            AuthError::RefreshTokenExpiredOrMismatched => "session_mismatch",
            AuthError::Internal(_) => "internal",
        }
    }
}
