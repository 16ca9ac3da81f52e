//! Shared error handling for API endpoints.
//!
//! Every endpoint converts `AuthError` here, so the status and body for a
//! given failure are decided in one place. Error details go to the log;
//! callers only ever see a stable code and a fixed message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{AuthError, ErrorKind};

/// The endpoint an error occurred on. The same failure can map to different
/// statuses on different endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Refresh,
    Register,
    Revoke,
}

impl Endpoint {
    fn name(self) -> &'static str {
        match self {
            Endpoint::Login => "login",
            Endpoint::Refresh => "refresh",
            Endpoint::Register => "register",
            Endpoint::Revoke => "revoke",
        }
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
}

impl ApiError {
    /// Map a domain error raised while serving `endpoint`, logging its details.
    pub fn from_auth(endpoint: Endpoint, err: AuthError) -> Self {
        let status = status_for(endpoint, &err);

        if status.is_server_error() {
            error!(endpoint = endpoint.name(), code = err.code(), error = %err, "Request failed");
        } else if err.kind() == ErrorKind::AuthFailure {
            warn!(endpoint = endpoint.name(), code = err.code(), error = %err, "Request rejected");
        } else {
            info!(endpoint = endpoint.name(), code = err.code(), error = %err, "Request rejected");
        }

        Self {
            status,
            code: err.code(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(endpoint: Endpoint, err: &AuthError) -> StatusCode {
    let kind = err.kind();
    match endpoint {
        Endpoint::Login => match (kind, err) {
            (ErrorKind::InputValidation, _) => StatusCode::BAD_REQUEST,
            (_, AuthError::AccountLocked) => StatusCode::LOCKED,
            (_, AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            (ErrorKind::NotFound, _) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        Endpoint::Refresh => match kind {
            ErrorKind::InputValidation | ErrorKind::NotFound => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        Endpoint::Register => StatusCode::INTERNAL_SERVER_ERROR,
        Endpoint::Revoke => match kind {
            ErrorKind::Internal | ErrorKind::ConfigurationMissing => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        },
    }
}

fn message_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "The request could not be processed.",
        StatusCode::UNAUTHORIZED => "Authentication failed.",
        StatusCode::NOT_FOUND => "No matching account.",
        StatusCode::LOCKED => "The account is temporarily locked.",
        _ => "Something went wrong.",
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.code,
                message: message_for(self.status),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(endpoint: Endpoint, err: AuthError) -> StatusCode {
        ApiError::from_auth(endpoint, err).status()
    }

    #[test]
    fn test_login_statuses() {
        assert_eq!(
            status(Endpoint::Login, AuthError::InputValidation("email")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(Endpoint::Login, AuthError::OriginMissing),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(Endpoint::Login, AuthError::AudienceNotAllowed),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(Endpoint::Login, AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(Endpoint::Login, AuthError::UserNotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(Endpoint::Login, AuthError::AccountLocked),
            StatusCode::LOCKED
        );
        assert_eq!(
            status(Endpoint::Login, AuthError::internal("db down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_refresh_statuses() {
        assert_eq!(
            status(Endpoint::Refresh, AuthError::InputValidation("accessToken")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(Endpoint::Refresh, AuthError::UserNotFound),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(Endpoint::Refresh, AuthError::OriginMissing),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(Endpoint::Refresh, AuthError::SignatureInvalid),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(Endpoint::Refresh, AuthError::RefreshTokenExpiredOrMismatched),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_register_failures_are_internal() {
        for err in [
            AuthError::UserExists,
            AuthError::PasswordPolicy("too short"),
            AuthError::InputValidation("email"),
        ] {
            assert_eq!(
                status(Endpoint::Register, err),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn test_revoke_statuses() {
        assert_eq!(
            status(Endpoint::Revoke, AuthError::TokenExpired),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(Endpoint::Revoke, AuthError::OriginMissing),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(Endpoint::Revoke, AuthError::internal("db down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
