//! Account API endpoints.
//!
//! - POST `/login` - Exchange email and password for a token pair
//! - POST `/refresh` - Exchange an expired access token and refresh token for a new access token
//! - POST `/register` - Create an account and return its confirmation code
//! - DELETE `/revoke` - Drop the caller's refresh token

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, Endpoint};
use crate::auth::{self, BearerToken, Credentials, RefreshRequest, RequestOrigin, SessionTokens};
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct AccountState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub rate_limit: Arc<RateLimitConfig>,
}

pub fn router(state: AccountState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_register,
        ));

    let session_router = Router::new()
        .route("/refresh", post(refresh))
        .route("/revoke", delete(revoke))
        .with_state(state);

    Router::new()
        .merge(login_router)
        .merge(register_router)
        .merge(session_router)
}

#[derive(Deserialize)]
struct CredentialsRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    valid_to: DateTime<Utc>,
    status_code: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
    valid_to: DateTime<Utc>,
}

impl From<SessionTokens> for RefreshResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            valid_to: tokens.valid_to,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    code: String,
    user_id: String,
}

async fn login(
    State(state): State<AccountState>,
    origin: RequestOrigin,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };

    let tokens = auth::login(
        &state.jwt,
        &state.db.users(),
        &state.db.sessions(),
        &credentials,
        origin.as_deref(),
    )
    .await
    .map_err(|e| ApiError::from_auth(Endpoint::Login, e))?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        valid_to: tokens.valid_to,
        status_code: StatusCode::OK.as_u16(),
    }))
}

async fn refresh(
    State(state): State<AccountState>,
    origin: RequestOrigin,
    Json(payload): Json<RefreshBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = RefreshRequest {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token,
    };

    let tokens = auth::refresh(
        &state.jwt,
        &state.db.users(),
        &state.db.sessions(),
        &request,
        origin.as_deref(),
    )
    .await
    .map_err(|e| ApiError::from_auth(Endpoint::Refresh, e))?;

    Ok(Json(RefreshResponse::from(tokens)))
}

async fn register(
    State(state): State<AccountState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = auth::register(&state.db.users(), &payload.email, &payload.password)
        .await
        .map_err(|e| ApiError::from_auth(Endpoint::Register, e))?;

    Ok(Json(RegisterResponse {
        code: registration.code,
        user_id: registration.user_id,
    }))
}

async fn revoke(
    State(state): State<AccountState>,
    origin: RequestOrigin,
    bearer: Result<BearerToken, StatusCode>,
) -> Result<impl IntoResponse, ApiError> {
    let BearerToken(token) = bearer.map_err(|_| ApiError::unauthorized())?;

    auth::revoke(&state.jwt, &state.db.sessions(), &token, origin.as_deref())
        .await
        .map_err(|e| ApiError::from_auth(Endpoint::Revoke, e))?;

    Ok(StatusCode::NO_CONTENT)
}
