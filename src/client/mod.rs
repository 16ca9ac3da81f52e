//! Client side of the refresh protocol.
//!
//! `ClientRefreshAgent` calls `POST /api/account/refresh`, persists the
//! returned tokens and, on any failure, clears local tokens and runs the
//! configured logout handler before reporting what went wrong.

mod logout;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

pub use logout::{LogoutHandler, RevokeLogout};
pub use storage::{MemoryTokenStorage, StorageError, StoredTokens, TokenStorage};

/// Default timeout for refresh requests in seconds.
const REFRESH_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Why a refresh attempt failed.
#[derive(Debug, Error)]
pub enum RefreshFailure {
    #[error("no access token to refresh")]
    MissingAccessToken,
    #[error("no refresh token to refresh with")]
    MissingRefreshToken,
    #[error("refresh request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("refresh rejected with status {0}")]
    Rejected(StatusCode),
    #[error("refresh response has no body")]
    EmptyBody,
    #[error("refresh response body is invalid: {0}")]
    InvalidBody(String),
    #[error("refresh response has no access token")]
    AccessTokenMissing,
    #[error("refresh response has no refresh token")]
    RefreshTokenMissing,
    #[error("refreshed access token is not valid")]
    AccessTokenInvalid,
    #[error("failed to store refreshed tokens: {0}")]
    StorageFailed(#[source] StorageError),
}

/// Tokens obtained by a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub valid_to: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshReply {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    valid_to: Option<DateTime<Utc>>,
}

/// Keeps a client session alive by exchanging expired access tokens.
pub struct ClientRefreshAgent {
    http: Client,
    refresh_url: Url,
    origin: String,
    storage: Arc<dyn TokenStorage>,
    logout: Arc<dyn LogoutHandler>,
}

impl ClientRefreshAgent {
    /// Create an agent talking to the server at `base_url`.
    ///
    /// `origin` is sent as the `Origin` header and must be one of the
    /// server's allowed audiences.
    pub fn new(
        http: Client,
        base_url: &Url,
        origin: impl Into<String>,
        storage: Arc<dyn TokenStorage>,
        logout: Arc<dyn LogoutHandler>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            refresh_url: base_url.join("api/account/refresh")?,
            origin: origin.into(),
            storage,
            logout,
        })
    }

    /// HTTP client with the timeouts the agent expects.
    pub fn default_http_client() -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(Duration::from_secs(REFRESH_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
    }

    /// Refresh the session. On failure, stored tokens are cleared and the
    /// logout handler has run by the time this returns.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<RefreshedSession, RefreshFailure> {
        match self.try_refresh(access_token, refresh_token).await {
            Ok(session) => {
                debug!(valid_to = %session.valid_to, "Session refreshed");
                Ok(session)
            }
            Err(failure) => {
                warn!(error = %failure, "Refresh failed, logging out");
                if let Err(e) = self.storage.clear_tokens().await {
                    warn!(error = %e, "Failed to clear stored tokens");
                }
                let held = Some(access_token).filter(|t| !t.trim().is_empty());
                self.logout.logout(held).await;
                Err(failure)
            }
        }
    }

    async fn try_refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<RefreshedSession, RefreshFailure> {
        if access_token.trim().is_empty() {
            return Err(RefreshFailure::MissingAccessToken);
        }
        if refresh_token.trim().is_empty() {
            return Err(RefreshFailure::MissingRefreshToken);
        }

        let response = self
            .http
            .post(self.refresh_url.clone())
            .header(reqwest::header::ORIGIN, &self.origin)
            .json(&RefreshPayload {
                access_token,
                refresh_token,
            })
            .send()
            .await
            .map_err(RefreshFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure::Rejected(status));
        }

        let body = response.bytes().await.map_err(RefreshFailure::Transport)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RefreshFailure::EmptyBody);
        }
        let reply: RefreshReply = serde_json::from_slice(&body)
            .map_err(|e| RefreshFailure::InvalidBody(e.to_string()))?;

        let access_token = reply
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(RefreshFailure::AccessTokenMissing)?;
        let refresh_token = reply
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(RefreshFailure::RefreshTokenMissing)?;

        let valid_to = reply
            .valid_to
            .ok_or_else(|| RefreshFailure::InvalidBody("missing validTo".to_string()))?;

        if !self.storage.is_valid(&access_token) {
            return Err(RefreshFailure::AccessTokenInvalid);
        }

        self.storage
            .save_tokens(&access_token, &refresh_token)
            .await
            .map_err(RefreshFailure::StorageFailed)?;

        Ok(RefreshedSession {
            access_token,
            refresh_token,
            valid_to,
        })
    }
}
