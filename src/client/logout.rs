//! What a client does when its session cannot be kept alive.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Invoked after a failed refresh, once stored tokens have been cleared.
#[async_trait]
pub trait LogoutHandler: Send + Sync {
    /// `access_token` is the token the client held when the refresh failed.
    async fn logout(&self, access_token: Option<&str>);
}

/// Tells the server to drop the refresh token. Best effort: failures are
/// logged and otherwise ignored.
pub struct RevokeLogout {
    http: Client,
    revoke_url: Url,
    origin: String,
}

impl RevokeLogout {
    pub fn new(http: Client, base_url: &Url, origin: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            revoke_url: base_url.join("api/account/revoke")?,
            origin: origin.into(),
        })
    }
}

#[async_trait]
impl LogoutHandler for RevokeLogout {
    async fn logout(&self, access_token: Option<&str>) {
        let Some(token) = access_token.filter(|t| !t.trim().is_empty()) else {
            debug!("No access token to revoke");
            return;
        };

        match self
            .http
            .delete(self.revoke_url.clone())
            .bearer_auth(token)
            .header(reqwest::header::ORIGIN, &self.origin)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => debug!("Session revoked"),
            Ok(response) => warn!(status = %response.status(), "Revoke rejected"),
            Err(e) => warn!(error = %e, "Revoke request failed"),
        }
    }
}
