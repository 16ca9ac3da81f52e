//! Session issuance: password login, access token refresh and registration.
//!
//! Access tokens are short-lived, stateless and bound to the caller's origin.
//! Refresh tokens are opaque random strings, one per user, tracked in the
//! session store. Refresh accepts an expired access token together with the
//! matching refresh token and returns a new access token.

mod extractors;
mod ip;
mod login;
mod refresh;
mod register;
mod revoke;
mod store;

use chrono::{DateTime, Utc};

pub use extractors::{BearerToken, RequestOrigin};
pub use ip::extract_client_ip;
pub use login::{Credentials, login};
pub use refresh::{RefreshRequest, refresh};
pub use register::{Registration, check_password_policy, register};
pub use revoke::revoke;
pub use store::{IdentityStore, PasswordCheck, Principal, SessionStore, StoreError, StoredSession};

/// Token pair handed back by login and refresh.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry
    pub valid_to: DateTime<Utc>,
}
