//! Narrow interfaces to the identity and session collaborators.
//!
//! The login and refresh flows only talk to these traits. `crate::db` provides
//! the SQLite-backed implementations used by the server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Identity of an authenticated subject, owned by the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique id (UUID string)
    pub id: String,
    /// Email address, also used as the display name
    pub email: String,
    /// Role names granted to the principal
    pub roles: Vec<String>,
}

impl Principal {
    /// Build the principal for a newly registered account.
    pub fn new_registered(email: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            roles: Vec::new(),
        }
    }
}

/// Outcome of a password check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Succeeded,
    Failed,
    LockedOut,
}

/// The refresh token currently held for a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Failure inside a collaborator. Always surfaces as an internal error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for crate::error::AuthError {
    fn from(e: StoreError) -> Self {
        crate::error::AuthError::internal(e.to_string())
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, StoreError>;

    /// Verify a password, updating failed-attempt and lockout bookkeeping.
    async fn check_password(
        &self,
        principal: &Principal,
        password: &str,
    ) -> Result<PasswordCheck, StoreError>;

    /// Persist a new principal with the given password.
    async fn create(&self, principal: &Principal, password: &str) -> Result<(), StoreError>;

    /// Issue and store an email confirmation code for the principal.
    async fn generate_confirmation_code(&self, principal: &Principal)
    -> Result<String, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<StoredSession>, StoreError>;

    /// Replace whatever refresh token the principal currently holds.
    async fn set(&self, user_id: &str, session: &StoredSession) -> Result<(), StoreError>;

    /// Remove the principal's refresh token. Returns true if one existed.
    async fn clear(&self, user_id: &str) -> Result<bool, StoreError>;
}
