//! Client-side token persistence.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::jwt::JwtConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token storage unavailable: {0}")]
    Unavailable(String),
}

/// Where a client keeps its current token pair.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn save_tokens(&self, access_token: &str, refresh_token: &str)
    -> Result<(), StorageError>;

    async fn clear_tokens(&self) -> Result<(), StorageError>;

    /// Local sanity check on a freshly received access token.
    fn is_valid(&self, access_token: &str) -> bool;
}

/// Stored token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// In-process token storage.
///
/// Without a validator, an access token counts as valid when it has a
/// parseable HS256 JWT header. With one, it must pass full validation for
/// the given origin.
#[derive(Default)]
pub struct MemoryTokenStorage {
    tokens: Mutex<Option<StoredTokens>>,
    validator: Option<(Arc<JwtConfig>, String)>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(jwt: Arc<JwtConfig>, origin: impl Into<String>) -> Self {
        Self {
            tokens: Mutex::new(None),
            validator: Some((jwt, origin.into())),
        }
    }

    /// Current token pair, if any.
    pub fn tokens(&self) -> Option<StoredTokens> {
        self.tokens.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn save_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        *guard = Some(StoredTokens {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
        });
        Ok(())
    }

    async fn clear_tokens(&self) -> Result<(), StorageError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        *guard = None;
        Ok(())
    }

    fn is_valid(&self, access_token: &str) -> bool {
        match &self.validator {
            Some((jwt, origin)) => jwt
                .validate_access_token(access_token, Some(origin.as_str()))
                .is_ok(),
            None => jsonwebtoken::decode_header(access_token)
                .is_ok_and(|header| header.alg == Algorithm::HS256),
        }
    }
}
