//! Per-user refresh token storage.
//!
//! Each user holds at most one refresh token. Writing a new one replaces the
//! old one (last writer wins).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::auth::{SessionStore, StoreError, StoredSession};

pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete all expired refresh tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for RefreshTokenStore {
    async fn get(&self, user_id: &str) -> Result<Option<StoredSession>, StoreError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT refresh_token, expires_at FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(refresh_token, expires_at)| {
            let expires_at = DateTime::from_timestamp_millis(expires_at).ok_or_else(|| {
                StoreError::Corrupt(format!("session expiry out of range: {}", expires_at))
            })?;
            Ok(StoredSession {
                refresh_token,
                expires_at,
            })
        })
        .transpose()
    }

    async fn set(&self, user_id: &str, session: &StoredSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions (user_id, refresh_token, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET refresh_token = excluded.refresh_token, expires_at = excluded.expires_at",
        )
        .bind(user_id)
        .bind(&session.refresh_token)
        .bind(session.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
