//! User records, password verification and lockout bookkeeping.

use async_trait::async_trait;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::sqlite::SqlitePool;

use crate::auth::{IdentityStore, PasswordCheck, Principal, StoreError};

/// Consecutive failures that lock an account.
pub const MAX_FAILED_ATTEMPTS: i64 = 10;

/// How long a lockout lasts.
pub const LOCKOUT_MINUTES: i64 = 30;

const PASSWORD_HASH_COST: u32 = 10;

const CONFIRMATION_CODE_BYTES: usize = 32;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn roles_for(&self, user_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(role,)| role).collect())
    }

    async fn load_principal(&self, row: UserRow) -> Result<Principal, sqlx::Error> {
        let roles = self.roles_for(&row.id).await?;
        Ok(Principal {
            id: row.id,
            email: row.email,
            roles,
        })
    }

    /// Grant a role to a user. Granting an existing role is a no-op.
    pub async fn add_role(&self, user_id: &str, role: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lock a user out until the given Unix timestamp in milliseconds.
    pub async fn lock_until(&self, user_id: &str, until_ms: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET lockout_end = ?, failed_attempts = 0 WHERE id = ?")
            .bind(until_ms)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Current failed attempt counter (for tests and diagnostics).
    pub async fn failed_attempts(&self, user_id: &str) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT failed_attempts FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Stored email confirmation code, if one was issued.
    pub async fn confirmation_code(&self, user_id: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT confirmation_code FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|r| r.0))
    }

    async fn record_failure(&self, user_id: &str) -> Result<PasswordCheck, StoreError> {
        let (failed,): (i64,) = sqlx::query_as(
            "UPDATE users SET failed_attempts = failed_attempts + 1 WHERE id = ? RETURNING failed_attempts",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if failed >= MAX_FAILED_ATTEMPTS {
            let until = (Utc::now() + Duration::minutes(LOCKOUT_MINUTES)).timestamp_millis();
            self.lock_until(user_id, until).await?;
            tracing::warn!(user_id = %user_id, "Account locked after repeated failures");
            return Ok(PasswordCheck::LockedOut);
        }

        Ok(PasswordCheck::Failed)
    }
}

#[async_trait]
impl IdentityStore for UserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT id, email FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_principal(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT id, email FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_principal(row).await?)),
            None => Ok(None),
        }
    }

    async fn check_password(
        &self,
        principal: &Principal,
        password: &str,
    ) -> Result<PasswordCheck, StoreError> {
        let row: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT password_hash, lockout_end FROM users WHERE id = ?")
                .bind(&principal.id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((hash, lockout_end)) = row else {
            return Ok(PasswordCheck::Failed);
        };

        let now = Utc::now().timestamp_millis();
        if lockout_end.is_some_and(|end| end > now) {
            return Ok(PasswordCheck::LockedOut);
        }

        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;

        if !valid {
            return self.record_failure(&principal.id).await;
        }

        sqlx::query("UPDATE users SET failed_attempts = 0, lockout_end = NULL WHERE id = ?")
            .bind(&principal.id)
            .execute(&self.pool)
            .await?;

        Ok(PasswordCheck::Succeeded)
    }

    async fn create(&self, principal: &Principal, password: &str) -> Result<(), StoreError> {
        let password = password.to_string();
        let hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_HASH_COST))
                .await??;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)")
            .bind(&principal.id)
            .bind(principal.email.trim())
            .bind(&hash)
            .execute(&mut *tx)
            .await?;
        for role in &principal.roles {
            sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
                .bind(&principal.id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn generate_confirmation_code(
        &self,
        principal: &Principal,
    ) -> Result<String, StoreError> {
        let mut bytes = [0u8; CONFIRMATION_CODE_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let code = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);

        let result = sqlx::query("UPDATE users SET confirmation_code = ? WHERE id = ?")
            .bind(&code)
            .bind(&principal.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!(
                "no user row for {}",
                principal.id
            )));
        }

        Ok(code)
    }
}
