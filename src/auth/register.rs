//! Account registration.

use tracing::info;

use super::store::{IdentityStore, Principal};
use crate::error::AuthError;

const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_UNIQUE_CHARS: usize = 4;

/// A newly created account and its email confirmation code.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: String,
    pub code: String,
}

/// Check a candidate password against the password policy.
pub fn check_password_policy(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordPolicy("too short"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::PasswordPolicy("requires a digit"));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AuthError::PasswordPolicy("requires an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AuthError::PasswordPolicy("requires a lowercase letter"));
    }
    if password.chars().all(|c| c.is_alphanumeric()) {
        return Err(AuthError::PasswordPolicy("requires a non-alphanumeric character"));
    }

    let mut unique: Vec<char> = password.chars().collect();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() < MIN_UNIQUE_CHARS {
        return Err(AuthError::PasswordPolicy("too few unique characters"));
    }

    Ok(())
}

/// Create an account and issue its confirmation code.
pub async fn register(
    identity: &dyn IdentityStore,
    email: &str,
    password: &str,
) -> Result<Registration, AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::InputValidation("email"));
    }
    if password.is_empty() {
        return Err(AuthError::InputValidation("password"));
    }
    check_password_policy(password)?;

    if identity.find_by_email(email).await?.is_some() {
        return Err(AuthError::UserExists);
    }

    let principal = Principal::new_registered(email);
    identity.create(&principal, password).await?;
    let code = identity.generate_confirmation_code(&principal).await?;

    info!(user_id = %principal.id, "User registered");

    Ok(Registration {
        user_id: principal.id,
        code,
    })
}
