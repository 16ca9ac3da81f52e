//! Token configuration loaded once at startup.
//!
//! `JwtSettings` mirrors the raw `Jwt` section of the settings file, where every
//! key may be absent. `AudienceConfiguration` is the validated, immutable form
//! shared by every request.

use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Refresh token lifetime used when the setting is absent or unparsable.
pub const DEFAULT_REFRESH_TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration value {0} is missing")]
    Missing(&'static str),
    #[error("configuration value {key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Top-level settings document.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(rename = "Jwt", default)]
    pub jwt: JwtSettings,
}

/// Raw `Jwt` section. Lifetimes accept either JSON numbers or numeric strings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JwtSettings {
    pub valid_issuer: Option<String>,
    pub valid_audiences: Option<Vec<String>>,
    pub security_key: Option<String>,
    pub access_token_expiry_in_seconds: Option<Value>,
    pub refresh_token_expiry_in_hours: Option<Value>,
}

impl Settings {
    /// Read and parse a JSON settings file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the refresh token lifetime, falling back to 24 hours.
pub fn refresh_token_hours(raw: Option<&Value>) -> i64 {
    raw.and_then(numeric)
        .filter(|hours| *hours > 0)
        .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRY_HOURS)
}

/// True when a token issued now with this lifetime has a representable expiry.
fn expiry_representable(lifetime: Option<TimeDelta>) -> bool {
    lifetime.is_some_and(|lifetime| Utc::now().checked_add_signed(lifetime).is_some())
}

/// Validated token configuration. Immutable after construction.
#[derive(Debug, Clone)]
pub struct AudienceConfiguration {
    issuer: String,
    audiences: Vec<String>,
    secret: Vec<u8>,
    access_token_lifetime_secs: i64,
    refresh_token_lifetime_hours: i64,
}

impl AudienceConfiguration {
    pub fn new(
        issuer: impl Into<String>,
        audiences: Vec<String>,
        secret: impl Into<Vec<u8>>,
        access_token_lifetime_secs: i64,
        refresh_token_lifetime_hours: i64,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer.into();
        let secret = secret.into();

        if issuer.trim().is_empty() {
            return Err(ConfigError::Missing("Jwt:ValidIssuer"));
        }
        let audiences: Vec<String> = audiences
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if audiences.is_empty() {
            return Err(ConfigError::Missing("Jwt:ValidAudiences"));
        }
        if secret.is_empty() {
            return Err(ConfigError::Missing("Jwt:SecurityKey"));
        }
        if access_token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "Jwt:AccessTokenExpiryInSeconds",
                reason: "must be a positive number of seconds".into(),
            });
        }
        if !expiry_representable(TimeDelta::try_seconds(access_token_lifetime_secs)) {
            return Err(ConfigError::Invalid {
                key: "Jwt:AccessTokenExpiryInSeconds",
                reason: format!("{} seconds is out of range", access_token_lifetime_secs),
            });
        }

        let refresh_token_lifetime_hours = if refresh_token_lifetime_hours > 0 {
            refresh_token_lifetime_hours
        } else {
            DEFAULT_REFRESH_TOKEN_EXPIRY_HOURS
        };
        if !expiry_representable(TimeDelta::try_hours(refresh_token_lifetime_hours)) {
            return Err(ConfigError::Invalid {
                key: "Jwt:RefreshTokenExpiryInHours",
                reason: format!("{} hours is out of range", refresh_token_lifetime_hours),
            });
        }

        Ok(Self {
            issuer,
            audiences,
            secret,
            access_token_lifetime_secs,
            refresh_token_lifetime_hours,
        })
    }

    /// Validate raw settings. `secret_override` replaces `Jwt:SecurityKey` when set.
    pub fn from_settings(
        settings: &JwtSettings,
        secret_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let issuer = settings
            .valid_issuer
            .clone()
            .ok_or(ConfigError::Missing("Jwt:ValidIssuer"))?;
        let audiences = settings
            .valid_audiences
            .clone()
            .ok_or(ConfigError::Missing("Jwt:ValidAudiences"))?;
        let secret = secret_override
            .or_else(|| settings.security_key.clone())
            .ok_or(ConfigError::Missing("Jwt:SecurityKey"))?;
        let raw_lifetime = settings
            .access_token_expiry_in_seconds
            .as_ref()
            .ok_or(ConfigError::Missing("Jwt:AccessTokenExpiryInSeconds"))?;
        let lifetime = numeric(raw_lifetime).ok_or_else(|| ConfigError::Invalid {
            key: "Jwt:AccessTokenExpiryInSeconds",
            reason: format!("not a number: {}", raw_lifetime),
        })?;

        Self::new(
            issuer,
            audiences,
            secret.into_bytes(),
            lifetime,
            refresh_token_hours(settings.refresh_token_expiry_in_hours.as_ref()),
        )
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn access_token_lifetime_secs(&self) -> i64 {
        self.access_token_lifetime_secs
    }

    pub fn refresh_token_lifetime_hours(&self) -> i64 {
        self.refresh_token_lifetime_hours
    }
}
