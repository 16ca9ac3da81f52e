//! CLI argument parsing, validation, and startup helpers.

use std::net::IpAddr;

use clap::Parser;
use tracing::{error, info};

use crate::ServerConfig;
use crate::config::{AudienceConfiguration, Settings};
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Header to read the client IP from when running behind a reverse proxy.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpExtractor {
    /// Last entry of `X-Forwarded-For` (the address the proxy saw)
    XForwardedFor,
    /// `X-Real-IP`
    XRealIp,
}

impl IpExtractor {
    pub fn header_name(&self) -> &'static str {
        match self {
            IpExtractor::XForwardedFor => "x-forwarded-for",
            IpExtractor::XRealIp => "x-real-ip",
        }
    }

    /// Parse the header value into a normalized IP string.
    pub fn extract(&self, value: &str) -> Result<String, &'static str> {
        let candidate = match self {
            IpExtractor::XForwardedFor => value.rsplit(',').next().unwrap_or_default(),
            IpExtractor::XRealIp => value,
        };
        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "session-issuer",
    about = "Issues origin-bound access tokens and refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291", env = "SESSION_ISSUER_PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "sessions.db", env = "SESSION_ISSUER_DATABASE")]
    pub database: String,

    /// Path to the JSON settings file containing the `Jwt` section
    #[arg(short, long, default_value = "appsettings.json", env = "SESSION_ISSUER_SETTINGS")]
    pub settings: String,

    /// Read the client IP from this proxy header instead of the socket address
    #[arg(long)]
    pub ip_extractor: Option<IpExtractor>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Take the JWT secret from the environment, if set.
///
/// The variable is removed so the secret does not leak to child processes.
pub fn load_jwt_secret() -> Option<String> {
    let secret = std::env::var("JWT_SECRET").ok()?;
    // SAFETY: called during single-threaded startup, before the runtime
    // spawns any task that could read the environment.
    unsafe { std::env::remove_var("JWT_SECRET") };
    Some(secret)
}

/// Load and validate the token configuration.
/// Returns None and logs an error if anything is missing or invalid.
pub fn load_configuration(
    settings_path: &str,
    secret_override: Option<String>,
) -> Option<AudienceConfiguration> {
    let settings = match Settings::from_file(settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            return None;
        }
    };

    let config = match AudienceConfiguration::from_settings(&settings.jwt, secret_override) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid token configuration");
            return None;
        }
    };

    if config.secret().len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    info!(
        issuer = %config.issuer(),
        audiences = config.audiences().len(),
        access_token_lifetime_secs = config.access_token_lifetime_secs(),
        refresh_token_lifetime_hours = config.refresh_token_lifetime_hours(),
        "Token configuration loaded"
    );

    Some(config)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    tokens: AudienceConfiguration,
    ip_extractor: Option<IpExtractor>,
) -> ServerConfig {
    ServerConfig {
        db,
        tokens,
        ip_extractor,
        rate_limit: RateLimitConfig::new(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
