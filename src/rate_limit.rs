//! Rate limiting for account endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;
use crate::cli::IpExtractor;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: u32 = 1;
const LOGIN_BURST: u32 = 5;
const REGISTER_PER_MIN: u32 = 3;

fn non_zero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// Rate limiting configuration for account endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (5 requests burst, then 1 per second)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for registration (3 requests per minute)
    pub register: Arc<IpLimiter>,
    /// Where to read the client IP from
    pub ip_extractor: Option<IpExtractor>,
}

impl RateLimitConfig {
    /// Create rate limiters with the default production limits.
    pub fn new() -> Self {
        Self::with_limits(LOGIN_PER_SEC, LOGIN_BURST, REGISTER_PER_MIN)
    }

    /// Create rate limiters with custom limits.
    pub fn with_limits(login_per_sec: u32, login_burst: u32, register_per_min: u32) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(non_zero(login_per_sec)).allow_burst(non_zero(login_burst)),
            )),
            register: Arc::new(RateLimiter::keyed(Quota::per_minute(non_zero(
                register_per_min,
            )))),
            ip_extractor: None,
        }
    }

    /// Limits high enough to never trigger in tests.
    pub fn permissive() -> Self {
        Self::with_limits(1000, 1000, 1000)
    }

    pub fn with_ip_extractor(mut self, ip_extractor: Option<IpExtractor>) -> Self {
        self.ip_extractor = ip_extractor;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check(config: &RateLimitConfig, limiter: &IpLimiter, request: &Request) -> Result<(), Response> {
    let ip = match extract_client_ip(request, config.ip_extractor.as_ref()) {
        Ok(ip) => ip,
        Err(reason) => {
            tracing::warn!(reason, "Rejecting request without client IP");
            return Err((StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response());
        }
    };

    limiter.check_key(&ip).map_err(|_| {
        tracing::info!(ip = %ip, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response()
    })
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config, &config.login, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(&config, &config.register, &request) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
