mod account;
mod error;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use account::AccountState;
pub use error::{ApiError, Endpoint};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    rate_limit: Arc<RateLimitConfig>,
) -> Router {
    let account_state = account::AccountState {
        db,
        jwt,
        rate_limit,
    };

    Router::new().nest("/account", account::router(account_state))
}
