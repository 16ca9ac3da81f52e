#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use session_issuer::auth::{IdentityStore, Principal};
use session_issuer::config::AudienceConfiguration;
use session_issuer::db::Database;
use session_issuer::jwt::{AccessClaims, JwtConfig};
use session_issuer::rate_limit::RateLimitConfig;
use session_issuer::{ServerConfig, create_app};
use tower::ServiceExt;

pub const APP_ORIGIN: &str = "https://app.example";
pub const ADMIN_ORIGIN: &str = "https://admin.example";
pub const PASSWORD: &str = "Aa1!aaaa";
pub const SECRET: &[u8] = b"integration-test-secret-0123456789";

pub fn test_tokens() -> AudienceConfiguration {
    AudienceConfiguration::new(
        "session-issuer",
        vec![APP_ORIGIN.to_string(), ADMIN_ORIGIN.to_string()],
        SECRET.to_vec(),
        300,
        24,
    )
    .expect("valid test configuration")
}

pub fn test_config(db: Database, rate_limit: RateLimitConfig) -> ServerConfig {
    ServerConfig {
        db,
        tokens: test_tokens(),
        ip_extractor: None,
        rate_limit,
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::permissive()).await
    }

    pub async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let app = create_app(&test_config(db.clone(), rate_limit));
        Self {
            app,
            db,
            jwt: JwtConfig::new(test_tokens()),
        }
    }

    /// Send a JSON request from 127.0.0.1 and return the status and parsed body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        origin: Option<&str>,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_default();
        let mut request = builder.body(body).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, origin: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, origin, None, Some(body)).await
    }

    pub async fn create_user(&self, email: &str) -> Principal {
        create_user(&self.db, email).await
    }

    /// Log in through the API and return the response body.
    pub async fn login(&self, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/account/login",
                Some(APP_ORIGIN),
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body
    }
}

pub async fn create_user(db: &Database, email: &str) -> Principal {
    let principal = Principal::new_registered(email);
    db.users()
        .create(&principal, PASSWORD)
        .await
        .expect("Failed to create user");
    principal
}

/// Correctly signed access token that expired a minute ago.
pub fn expired_access_token(principal: &Principal, audience: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = AccessClaims {
        sub: principal.id.clone(),
        name: principal.email.clone(),
        jti: uuid::Uuid::new_v4().to_string(),
        roles: principal.roles.clone(),
        iss: "session-issuer".to_string(),
        aud: audience.to_string(),
        iat: now - 360,
        exp: now - 60,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .expect("Failed to encode token")
}
