mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use common::{ADMIN_ORIGIN, APP_ORIGIN, PASSWORD, TestApp, expired_access_token};
use serde_json::json;
use session_issuer::auth::{SessionStore, StoredSession};
use session_issuer::db::MAX_FAILED_ATTEMPTS;
use session_issuer::rate_limit::RateLimitConfig;

const LOGIN: &str = "/api/account/login";
const REFRESH: &str = "/api/account/refresh";
const REGISTER: &str = "/api/account/register";
const REVOKE: &str = "/api/account/revoke";

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;

    let before = Utc::now();
    let body = app.login("a@b.com").await;

    assert_eq!(body["statusCode"], 200);
    let access = body["accessToken"].as_str().unwrap();
    let refresh = body["refreshToken"].as_str().unwrap();
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());

    let valid_to: DateTime<Utc> = body["validTo"].as_str().unwrap().parse().unwrap();
    assert!(valid_to > before);

    let claims = app.jwt.validate_access_token(access, Some(APP_ORIGIN)).unwrap();
    assert_eq!(claims.aud, APP_ORIGIN);
    assert_eq!(claims.sub, principal.id);
    assert_eq!(claims.name, "a@b.com");

    let stored = app.db.sessions().get(&principal.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token, refresh);
}

#[tokio::test]
async fn test_login_audience_follows_origin() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;

    let (status, body) = app
        .post(
            LOGIN,
            Some(ADMIN_ORIGIN),
            json!({ "email": "a@b.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let claims = app
        .jwt
        .validate_access_token(body["accessToken"].as_str().unwrap(), Some(ADMIN_ORIGIN))
        .unwrap();
    assert_eq!(claims.aud, ADMIN_ORIGIN);
}

#[tokio::test]
async fn test_login_locked_account() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;
    let until = (Utc::now() + Duration::minutes(30)).timestamp_millis();
    app.db.users().lock_until(&principal.id, until).await.unwrap();

    let (status, body) = app
        .post(
            LOGIN,
            Some(APP_ORIGIN),
            json!({ "email": "a@b.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["error"], "account_locked");
    assert!(body.get("accessToken").is_none());
}

#[tokio::test]
async fn test_login_lockout_after_repeated_failures() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let wrong = json!({ "email": "a@b.com", "password": "Wrong1!pass" });

    for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
        let (status, _) = app.post(LOGIN, Some(APP_ORIGIN), wrong.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The failure that reaches the threshold already reports the lock
    let (status, _) = app.post(LOGIN, Some(APP_ORIGIN), wrong).await;
    assert_eq!(status, StatusCode::LOCKED);

    let (status, _) = app
        .post(
            LOGIN,
            Some(APP_ORIGIN),
            json!({ "email": "a@b.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[tokio::test]
async fn test_login_unknown_user() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            LOGIN,
            Some(APP_ORIGIN),
            json!({ "email": "nobody@b.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;

    let (status, body) = app
        .post(
            LOGIN,
            Some(APP_ORIGIN),
            json!({ "email": "a@b.com", "password": "Wrong1!pass" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_login_bad_requests() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let creds = json!({ "email": "a@b.com", "password": PASSWORD });

    let (status, body) = app.post(LOGIN, None, creds.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "origin_missing");

    let (status, body) = app
        .post(LOGIN, Some("https://evil.example"), creds)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "audience_not_allowed");

    let (status, _) = app
        .post(LOGIN, Some(APP_ORIGIN), json!({ "email": "", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(LOGIN, Some(APP_ORIGIN), json!({ "email": "a@b.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_is_repeatable_without_rotation() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;
    let pair = json!({
        "accessToken": tokens["accessToken"],
        "refreshToken": tokens["refreshToken"],
    });

    let (status, first) = app.post(REFRESH, Some(APP_ORIGIN), pair.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = app.post(REFRESH, Some(APP_ORIGIN), pair).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first["refreshToken"], tokens["refreshToken"]);
    assert_eq!(second["refreshToken"], tokens["refreshToken"]);
    assert_ne!(first["accessToken"], tokens["accessToken"]);
    assert_ne!(first["accessToken"], second["accessToken"]);
    assert!(first.get("statusCode").is_none());

    let valid_to: DateTime<Utc> = first["validTo"].as_str().unwrap().parse().unwrap();
    assert!(valid_to > Utc::now());
}

#[tokio::test]
async fn test_refresh_with_expired_access_token() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;

    let (status, body) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({
                "accessToken": expired_access_token(&principal, APP_ORIGIN),
                "refreshToken": tokens["refreshToken"],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let claims = app
        .jwt
        .validate_access_token(body["accessToken"].as_str().unwrap(), Some(APP_ORIGIN))
        .unwrap();
    assert_eq!(claims.sub, principal.id);
}

#[tokio::test]
async fn test_refresh_with_expired_stored_token() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;
    let refresh = tokens["refreshToken"].as_str().unwrap().to_string();

    app.db
        .sessions()
        .set(
            &principal.id,
            &StoredSession {
                refresh_token: refresh.clone(),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        )
        .await
        .unwrap();

    let (status, body) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": tokens["accessToken"], "refreshToken": refresh }),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "session_mismatch");
}

#[tokio::test]
async fn test_refresh_with_wrong_refresh_token() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;

    let (status, _) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": tokens["accessToken"], "refreshToken": "not-the-token" }),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_refresh_after_new_login_rejects_old_token() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let old = app.login("a@b.com").await;
    app.login("a@b.com").await;

    let (status, _) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": old["accessToken"], "refreshToken": old["refreshToken"] }),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_refresh_origin_rules() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;
    let pair = json!({
        "accessToken": tokens["accessToken"],
        "refreshToken": tokens["refreshToken"],
    });

    let (status, body) = app
        .post(REFRESH, Some("https://evil.example"), pair.clone())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "audience_not_allowed");

    let (status, _) = app.post(REFRESH, None, pair.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Allowed origin, but the token was issued for a different audience
    let (status, _) = app.post(REFRESH, Some(ADMIN_ORIGIN), pair).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_refresh_bad_requests() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;

    let (status, _) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": "", "refreshToken": tokens["refreshToken"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": tokens["accessToken"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_forged_token() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;

    let (status, body) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": "not.a.jwt", "refreshToken": tokens["refreshToken"] }),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Only the stable code and fixed message are exposed
    assert_eq!(body.as_object().unwrap().len(), 2);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_register_and_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            REGISTER,
            None,
            json!({ "email": "new@b.com", "password": PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let user_id = body["userId"].as_str().unwrap();
    assert!(!body["code"].as_str().unwrap().is_empty());

    let login = app.login("new@b.com").await;
    let claims = app
        .jwt
        .validate_access_token(login["accessToken"].as_str().unwrap(), Some(APP_ORIGIN))
        .unwrap();
    assert_eq!(claims.sub, user_id);
}

#[tokio::test]
async fn test_register_failures() {
    let app = TestApp::new().await;
    app.create_user("a@b.com").await;

    let (status, body) = app
        .post(REGISTER, None, json!({ "email": "a@b.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "user_exists");

    let (status, _) = app
        .post(REGISTER, None, json!({ "email": "b@b.com", "password": "weak" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_revoke_ends_session() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;
    let access = tokens["accessToken"].as_str().unwrap();

    let (status, _) = app
        .send("DELETE", REVOKE, Some(APP_ORIGIN), Some(access), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.db.sessions().get(&principal.id).await.unwrap().is_none());

    let (status, _) = app
        .post(
            REFRESH,
            Some(APP_ORIGIN),
            json!({ "accessToken": access, "refreshToken": tokens["refreshToken"] }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_revoke_with_expired_token() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;
    app.login("a@b.com").await;

    let expired = expired_access_token(&principal, APP_ORIGIN);
    let (status, _) = app
        .send("DELETE", REVOKE, Some(APP_ORIGIN), Some(&expired), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.db.sessions().get(&principal.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_revoke_requires_valid_token() {
    let app = TestApp::new().await;
    let principal = app.create_user("a@b.com").await;
    let tokens = app.login("a@b.com").await;
    let access = tokens["accessToken"].as_str().unwrap();

    let (status, _) = app.send("DELETE", REVOKE, Some(APP_ORIGIN), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send("DELETE", REVOKE, Some(ADMIN_ORIGIN), Some(access), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "claim_rejected");

    let (status, _) = app
        .send("DELETE", REVOKE, Some(APP_ORIGIN), Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.db.sessions().get(&principal.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_register_rate_limited() {
    let app = TestApp::with_rate_limit(RateLimitConfig::with_limits(1000, 1000, 1)).await;

    let (status, _) = app
        .post(REGISTER, None, json!({ "email": "a@b.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(REGISTER, None, json!({ "email": "b@b.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let app = TestApp::with_rate_limit(RateLimitConfig::with_limits(1, 2, 1000)).await;
    let creds = json!({ "email": "nobody@b.com", "password": PASSWORD });

    for _ in 0..2 {
        let (status, _) = app.post(LOGIN, Some(APP_ORIGIN), creds.clone()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = app.post(LOGIN, Some(APP_ORIGIN), creds).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
