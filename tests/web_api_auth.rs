//! Web API authentication tests.

mod common;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use chrono::{Duration, Utc};
use serde_json::Value;

use authgate::{ResetTokenRepository, SessionRepository, UserRepository};
use common::{
    create_test_app, create_test_app_with, from_ip, login, register, session_cookie, set_cookies,
    test_config, with_session, PASSWORD,
};

fn token_from_url(url: &str) -> String {
    url.split("token=").nth(1).unwrap().to_string()
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_success() {
    let app = create_test_app().await;

    let response = register(&app.server, "alice", "Alice@Example.com").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(body["data"]["user"]["email"], "alice@example.com");
    assert!(body["data"]["user"]["id"].is_string());
    assert!(body["data"]["user"].get("password_hash").is_none());

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert!(cookie.starts_with("auth_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));

    let session_id = session_cookie(&response).unwrap();
    assert_eq!(session_id.len(), 43);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();

    let response = register(&app.server, "alice", "other@example.com").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(body["error"]["message"], "Username already exists");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();

    let response = register(&app.server, "bob", "ALICE@example.com").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(
        body["error"]["message"],
        "An account with this email already exists"
    );
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/auth/register")
        .form(&[
            ("username", "al"),
            ("email", "alice@example.com"),
            ("password", PASSWORD),
        ])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["username"].is_array());

    let response = app
        .server
        .post("/api/auth/register")
        .form(&[
            ("username", "alice"),
            ("email", "not-an-email"),
            ("password", PASSWORD),
        ])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid email address");

    let response = app
        .server
        .post("/api/auth/register")
        .form(&[
            ("username", "alice"),
            ("email", "alice@example.com"),
            ("password", "short"),
        ])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"]["details"]["password"].is_array());

    let users = UserRepository::new(app.db.pool()).count().await.unwrap();
    assert_eq!(users, 0);
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();

    let response = login(&app.server, "alice", PASSWORD).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_alike() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();

    let wrong = login(&app.server, "alice", "not the password").await;
    wrong.assert_status(StatusCode::BAD_REQUEST);
    let wrong: Value = wrong.json();

    let unknown = login(&app.server, "nobody", PASSWORD).await;
    unknown.assert_status(StatusCode::BAD_REQUEST);
    let unknown: Value = unknown.json();

    assert_eq!(wrong["error"]["message"], "Invalid username or password");
    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn test_login_empty_credentials() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/auth/login")
        .form(&[("username", ""), ("password", "")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid username or password");
}

// ============================================================================
// Session, /me and logout
// ============================================================================

#[tokio::test]
async fn test_me_with_session() {
    let app = create_test_app().await;
    let response = register(&app.server, "alice", "alice@example.com").await;
    let session_id = session_cookie(&response).unwrap();

    let response = with_session(app.server.get("/api/auth/me"), &session_id).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["username"], "alice");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_me_without_session() {
    let app = create_test_app().await;

    let response = app.server.get("/api/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_session_is_cleared() {
    let app = create_test_app().await;

    let response = with_session(app.server.get("/api/auth/me"), "bogus").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(session_cookie(&response).as_deref(), Some(""));
}

#[tokio::test]
async fn test_stale_session_is_renewed() {
    let app = create_test_app().await;
    let response = register(&app.server, "alice", "alice@example.com").await;
    let session_id = session_cookie(&response).unwrap();

    let sessions = SessionRepository::new(app.db.pool());
    sessions
        .update_expiry(&session_id, Utc::now() + Duration::days(3))
        .await
        .unwrap();

    let response = with_session(app.server.get("/api/auth/me"), &session_id).await;
    response.assert_status_ok();
    assert_eq!(session_cookie(&response), Some(session_id.clone()));

    let session = sessions.get(&session_id).await.unwrap().unwrap();
    assert!(session.expires_at > Utc::now() + Duration::days(29));
}

#[tokio::test]
async fn test_logout_without_session() {
    let app = create_test_app().await;

    let response = app.server.post("/api/auth/logout").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = create_test_app().await;
    let response = register(&app.server, "alice", "alice@example.com").await;
    let session_id = session_cookie(&response).unwrap();

    let response = with_session(app.server.post("/api/auth/logout"), &session_id).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Logged out");
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("auth_session=;"));
    assert!(cookies[0].contains("Max-Age=0"));

    assert!(SessionRepository::new(app.db.pool())
        .get(&session_id)
        .await
        .unwrap()
        .is_none());

    let response = with_session(app.server.get("/api/auth/me"), &session_id).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn test_forgot_password_reply_does_not_reveal_accounts() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();

    let known = app
        .server
        .post("/api/auth/forgot-password")
        .form(&[("email", "alice@example.com")])
        .await;
    known.assert_status_ok();

    let unknown = app
        .server
        .post("/api/auth/forgot-password")
        .form(&[("email", "nobody@example.com")])
        .await;
    unknown.assert_status_ok();

    assert_eq!(known.text(), unknown.text());
    let body: Value = known.json();
    assert_eq!(
        body["data"]["message"],
        "If an account exists with this email, you will receive a password reset link."
    );

    let sent = app.mailer.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "alice@example.com");
    assert!(sent[0].1.contains("/reset-password?token="));
}

#[tokio::test]
async fn test_forgot_password_requires_email() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/auth/forgot-password")
        .form(&[("email", "")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Email is required");
}

#[tokio::test]
async fn test_reset_password_flow() {
    let app = create_test_app().await;
    let response = register(&app.server, "alice", "alice@example.com").await;
    let old_session = session_cookie(&response).unwrap();

    app.server
        .post("/api/auth/forgot-password")
        .form(&[("email", "alice@example.com")])
        .await
        .assert_status_ok();
    let sent = app.mailer.wait_for(1).await;
    let token = token_from_url(&sent[0].1);

    let new_password = "brand new password 2";
    let response = app
        .server
        .post("/api/auth/reset-password")
        .form(&[("token", token.as_str()), ("password", new_password)])
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "Your password has been reset");
    let new_session = session_cookie(&response).unwrap();
    assert_ne!(new_session, old_session);

    // Old sessions are gone, the new one works.
    with_session(app.server.get("/api/auth/me"), &old_session)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    with_session(app.server.get("/api/auth/me"), &new_session)
        .await
        .assert_status_ok();

    login(&app.server, "alice", PASSWORD)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    login(&app.server, "alice", new_password)
        .await
        .assert_status_ok();

    // Tokens are single use.
    let response = app
        .server
        .post("/api/auth/reset-password")
        .form(&[("token", token.as_str()), ("password", "another password 3")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["error"]["message"],
        "Invalid or expired reset link. Please request a new one."
    );
}

#[tokio::test]
async fn test_reset_password_expired_token() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();
    let user = UserRepository::new(app.db.pool())
        .get_by_username("alice")
        .await
        .unwrap()
        .unwrap();

    let tokens = ResetTokenRepository::new(app.db.pool());
    tokens
        .replace_for_user(&user.id, "expired-token", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let response = app
            .server
            .post("/api/auth/reset-password")
            .form(&[("token", "expired-token"), ("password", "brand new password 2")])
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        bodies.push(response.text());
        assert!(tokens.get("expired-token").await.unwrap().is_none());
    }

    // Expired and already-deleted tokens get the same reply.
    assert_eq!(bodies[0], bodies[1]);
    let body: Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(
        body["error"]["message"],
        "Invalid or expired reset link. Please request a new one."
    );

    let unknown = app
        .server
        .post("/api/auth/reset-password")
        .form(&[("token", "never-issued"), ("password", "brand new password 2")])
        .await;
    unknown.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(unknown.text(), bodies[0]);
    login(&app.server, "alice", PASSWORD)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_reset_password_missing_token() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/auth/reset-password")
        .form(&[("token", ""), ("password", "brand new password 2")])
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid or missing reset token");
}

// ============================================================================
// Gatekeeper
// ============================================================================

#[tokio::test]
async fn test_login_rate_limited_per_ip() {
    let app = create_test_app().await;

    for _ in 0..10 {
        from_ip(app.server.post("/api/auth/login"), "203.0.113.9")
            .form(&[("username", "alice"), ("password", "wrong password")])
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    let response = from_ip(app.server.post("/api/auth/login"), "203.0.113.9")
        .form(&[("username", "alice"), ("password", "wrong password")])
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 15 * 60);
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );

    // Another address has its own budget.
    from_ip(app.server.post("/api/auth/login"), "198.51.100.1")
        .form(&[("username", "alice"), ("password", "wrong password")])
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Unprotected routes are not counted.
    from_ip(app.server.get("/health"), "203.0.113.9")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_forwarded_for_ignored_without_trusted_proxy() {
    let mut config = test_config();
    config.security.trust_forwarded_headers = false;
    let app = create_test_app_with(config).await;

    // A new X-Forwarded-For value per request does not buy a new budget.
    for i in 0..10 {
        from_ip(app.server.post("/api/auth/login"), &format!("203.0.113.{i}"))
            .form(&[("username", "alice"), ("password", "wrong password")])
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    from_ip(app.server.post("/api/auth/login"), "203.0.113.200")
        .form(&[("username", "alice"), ("password", "wrong password")])
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_cross_origin_post_rejected() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/api/auth/login")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://evil.example"),
        )
        .form(&[("username", "alice"), ("password", PASSWORD)])
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Invalid request origin");
    assert_eq!(
        response.headers().get("x-frame-options").unwrap(),
        "DENY"
    );
}

#[tokio::test]
async fn test_dev_origin_allowed() {
    let app = create_test_app().await;
    register(&app.server, "alice", "alice@example.com")
        .await
        .assert_status_ok();

    app.server
        .post("/api/auth/login")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("http://localhost:4321"),
        )
        .form(&[("username", "alice"), ("password", PASSWORD)])
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = create_test_app().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("referrer-policy").is_some());
}
