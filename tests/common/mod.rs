//! Test helpers for the web API tests.
//!
//! Builds a [`TestServer`] over the real router with an in-memory database,
//! cheap Argon2 parameters and a mailer that records what it was asked to
//! send.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestRequest, TestResponse, TestServer};
use futures::future::BoxFuture;

use authgate::config::{Config, PasswordConfig};
use authgate::{create_router, AppState, Database, Mailer};

/// Strong enough password for every test account.
pub const PASSWORD: &str = "correct horse 1";

/// Mailer that keeps every reset link in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// Copy of everything sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` mails were sent.
    pub async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} mails, got {:?}", self.sent());
    }
}

impl Mailer for RecordingMailer {
    fn send_password_reset<'a>(
        &'a self,
        to: &'a str,
        reset_url: &'a str,
    ) -> BoxFuture<'a, authgate::Result<()>> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), reset_url.to_string()));
            Ok(())
        })
    }
}

/// Server under test plus handles for inspecting its state.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub mailer: Arc<RecordingMailer>,
}

/// Configuration used by the tests: defaults with fast hashing, as if
/// deployed behind a proxy that sets `X-Forwarded-For`.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.security.trust_forwarded_headers = true;
    config.password = PasswordConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
    config
}

/// Create a test server with an in-memory database.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config()).await
}

/// Create a test server with a custom configuration.
pub async fn create_test_app_with(config: Config) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(db.clone(), config, mailer.clone()).expect("Failed to build state");
    let server = TestServer::new(create_router(Arc::new(state))).expect("Failed to create server");

    TestApp { server, db, mailer }
}

/// Attach a client address the way a reverse proxy would.
pub fn from_ip(request: TestRequest, ip: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_str(ip).unwrap(),
    )
}

/// Attach a session cookie.
pub fn with_session(request: TestRequest, session_id: &str) -> TestRequest {
    request.add_header(
        header::COOKIE,
        HeaderValue::from_str(&format!("auth_session={session_id}")).unwrap(),
    )
}

/// All `Set-Cookie` values of a response.
pub fn set_cookies(response: &TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Value of the `auth_session` cookie set by a response, if any.
pub fn session_cookie(response: &TestResponse) -> Option<String> {
    set_cookies(response).into_iter().find_map(|c| {
        c.strip_prefix("auth_session=")
            .map(|rest| rest.split(';').next().unwrap_or("").to_string())
    })
}

/// Register a user through the API.
pub async fn register(server: &TestServer, username: &str, email: &str) -> TestResponse {
    server
        .post("/api/auth/register")
        .form(&[
            ("username", username),
            ("email", email),
            ("password", PASSWORD),
        ])
        .await
}

/// Log in through the API.
pub async fn login(server: &TestServer, username: &str, password: &str) -> TestResponse {
    server
        .post("/api/auth/login")
        .form(&[("username", username), ("password", password)])
        .await
}
