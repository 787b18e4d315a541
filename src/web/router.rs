//! Router configuration for the web API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{forgot_password, login, logout, me, register, reset_password, AppState};
use super::middleware::{gatekeep, Gatekeeper};

/// Create the main router: auth routes and health check behind the
/// gatekeeper.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let gatekeeper = Arc::new(Gatekeeper::from_state(&app_state));

    let auth_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/me", get(me));

    Router::new()
        .nest("/api/auth", auth_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(gatekeeper, gatekeep)),
        )
        .with_state(app_state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
