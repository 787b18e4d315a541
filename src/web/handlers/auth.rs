//! Authentication handlers.

use axum::{extract::State, Form, Json};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::auth::{
    authenticate, register as register_user, PasswordHasher, PasswordResetFlow,
    RegistrationRequest, SessionManager,
};
use crate::config::Config;
use crate::db::Database;
use crate::mail::Mailer;
use crate::rate_limit::RateLimiter;
use crate::web::dto::{
    ApiResponse, AuthResponse, ForgotPasswordForm, LoginForm, MessageResponse, RegisterForm,
    ResetPasswordForm, UserResponse,
};
use crate::web::error::ApiError;
use crate::web::middleware::{CurrentUser, MaybeUser};
use crate::{AuthgateError, Result};

/// Reply to every accepted forgot-password request.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with this email, you will receive a password reset link.";

/// Application state shared by handlers and the gatekeeper.
#[derive(Clone)]
pub struct AppState {
    /// Database handle.
    pub db: Database,
    /// Password hasher.
    pub hasher: PasswordHasher,
    /// Session manager.
    pub sessions: SessionManager,
    /// Password reset flow.
    pub password_reset: PasswordResetFlow,
    /// Shared rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire up the services from configuration.
    pub fn new(db: Database, config: Config, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.password)?;
        let sessions = SessionManager::new(db.pool().clone(), &config.session);
        let password_reset = PasswordResetFlow::new(
            db.pool().clone(),
            hasher.clone(),
            sessions.clone(),
            mailer,
            &config.mail,
        );

        Ok(Self {
            db,
            hasher,
            sessions,
            password_reset,
            rate_limiter: Arc::new(RateLimiter::new()),
            config: Arc::new(config),
        })
    }
}

type AuthReply = (CookieJar, Json<ApiResponse<AuthResponse>>);

/// POST /api/auth/register - Create an account and log in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> std::result::Result<AuthReply, ApiError> {
    let request = RegistrationRequest::new(form.username, form.email, form.password);
    let user = register_user(state.db.pool(), &state.hasher, &request).await?;
    let session = state.sessions.create_session(&user.id).await?;

    let jar = jar.add(state.sessions.session_cookie(&session));
    let body = AuthResponse {
        user: UserResponse::from(&user),
    };
    Ok((jar, Json(ApiResponse::new(body))))
}

/// POST /api/auth/login - Log in with username and password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> std::result::Result<AuthReply, ApiError> {
    let user = authenticate(state.db.pool(), &state.hasher, &form.username, &form.password).await?;
    let session = state.sessions.create_session(&user.id).await?;

    let jar = jar.add(state.sessions.session_cookie(&session));
    let body = AuthResponse {
        user: UserResponse::from(&user),
    };
    Ok((jar, Json(ApiResponse::new(body))))
}

/// POST /api/auth/logout - End the current session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    MaybeUser(identity): MaybeUser,
) -> std::result::Result<(CookieJar, Json<ApiResponse<MessageResponse>>), ApiError> {
    let identity = identity.ok_or(AuthgateError::Unauthenticated)?;
    state
        .sessions
        .invalidate_session(&identity.session.id)
        .await?;
    tracing::info!(user_id = %identity.user.id, "User logged out");

    let jar = jar.add(state.sessions.blank_cookie());
    Ok((
        jar,
        Json(ApiResponse::new(MessageResponse::new("Logged out"))),
    ))
}

/// POST /api/auth/forgot-password - Request a reset link.
///
/// The reply is the same whether or not the email belongs to an account.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ForgotPasswordForm>,
) -> std::result::Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.password_reset.request_reset(&form.email).await?;
    Ok(Json(ApiResponse::new(MessageResponse::new(
        FORGOT_PASSWORD_MESSAGE,
    ))))
}

/// POST /api/auth/reset-password - Redeem a reset token.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ResetPasswordForm>,
) -> std::result::Result<(CookieJar, Json<ApiResponse<MessageResponse>>), ApiError> {
    let session = state
        .password_reset
        .redeem_reset(&form.token, &form.password)
        .await?;

    let jar = jar.add(state.sessions.session_cookie(&session));
    Ok((
        jar,
        Json(ApiResponse::new(MessageResponse::new(
            "Your password has been reset",
        ))),
    ))
}

/// GET /api/auth/me - Current user.
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::new(UserResponse::from(&identity.user)))
}
