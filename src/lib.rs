//! authgate - authentication, sessions and password recovery
//!
//! Credential storage with schema migrations, server-side sessions with
//! sliding expiry, single-use password reset tokens, and an HTTP gatekeeper
//! that rate-limits, checks origins and attaches the caller's identity.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;
pub mod rate_limit;
pub mod web;

pub use auth::{
    authenticate, generate_secure_token, register, Identity, PasswordHasher, PasswordResetFlow,
    RegistrationRequest, SessionManager, SessionValidation, ValidationError,
};
pub use config::Config;
pub use db::{
    ConflictField, Database, NewUser, PasswordResetToken, ResetTokenRepository, Session,
    SessionRepository, User, UserRepository,
};
pub use error::{AuthgateError, Result};
pub use mail::{LogMailer, Mailer};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use web::{create_router, AppState, WebServer};
