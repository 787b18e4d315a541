//! Error types for authgate.

use thiserror::Error;

use crate::auth::validation::ValidationError;
use crate::db::ConflictField;

/// Common error type for authgate.
#[derive(Error, Debug)]
pub enum AuthgateError {
    /// Malformed user input, tied to a single form field.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown user or wrong password. Deliberately does not say which.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Uniqueness violation on a user column.
    #[error("{0} already exists")]
    Conflict(ConflictField),

    /// Too many requests for the caller's rate-limit key.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the current window ends.
        retry_after_secs: u64,
    },

    /// State-changing request from a foreign origin.
    #[error("invalid request origin")]
    ForbiddenOrigin,

    /// Reset token was never issued or has already been consumed.
    #[error("invalid or expired reset token")]
    ResetTokenInvalid,

    /// Reset token existed but its expiry has passed.
    #[error("reset token expired")]
    ResetTokenExpired,

    /// Operation requires an active session.
    #[error("no active session")]
    Unauthenticated,

    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Password hashing primitive failed.
    #[error("password hashing error: {0}")]
    Hashing(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for AuthgateError {
    fn from(e: sqlx::Error) -> Self {
        AuthgateError::Database(e.to_string())
    }
}

/// Result type alias for authgate operations.
pub type Result<T> = std::result::Result<T, AuthgateError>;
