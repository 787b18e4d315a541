//! API error handling for the authgate HTTP surface.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::AuthgateError;

/// Reply for a reset token that is unknown, used or expired.
pub const RESET_LINK_INVALID: &str = "Invalid or expired reset link. Please request a new one.";

/// Header reporting how many requests are left in the window.
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Field-level validation failure (400).
    ValidationError,
    /// Username or email already taken (400).
    Conflict,
    /// Unauthorized (401).
    Unauthorized,
    /// Forbidden (403).
    Forbidden,
    /// Rate limited (429).
    TooManyRequests,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::ValidationError | ErrorCode::Conflict => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Field-level details, keyed by form field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<HashMap<String, Vec<String>>>,
    retry_after: Option<u64>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    /// Create an error whose message is attached to a single form field.
    pub fn for_field(code: ErrorCode, field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let details = HashMap::from([(field.to_string(), vec![message.clone()])]);
        Self {
            code,
            message,
            details: Some(details),
            retry_after: None,
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create a rate-limit error carrying the retry delay.
    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self {
            retry_after: Some(retry_after_secs),
            ..Self::new(
                ErrorCode::TooManyRequests,
                "Too many requests. Please try again later.",
            )
        }
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let retry_after = self.retry_after;
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(secs) = retry_after {
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from_static("0"));
        }

        response
    }
}

impl From<AuthgateError> for ApiError {
    fn from(err: AuthgateError) -> Self {
        match err {
            AuthgateError::Validation(e) => {
                ApiError::for_field(ErrorCode::ValidationError, e.field(), e.to_string())
            }
            AuthgateError::InvalidCredentials => {
                ApiError::bad_request("Invalid username or password")
            }
            AuthgateError::Conflict(field) => {
                ApiError::for_field(ErrorCode::Conflict, field.as_str(), field.message())
            }
            AuthgateError::RateLimited { retry_after_secs } => {
                ApiError::too_many_requests(retry_after_secs)
            }
            AuthgateError::ForbiddenOrigin => ApiError::forbidden("Invalid request origin"),
            // Unknown and expired tokens must look the same to the client.
            AuthgateError::ResetTokenInvalid | AuthgateError::ResetTokenExpired => {
                ApiError::bad_request(RESET_LINK_INVALID)
            }
            AuthgateError::Unauthenticated => ApiError::unauthorized("No active session"),
            AuthgateError::Database(_)
            | AuthgateError::Io(_)
            | AuthgateError::Hashing(_)
            | AuthgateError::Config(_) => {
                tracing::error!(error = %err, "Unexpected error while handling request");
                ApiError::internal("An unexpected error occurred. Please try again.")
            }
        }
    }
}
