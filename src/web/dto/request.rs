//! Request DTOs for the web API.
//!
//! Auth endpoints take URL-encoded form bodies. Missing fields deserialize
//! as empty strings so validation can report them per field.

use serde::Deserialize;

/// Registration form.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Login form.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Forgot-password form.
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordForm {
    /// Account email.
    #[serde(default)]
    pub email: String,
}

/// Reset-password form.
#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordForm {
    /// Reset token from the emailed link.
    #[serde(default)]
    pub token: String,
    /// New password.
    #[serde(default)]
    pub password: String,
}
