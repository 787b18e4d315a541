//! Input validation for authgate forms.
//!
//! Each validator trims its input and returns the normalized value that the
//! rest of the system stores, hashes or looks up.

use thiserror::Error;

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 31;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 255;

/// Validation errors. Display output is the user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username is too short.
    #[error("Username must be at least {MIN_USERNAME_LENGTH} characters")]
    UsernameTooShort,

    /// Username is too long.
    #[error("Username must be at most {MAX_USERNAME_LENGTH} characters")]
    UsernameTooLong,

    /// Username contains invalid characters.
    #[error("Username can only contain letters, numbers, hyphens, and underscores")]
    UsernameInvalidChars,

    /// Email is empty.
    #[error("Email is required")]
    EmailRequired,

    /// Email format is invalid.
    #[error("Invalid email address")]
    EmailInvalid,

    /// Password is too short.
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// Password is too long.
    #[error("Password must be at most {MAX_PASSWORD_LENGTH} characters")]
    PasswordTooLong,

    /// Reset token is empty.
    #[error("Invalid or missing reset token")]
    ResetTokenMissing,
}

impl ValidationError {
    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::UsernameTooShort
            | ValidationError::UsernameTooLong
            | ValidationError::UsernameInvalidChars => "username",
            ValidationError::EmailRequired | ValidationError::EmailInvalid => "email",
            ValidationError::PasswordTooShort | ValidationError::PasswordTooLong => "password",
            ValidationError::ResetTokenMissing => "token",
        }
    }
}

/// Validate a username, returning it trimmed.
///
/// Requirements:
/// - 3 to 31 characters
/// - ASCII letters, digits, `-` and `_` only
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim();
    let len = username.chars().count();

    if len < MIN_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooShort);
    }
    if len > MAX_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooLong);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::UsernameInvalidChars);
    }

    Ok(username.to_string())
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address, returning it normalized.
///
/// Accepts `local@domain.tld` shapes: one `@`, no whitespace, and a dot in
/// the domain with text on both sides.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if !is_valid_email_format(&email) {
        return Err(ValidationError::EmailInvalid);
    }
    Ok(email)
}

fn is_valid_email_format(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Validate a password against the length policy, returning it trimmed.
///
/// Lengths are counted in characters after trimming.
pub fn validate_password(password: &str) -> Result<String, ValidationError> {
    let password = password.trim();
    let len = password.chars().count();

    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }

    Ok(password.to_string())
}

/// Validate that a reset token was supplied, returning it trimmed.
pub fn validate_reset_token(token: &str) -> Result<&str, ValidationError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ValidationError::ResetTokenMissing);
    }
    Ok(token)
}
