//! User registration for authgate.

use tracing::info;

use super::password::PasswordHasher;
use super::validation::{validate_email, validate_password, validate_username};
use crate::db::{DbPool, NewUser, User, UserRepository};
use crate::Result;

/// Registration request data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Desired username (3-31 letters, digits, `-`, `_`).
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password (12-255 characters).
    pub password: String,
}

impl RegistrationRequest {
    /// Create a new registration request.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Register a new user.
///
/// Fields are validated in form order (username, email, password); the
/// first failure is returned. Username or email collisions surface as
/// [`crate::AuthgateError::Conflict`].
pub async fn register(
    pool: &DbPool,
    hasher: &PasswordHasher,
    request: &RegistrationRequest,
) -> Result<User> {
    let username = validate_username(&request.username)?;
    let email = validate_email(&request.email)?;
    let password = validate_password(&request.password)?;

    let password_hash = hasher.hash(&password).await?;

    let user = UserRepository::new(pool)
        .create(&NewUser::new(username, email, password_hash))
        .await?;

    info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}
