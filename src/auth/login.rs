//! Credential checking for login.

use tracing::{debug, info};

use super::password::PasswordHasher;
use crate::db::{DbPool, User, UserRepository};
use crate::{AuthgateError, Result};

/// Check a username and password.
///
/// Both inputs are trimmed. An unknown user and a wrong password produce the
/// same [`AuthgateError::InvalidCredentials`] after one Argon2 verification
/// each.
pub async fn authenticate(
    pool: &DbPool,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<User> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthgateError::InvalidCredentials);
    }

    let Some(user) = UserRepository::new(pool).get_by_username(username).await? else {
        debug!("Login for unknown username");
        // Same Argon2 cost as a real check, so timing does not reveal the miss.
        hasher.verify_dummy(password).await?;
        return Err(AuthgateError::InvalidCredentials);
    };

    if !hasher.verify(password, &user.password_hash).await? {
        debug!(user_id = %user.id, "Login with wrong password");
        return Err(AuthgateError::InvalidCredentials);
    }

    info!(user_id = %user.id, "User authenticated");
    Ok(user)
}
