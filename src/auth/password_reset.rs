//! Password recovery through single-use reset tokens.
//!
//! A request stores a fresh token (replacing older ones) and mails a link.
//! Redemption consumes the token, rewrites the password hash, logs the user
//! out everywhere and opens a new session.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::password::PasswordHasher;
use super::session::SessionManager;
use super::token::generate_secure_token;
use super::validation::{normalize_email, validate_password, validate_reset_token, ValidationError};
use crate::config::MailConfig;
use crate::db::{DbPool, PasswordResetToken, ResetTokenRepository, Session, UserRepository};
use crate::mail::{reset_url, Mailer};
use crate::{AuthgateError, Result};

/// Issues and redeems password reset tokens.
#[derive(Clone)]
pub struct PasswordResetFlow {
    pool: DbPool,
    hasher: PasswordHasher,
    sessions: SessionManager,
    mailer: Arc<dyn Mailer>,
    app_url: String,
    token_ttl: Duration,
}

impl PasswordResetFlow {
    /// Create the flow from its collaborators.
    pub fn new(
        pool: DbPool,
        hasher: PasswordHasher,
        sessions: SessionManager,
        mailer: Arc<dyn Mailer>,
        config: &MailConfig,
    ) -> Self {
        let token_ttl = Duration::from_std(config.reset_token_ttl()).unwrap_or(Duration::hours(1));
        Self {
            pool,
            hasher,
            sessions,
            mailer,
            app_url: config.app_url.clone(),
            token_ttl,
        }
    }

    /// Start a reset for the account registered under `email`.
    ///
    /// Returns the issued token, or `None` when no account matches. Callers
    /// must answer both cases identically. Mail goes out on a background task
    /// so the caller's latency does not reveal which case happened.
    pub async fn request_reset(&self, email: &str) -> Result<Option<PasswordResetToken>> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ValidationError::EmailRequired.into());
        }

        let Some(user) = UserRepository::new(&self.pool).get_by_email(&email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = ResetTokenRepository::new(&self.pool)
            .replace_for_user(
                &user.id,
                &generate_secure_token(),
                Utc::now() + self.token_ttl,
            )
            .await?;
        info!(user_id = %user.id, "Password reset token issued");

        let mailer = Arc::clone(&self.mailer);
        let link = reset_url(&self.app_url, &token.id);
        let user_id = user.id.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_reset(&email, &link).await {
                warn!(user_id = %user_id, error = %e, "Failed to send password reset email");
            }
        });

        Ok(Some(token))
    }

    /// Redeem a reset token, returning the new session.
    pub async fn redeem_reset(&self, token: &str, new_password: &str) -> Result<Session> {
        self.redeem_reset_at(token, new_password, Utc::now()).await
    }

    /// Redeem a reset token as of `now`.
    pub async fn redeem_reset_at(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let token = validate_reset_token(token)?;
        let password = validate_password(new_password)?;

        let tokens = ResetTokenRepository::new(&self.pool);
        let Some(record) = tokens.get(token).await? else {
            return Err(AuthgateError::ResetTokenInvalid);
        };

        if record.is_expired_at(now) {
            tokens.delete(&record.id).await?;
            info!(user_id = %record.user_id, "Expired reset token discarded");
            return Err(AuthgateError::ResetTokenExpired);
        }

        let password_hash = self.hasher.hash(&password).await?;

        // Loses to a concurrent redemption of the same token.
        if !tokens
            .complete_reset(&record.id, &record.user_id, &password_hash)
            .await?
        {
            return Err(AuthgateError::ResetTokenInvalid);
        }

        let session = self.sessions.create_session(&record.user_id).await?;
        info!(user_id = %record.user_id, "Password reset completed");
        Ok(session)
    }
}
