//! Password reset token rows for authgate.

use chrono::{DateTime, Utc};

use super::{from_millis, to_millis, DbPool};
use crate::{AuthgateError, Result};

/// Single-use password reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    /// The token value itself (high entropy, sent by mail).
    pub id: String,
    /// User whose password the token may change.
    pub user_id: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Whether the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(sqlx::FromRow)]
struct ResetTokenRow {
    id: String,
    user_id: String,
    expires_at: i64,
}

impl From<ResetTokenRow> for PasswordResetToken {
    fn from(row: ResetTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            expires_at: from_millis(row.expires_at),
        }
    }
}

/// Repository for password reset tokens.
pub struct ResetTokenRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ResetTokenRepository<'a> {
    /// Create a new ResetTokenRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Store a new token for a user, deleting any previous ones.
    ///
    /// Both statements run in one transaction so a user never holds more
    /// than one live token.
    pub async fn replace_for_user(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        sqlx::query("INSERT INTO password_reset_tokens (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(to_millis(expires_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(PasswordResetToken {
            id: token.to_string(),
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    /// Look up a token.
    pub async fn get(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            "SELECT id, user_id, expires_at FROM password_reset_tokens WHERE id = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(row.map(PasswordResetToken::from))
    }

    /// Delete a token. Returns `true` if a row was removed.
    pub async fn delete(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE id = ?")
            .bind(token)
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Consume a token and apply the password change in one transaction.
    ///
    /// Deletes the token, rewrites the user's hash and drops all of the
    /// user's sessions. Returns `false` without changing anything if the
    /// token was already consumed, which is how two concurrent redemptions
    /// of the same token are resolved.
    pub async fn complete_reset(
        &self,
        token: &str,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        let consumed = sqlx::query("DELETE FROM password_reset_tokens WHERE id = ? AND user_id = ?")
            .bind(token)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?
            .rows_affected();

        if consumed != 1 {
            tx.rollback()
                .await
                .map_err(|e| AuthgateError::Database(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(true)
    }

    /// Delete tokens that expired at or before `now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= ?")
            .bind(to_millis(now))
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Count tokens held by a user.
    pub async fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await
                .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(count)
    }
}
