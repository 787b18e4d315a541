//! User model for authgate.

use std::fmt;

use chrono::{DateTime, Utc};

use super::from_millis;

/// Column whose uniqueness constraint rejected an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    /// `users.username`
    Username,
    /// `users.email`
    Email,
}

impl ConflictField {
    /// Form field name for error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictField::Username => "username",
            ConflictField::Email => "email",
        }
    }

    /// User-facing message for the conflict.
    pub fn message(&self) -> &'static str {
        match self {
            ConflictField::Username => "Username already exists",
            ConflictField::Email => "An account with this email already exists",
        }
    }

    /// Identify the column from a SQLite unique-constraint message such as
    /// `UNIQUE constraint failed: users.email`.
    pub(crate) fn from_constraint_message(message: &str) -> Option<Self> {
        if message.contains("users.username") {
            Some(ConflictField::Username)
        } else if message.contains("users.email") {
            Some(ConflictField::Email)
        } else {
            None
        }
    }
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered user.
#[derive(Clone)]
pub struct User {
    /// Opaque unique ID.
    pub id: String,
    /// Login username (unique).
    pub username: String,
    /// Email address, normalized to lowercase (unique).
    pub email: String,
    /// Argon2id PHC hash. Never the plaintext password.
    pub password_hash: String,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

// The hash stays out of Debug output so it cannot end up in logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Raw `users` row.
#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email.unwrap_or_default(),
            password_hash: row.password_hash,
            created_at: from_millis(row.created_at),
        }
    }
}

/// Data for creating a new user.
#[derive(Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Normalized email address.
    pub email: String,
    /// Password hash (already hashed with Argon2id).
    pub password_hash: String,
}

impl NewUser {
    /// Create a new user record.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
        }
    }
}
