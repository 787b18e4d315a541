//! User repository for authgate.
//!
//! Credential storage: create users, look them up, rewrite password hashes.

use chrono::Utc;
use uuid::Uuid;

use super::user::{ConflictField, NewUser, User, UserRow};
use super::{to_millis, DbPool};
use crate::{AuthgateError, Result};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

/// Repository for user rows.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// A uniqueness violation on username or email is reported as
    /// [`AuthgateError::Conflict`] naming the column that collided.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(to_millis(user.created_at))
        .execute(self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        self.fetch_one_where("id", id).await
    }

    /// Get a user by exact username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("username", username).await
    }

    /// Get a user by normalized email.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("email", email).await
    }

    /// Overwrite a user's password hash.
    ///
    /// Returns `false` if no such user exists.
    pub async fn update_password_hash(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(count)
    }

    async fn fetch_one_where(&self, column: &'static str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(row.map(User::from))
    }
}

fn map_insert_error(e: sqlx::Error) -> AuthgateError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            if let Some(field) = ConflictField::from_constraint_message(db_err.message()) {
                return AuthgateError::Conflict(field);
            }
        }
    }
    AuthgateError::Database(e.to_string())
}
