//! Session rows for authgate.

use chrono::{DateTime, Utc};

use super::user::{User, UserRow};
use super::{from_millis, to_millis, DbPool};
use crate::{AuthgateError, Result};

/// Server-side session referenced by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Unguessable session ID, also the cookie value.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    expires_at: i64,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            expires_at: from_millis(row.expires_at),
        }
    }
}

/// Repository for session rows.
pub struct SessionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new SessionRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a session row.
    pub async fn create(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&session.id)
            .bind(&session.user_id)
            .bind(to_millis(session.expires_at))
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a session by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, expires_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(row.map(Session::from))
    }

    /// Get a session together with its owning user.
    ///
    /// Returns `None` when the session is unknown or its user no longer
    /// exists.
    pub async fn get_with_user(&self, id: &str) -> Result<Option<(Session, User)>> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            "SELECT s.id AS session_id, s.expires_at AS session_expires_at,
                    u.id, u.username, u.email, u.password_hash, u.created_at
             FROM sessions s
             INNER JOIN users u ON u.id = s.user_id
             WHERE s.id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| AuthgateError::Database(e.to_string()))?;

        Ok(row.map(|row| {
            let session = Session {
                id: row.session_id,
                user_id: row.user.id.clone(),
                expires_at: from_millis(row.session_expires_at),
            };
            (session, User::from(row.user))
        }))
    }

    /// Move a session's expiry.
    pub async fn update_expiry(&self, id: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(to_millis(expires_at))
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a session. Returns `true` if a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session belonging to a user.
    pub async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Delete sessions that expired at or before `now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(to_millis(now))
            .execute(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Count sessions belonging to a user.
    pub async fn count_for_user(&self, user_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| AuthgateError::Database(e.to_string()))?;
        Ok(count)
    }
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    session_id: String,
    session_expires_at: i64,
    #[sqlx(flatten)]
    user: UserRow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewUser, UserRepository};
    use chrono::Duration;

    async fn setup() -> (Database, User) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("alice", "alice@example.com", "hash"))
            .await
            .unwrap();
        (db, user)
    }

    fn session_for(user: &User, id: &str, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: id.to_string(),
            user_id: user.id.clone(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (db, user) = setup().await;
        let repo = SessionRepository::new(db.pool());
        let expires_at = from_millis(to_millis(Utc::now() + Duration::days(30)));
        let session = session_for(&user, "s1", expires_at);

        repo.create(&session).await.unwrap();

        assert_eq!(repo.get("s1").await.unwrap(), Some(session));
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_with_user() {
        let (db, user) = setup().await;
        let repo = SessionRepository::new(db.pool());
        repo.create(&session_for(&user, "s1", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        let (session, found) = repo.get_with_user("s1").await.unwrap().unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(found.username, "alice");
        assert!(repo.get_with_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_requires_existing_user() {
        let (db, _) = setup().await;
        let repo = SessionRepository::new(db.pool());
        let orphan = Session {
            id: "s1".to_string(),
            user_id: "no-such-user".to_string(),
            expires_at: Utc::now(),
        };

        assert!(repo.create(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_update_expiry() {
        let (db, user) = setup().await;
        let repo = SessionRepository::new(db.pool());
        repo.create(&session_for(&user, "s1", Utc::now())).await.unwrap();

        let later = from_millis(to_millis(Utc::now() + Duration::days(30)));
        assert!(repo.update_expiry("s1", later).await.unwrap());
        assert_eq!(repo.get("s1").await.unwrap().unwrap().expires_at, later);
        assert!(!repo.update_expiry("missing", later).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_and_delete_all_for_user() {
        let (db, user) = setup().await;
        let repo = SessionRepository::new(db.pool());
        let expires_at = Utc::now() + Duration::days(1);
        for id in ["s1", "s2", "s3"] {
            repo.create(&session_for(&user, id, expires_at)).await.unwrap();
        }

        assert!(repo.delete("s1").await.unwrap());
        assert!(!repo.delete("s1").await.unwrap());
        assert_eq!(repo.count_for_user(&user.id).await.unwrap(), 2);

        assert_eq!(repo.delete_all_for_user(&user.id).await.unwrap(), 2);
        assert_eq!(repo.count_for_user(&user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (db, user) = setup().await;
        let repo = SessionRepository::new(db.pool());
        let now = Utc::now();
        repo.create(&session_for(&user, "old", now - Duration::minutes(1)))
            .await
            .unwrap();
        repo.create(&session_for(&user, "live", now + Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.get("old").await.unwrap().is_none());
        assert!(repo.get("live").await.unwrap().is_some());
    }

    #[test]
    fn test_is_expired_at() {
        let now = Utc::now();
        let session = Session {
            id: "s".to_string(),
            user_id: "u".to_string(),
            expires_at: now,
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - Duration::seconds(1)));
    }
}
