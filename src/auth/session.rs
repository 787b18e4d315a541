//! Session management for authgate.
//!
//! Sessions live in the `sessions` table and are referenced by an opaque
//! cookie. Validation slides the expiry forward once less than half of the
//! lifetime remains, and reports through [`SessionValidation`] whether the
//! cookie has to be rewritten.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::token::generate_secure_token;
use crate::config::SessionConfig;
use crate::db::{DbPool, Session, SessionRepository, User};
use crate::Result;

/// An authenticated caller: the session and the user it belongs to.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The validated session.
    pub session: Session,
    /// The session's owner.
    pub user: User,
}

/// Outcome of validating a session ID.
#[derive(Debug, Clone)]
pub enum SessionValidation {
    /// Valid; expiry was extended and the cookie must be re-issued.
    Renewed(Identity),
    /// Valid; cookie stays as it is.
    Valid(Identity),
    /// Unknown, expired or orphaned; the cookie must be cleared.
    Expired,
}

impl SessionValidation {
    /// Consume into the resolved identity, if any.
    pub fn into_identity(self) -> Option<Identity> {
        match self {
            SessionValidation::Renewed(identity) | SessionValidation::Valid(identity) => {
                Some(identity)
            }
            SessionValidation::Expired => None,
        }
    }
}

/// Creates, validates and invalidates sessions, and builds their cookies.
#[derive(Debug, Clone)]
pub struct SessionManager {
    pool: DbPool,
    lifetime: Duration,
    cookie_name: String,
    secure_cookie: bool,
}

impl SessionManager {
    /// Create a session manager over the given pool.
    pub fn new(pool: DbPool, config: &SessionConfig) -> Self {
        let lifetime = Duration::from_std(config.lifetime()).unwrap_or(Duration::days(30));
        Self {
            pool,
            lifetime,
            cookie_name: config.cookie_name.clone(),
            secure_cookie: config.secure_cookie,
        }
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Full session lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sessions with less than this much time left are renewed.
    pub fn renewal_threshold(&self) -> Duration {
        self.lifetime / 2
    }

    /// Create a fresh session for a user.
    pub async fn create_session(&self, user_id: &str) -> Result<Session> {
        let session = Session {
            id: generate_secure_token(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + self.lifetime,
        };
        SessionRepository::new(&self.pool).create(&session).await?;
        debug!(user_id, "Session created");
        Ok(session)
    }

    /// Validate a session ID against the current time.
    pub async fn validate_session(&self, session_id: &str) -> Result<SessionValidation> {
        self.validate_session_at(session_id, Utc::now()).await
    }

    /// Validate a session ID as of `now`.
    ///
    /// Expired sessions and sessions whose user is gone are deleted.
    pub async fn validate_session_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionValidation> {
        let repo = SessionRepository::new(&self.pool);

        let Some((mut session, user)) = repo.get_with_user(session_id).await? else {
            // Either unknown or orphaned. Deleting is a no-op for the former.
            repo.delete(session_id).await?;
            return Ok(SessionValidation::Expired);
        };

        if session.is_expired_at(now) {
            repo.delete(&session.id).await?;
            debug!(user_id = %user.id, "Expired session removed");
            return Ok(SessionValidation::Expired);
        }

        if session.expires_at - now < self.renewal_threshold() {
            session.expires_at = now + self.lifetime;
            repo.update_expiry(&session.id, session.expires_at).await?;
            debug!(user_id = %user.id, "Session renewed");
            return Ok(SessionValidation::Renewed(Identity { session, user }));
        }

        Ok(SessionValidation::Valid(Identity { session, user }))
    }

    /// Delete one session.
    pub async fn invalidate_session(&self, session_id: &str) -> Result<bool> {
        SessionRepository::new(&self.pool).delete(session_id).await
    }

    /// Delete every session of a user.
    pub async fn invalidate_all_sessions_for_user(&self, user_id: &str) -> Result<u64> {
        let removed = SessionRepository::new(&self.pool)
            .delete_all_for_user(user_id)
            .await?;
        info!(user_id, removed, "All sessions invalidated");
        Ok(removed)
    }

    /// Cookie carrying a session, expiring with it.
    pub fn session_cookie(&self, session: &Session) -> Cookie<'static> {
        let expires = OffsetDateTime::from_unix_timestamp(session.expires_at.timestamp())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let mut cookie = self.base_cookie(session.id.clone());
        cookie.set_expires(expires);
        cookie
    }

    /// Empty cookie that makes the client drop the session cookie.
    pub fn blank_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.base_cookie(String::new());
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }

    /// Cookie to write after a validation, if any.
    pub fn cookie_for(&self, validation: &SessionValidation) -> Option<Cookie<'static>> {
        match validation {
            SessionValidation::Renewed(identity) => Some(self.session_cookie(&identity.session)),
            SessionValidation::Valid(_) => None,
            SessionValidation::Expired => Some(self.blank_cookie()),
        }
    }

    fn base_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .build()
    }
}
