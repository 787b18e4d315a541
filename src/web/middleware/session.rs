//! Session attachment and identity extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use futures::future::BoxFuture;

use super::gatekeeper::{Flow, Interceptor, RequestContext};
use crate::auth::{Identity, SessionManager};
use crate::web::error::ApiError;

/// Resolves the session cookie into an [`Identity`].
///
/// Renewed sessions get a fresh cookie; expired or unknown ones get a blank
/// cookie. Either way the request continues.
pub struct SessionAttach {
    sessions: SessionManager,
}

impl SessionAttach {
    /// Create the interceptor.
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

impl Interceptor for SessionAttach {
    fn name(&self) -> &'static str {
        "session"
    }

    fn intercept<'a>(&'a self, parts: &'a Parts, ctx: &'a mut RequestContext) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            let jar = CookieJar::from_headers(&parts.headers);
            let Some(session_id) = jar
                .get(self.sessions.cookie_name())
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
            else {
                return Flow::Continue;
            };

            match self.sessions.validate_session(&session_id).await {
                Ok(validation) => {
                    ctx.pending_cookie = self.sessions.cookie_for(&validation);
                    ctx.identity = validation.into_identity();
                    Flow::Continue
                }
                Err(e) => Flow::Reject(ApiError::from(e)),
            }
        })
    }
}

fn request_identity(parts: &Parts) -> Option<Identity> {
    parts
        .extensions
        .get::<RequestContext>()
        .and_then(|ctx| ctx.identity.clone())
}

/// Extractor for authenticated callers.
///
/// Rejects with 401 when the gatekeeper attached no identity.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        request_identity(parts)
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized. Please log in."))
    }
}

/// Extractor for an identity that may be absent.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(request_identity(parts)))
    }
}
