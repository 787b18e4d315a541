//! Request gatekeeper.
//!
//! Every request runs through an ordered list of [`Interceptor`]s before it
//! reaches a handler. The first interceptor that rejects short-circuits the
//! chain. Interceptors record what they learn in a [`RequestContext`], which
//! handlers read back from the request extensions. Security headers are
//! added to every response on the way out, rejections included.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::Cookie;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::origin::OriginCheck;
use super::rate_limit::{client_ip, AuthRateLimit};
use super::security::apply_security_headers;
use super::session::SessionAttach;
use crate::auth::Identity;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Per-request state shared between interceptors and handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Caller's network identity.
    pub client_ip: String,
    /// Authenticated caller, if the session cookie resolved.
    pub identity: Option<Identity>,
    /// Session cookie to write on the response unless the handler sets its own.
    pub pending_cookie: Option<Cookie<'static>>,
}

impl RequestContext {
    /// Context with no identity yet.
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            identity: None,
            pending_cookie: None,
        }
    }
}

/// Outcome of one interceptor.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next interceptor.
    Continue,
    /// Stop and answer with this error.
    Reject(ApiError),
}

/// One step of the gatekeeper pipeline.
pub trait Interceptor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Inspect the request, possibly updating the context.
    fn intercept<'a>(&'a self, parts: &'a Parts, ctx: &'a mut RequestContext)
        -> BoxFuture<'a, Flow>;
}

/// Ordered interceptor chain.
#[derive(Clone, Default)]
pub struct Gatekeeper {
    interceptors: Vec<Arc<dyn Interceptor>>,
    trust_forwarded_headers: bool,
}

impl Gatekeeper {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor to the end of the chain.
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Resolve the client address from proxy headers.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    /// The standard chain: rate limit, origin check, session attachment.
    pub fn from_state(state: &AppState) -> Self {
        let config = &state.config;
        Self::new()
            .trust_forwarded_headers(config.security.trust_forwarded_headers)
            .with(AuthRateLimit::new(
                Arc::clone(&state.rate_limiter),
                &config.rate_limit,
            ))
            .with(OriginCheck::new(config.security.dev_origin_hosts.clone()))
            .with(SessionAttach::new(state.sessions.clone()))
    }

    /// Names of the interceptors, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run the chain until one interceptor rejects.
    pub async fn run(&self, parts: &Parts, ctx: &mut RequestContext) -> Flow {
        for interceptor in &self.interceptors {
            match interceptor.intercept(parts, ctx).await {
                Flow::Continue => {}
                Flow::Reject(err) => {
                    debug!(interceptor = interceptor.name(), "Request rejected");
                    return Flow::Reject(err);
                }
            }
        }
        Flow::Continue
    }
}

/// Axum middleware driving the gatekeeper.
pub async fn gatekeep(
    State(gatekeeper): State<Arc<Gatekeeper>>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let mut ctx = RequestContext::new(client_ip(&parts, gatekeeper.trust_forwarded_headers));

    let mut response = match gatekeeper.run(&parts, &mut ctx).await {
        Flow::Continue => {
            let pending = ctx.pending_cookie.take();
            let mut req = Request::from_parts(parts, body);
            req.extensions_mut().insert(ctx);

            let mut response = next.run(req).await;
            if let Some(cookie) = pending {
                append_cookie_unless_set(&mut response, &cookie);
            }
            response
        }
        Flow::Reject(err) => {
            let mut response = err.into_response();
            if let Some(cookie) = ctx.pending_cookie.take() {
                append_cookie_unless_set(&mut response, &cookie);
            }
            response
        }
    };

    apply_security_headers(response.headers_mut());
    response
}

fn append_cookie_unless_set(response: &mut Response, cookie: &Cookie<'static>) {
    let prefix = format!("{}=", cookie.name());
    let already_set = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .any(|v| v.to_str().map(|s| s.starts_with(&prefix)).unwrap_or(false));
    if already_set {
        return;
    }

    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
    }
}
