//! Origin check for state-changing requests.

use axum::http::{header, request::Parts, Method};
use futures::future::BoxFuture;
use url::Url;

use super::gatekeeper::{Flow, Interceptor, RequestContext};
use crate::web::error::ApiError;
use crate::AuthgateError;

/// Rejects cross-origin POST, PUT, DELETE and PATCH requests.
///
/// A request without an `Origin` header is treated as same-origin. Origins
/// whose host is in `dev_hosts` are always accepted.
pub struct OriginCheck {
    dev_hosts: Vec<String>,
}

impl OriginCheck {
    /// Create the check with the accepted development hosts.
    pub fn new(dev_hosts: Vec<String>) -> Self {
        Self { dev_hosts }
    }

    /// Whether a request is allowed through.
    pub fn allows(&self, parts: &Parts) -> bool {
        if !is_state_changing(&parts.method) {
            return true;
        }

        let Some(origin) = parts.headers.get(header::ORIGIN) else {
            return true;
        };

        let Some(origin_host) = origin
            .to_str()
            .ok()
            .and_then(|s| Url::parse(s).ok())
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };

        if self.dev_hosts.iter().any(|h| h.eq_ignore_ascii_case(&origin_host)) {
            return true;
        }

        expected_host(parts).is_some_and(|host| host == origin_host)
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

/// Host the request was addressed to, without port.
fn expected_host(parts: &Parts) -> Option<String> {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(strip_port)
        .or_else(|| parts.uri.host())?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal; keep the brackets, as `Url::host_str` does.
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

impl Interceptor for OriginCheck {
    fn name(&self) -> &'static str {
        "origin"
    }

    fn intercept<'a>(&'a self, parts: &'a Parts, ctx: &'a mut RequestContext) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            if self.allows(parts) {
                Flow::Continue
            } else {
                tracing::warn!(
                    ip = %ctx.client_ip,
                    origin = ?parts.headers.get(header::ORIGIN),
                    "Cross-origin request rejected"
                );
                Flow::Reject(ApiError::from(AuthgateError::ForbiddenOrigin))
            }
        })
    }
}
