//! Rate limiting for auth-sensitive endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::ConnectInfo, http::request::Parts};
use futures::future::BoxFuture;

use super::gatekeeper::{Flow, Interceptor, RequestContext};
use crate::config::RateLimitConfig;
use crate::rate_limit::RateLimiter;
use crate::web::error::ApiError;
use crate::AuthgateError;

/// Extract the client IP from a request.
///
/// With `trust_forwarded` the order is: first `X-Forwarded-For` entry,
/// `X-Real-IP`, the peer address, then `"unknown"`. Without it the proxy
/// headers are ignored, since any client can set them.
pub fn client_ip(parts: &Parts, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(parts) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn forwarded_ip(parts: &Parts) -> Option<String> {
    // X-Forwarded-For first (reverse proxy)
    if let Some(forwarded) = parts
        .headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    if let Some(real_ip) = parts
        .headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return Some(real_ip.to_string());
        }
    }

    None
}

/// Fixed-window limit on the configured auth paths, keyed by client IP.
pub struct AuthRateLimit {
    limiter: Arc<RateLimiter>,
    window: Duration,
    max_requests: u32,
    protected_paths: Vec<String>,
}

impl AuthRateLimit {
    /// Create the interceptor from the shared limiter and its policy.
    pub fn new(limiter: Arc<RateLimiter>, config: &RateLimitConfig) -> Self {
        Self {
            limiter,
            window: config.window(),
            max_requests: config.max_requests,
            protected_paths: config.protected_paths.clone(),
        }
    }

    fn is_protected(&self, path: &str) -> bool {
        self.protected_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Interceptor for AuthRateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn intercept<'a>(&'a self, parts: &'a Parts, ctx: &'a mut RequestContext) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            if !self.is_protected(parts.uri.path()) {
                return Flow::Continue;
            }

            let key = format!("auth:{}", ctx.client_ip);
            let now = Instant::now();
            let decision = self
                .limiter
                .check_at(&key, self.window, self.max_requests, now);

            if decision.allowed {
                Flow::Continue
            } else {
                let retry_after = decision.retry_after_secs(now);
                tracing::warn!(
                    ip = %ctx.client_ip,
                    path = parts.uri.path(),
                    retry_after,
                    "Auth rate limit exceeded"
                );
                Flow::Reject(ApiError::from(AuthgateError::RateLimited {
                    retry_after_secs: retry_after,
                }))
            }
        })
    }
}
