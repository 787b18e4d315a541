//! Security response headers.

use axum::http::{header::HeaderValue, HeaderMap};

/// Headers added to every response, unless the handler set them already.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    // Prevent MIME type sniffing
    ("x-content-type-options", "nosniff"),
    // Prevent clickjacking
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "geolocation=(), microphone=(), camera=()",
    ),
];

/// Insert the security headers that are not present yet.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        if !headers.contains_key(*name) {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
    }
}
