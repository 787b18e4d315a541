//! Middleware for the web API.
//!
//! The [`gatekeeper`] runs the interceptors defined in the sibling modules.

pub mod gatekeeper;
pub mod origin;
pub mod rate_limit;
pub mod security;
pub mod session;

pub use gatekeeper::{gatekeep, Flow, Gatekeeper, Interceptor, RequestContext};
pub use origin::OriginCheck;
pub use rate_limit::{client_ip, AuthRateLimit};
pub use security::apply_security_headers;
pub use session::{CurrentUser, MaybeUser, SessionAttach};
