//! HTTP surface for authgate.
//!
//! Axum router, form handlers, JSON DTOs and the request gatekeeper.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
