//! Outbound mail for authgate.
//!
//! Delivery transport is pluggable through [`Mailer`]. The bundled
//! [`LogMailer`] only records deliveries in the log.

use futures::future::BoxFuture;
use tracing::info;

use crate::Result;

/// Sends account emails.
pub trait Mailer: Send + Sync {
    /// Deliver a password reset link to `to`.
    fn send_password_reset<'a>(&'a self, to: &'a str, reset_url: &'a str)
        -> BoxFuture<'a, Result<()>>;
}

/// Mailer that writes deliveries to the log instead of sending them.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    /// Create a log mailer with the configured sender address.
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

impl Mailer for LogMailer {
    fn send_password_reset<'a>(
        &'a self,
        to: &'a str,
        _reset_url: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // The link carries a live token and stays out of the log.
            info!(from = %self.from_address, to, "Password reset email queued");
            Ok(())
        })
    }
}

/// Build the reset link sent to the user.
pub fn reset_url(app_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={}",
        app_url.trim_end_matches('/'),
        token
    )
}
