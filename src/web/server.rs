//! Web server for authgate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;

use crate::db::{Database, ResetTokenRepository, SessionRepository};
use crate::{AuthgateError, Result};

use super::handlers::AppState;
use super::router::create_router;

/// Store housekeeping interval.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// HTTP server for the auth API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
}

impl WebServer {
    /// Create a server bound to the configured host and port.
    pub fn new(app_state: AppState) -> Result<Self> {
        let server = &app_state.config.server;
        let addr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| {
                AuthgateError::Config(format!(
                    "invalid server address {}:{}: {e}",
                    server.host, server.port
                ))
            })?;

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the hourly removal of expired sessions and reset tokens.
    fn start_store_cleanup_task(db: Database) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                run_store_cleanup(&db).await;
            }
        });
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        self.serve(listener, local_addr).await
    }

    async fn serve(self, listener: TcpListener, local_addr: SocketAddr) -> Result<()> {
        let config = Arc::clone(&self.app_state.config);

        Arc::clone(&self.app_state.rate_limiter)
            .spawn_sweeper(Duration::from_secs(config.rate_limit.sweep_interval_secs.max(1)));
        Self::start_store_cleanup_task(self.app_state.db.clone());
        tracing::info!("Background cleanup tasks started");

        let router = create_router(self.app_state);

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Useful for tests that bind to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = self.serve(listener, local_addr).await {
                tracing::error!(error = %e, "Web server error");
            }
        });

        Ok(local_addr)
    }
}

/// Delete expired sessions and reset tokens once.
pub async fn run_store_cleanup(db: &Database) {
    let now = Utc::now();

    match SessionRepository::new(db.pool()).delete_expired(now).await {
        Ok(0) => tracing::debug!("No expired sessions to clean up"),
        Ok(count) => tracing::info!(deleted_count = count, "Cleaned up expired sessions"),
        Err(e) => tracing::warn!(error = %e, "Failed to clean up sessions"),
    }

    match ResetTokenRepository::new(db.pool()).delete_expired(now).await {
        Ok(0) => tracing::debug!("No expired reset tokens to clean up"),
        Ok(count) => tracing::info!(deleted_count = count, "Cleaned up expired reset tokens"),
        Err(e) => tracing::warn!(error = %e, "Failed to clean up reset tokens"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{NewUser, Session, UserRepository};
    use crate::mail::LogMailer;

    async fn state_with(host: &str, port: u16) -> AppState {
        let db = Database::open_in_memory().await.unwrap();
        let mut config = Config::default();
        config.server.host = host.to_string();
        config.server.port = port;
        AppState::new(db, config, Arc::new(LogMailer::new("noreply@test"))).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let state = state_with("not an address", 80).await;
        assert!(matches!(
            WebServer::new(state),
            Err(AuthgateError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_run_with_addr_serves_health() {
        let state = state_with("127.0.0.1", 0).await;
        let server = WebServer::new(state).unwrap();
        let addr = server.run_with_addr().await.unwrap();
        assert_ne!(addr.port(), 0);

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }

    #[tokio::test]
    async fn test_store_cleanup_removes_expired_rows() {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("alice", "alice@example.com", "hash"))
            .await
            .unwrap();
        let sessions = SessionRepository::new(db.pool());
        sessions
            .create(&Session {
                id: "old".to_string(),
                user_id: user.id.clone(),
                expires_at: Utc::now() - chrono::Duration::hours(1),
            })
            .await
            .unwrap();
        ResetTokenRepository::new(db.pool())
            .replace_for_user(&user.id, "tok", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        run_store_cleanup(&db).await;

        assert!(sessions.get("old").await.unwrap().is_none());
        assert_eq!(
            ResetTokenRepository::new(db.pool())
                .count_for_user(&user.id)
                .await
                .unwrap(),
            0
        );
    }
}
