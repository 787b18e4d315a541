//! Configuration module for authgate.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{AuthgateError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4321
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/database.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/authgate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Session and session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Absolute session lifetime in seconds. Sessions are renewed once less
    /// than half of this remains.
    #[serde(default = "default_session_lifetime")]
    pub lifetime_secs: u64,
    /// Mark the cookie `Secure` (enable in production).
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_cookie_name() -> String {
    "auth_session".to_string()
}

fn default_session_lifetime() -> u64 {
    30 * 24 * 60 * 60 // 30 days
}

impl SessionConfig {
    /// Session lifetime as a duration.
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            lifetime_secs: default_session_lifetime(),
            secure_cookie: false,
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Time cost (iterations).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    65536 // 64 MB
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Rate limiting for auth-sensitive endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Fixed window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Requests allowed per identifier per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Interval between sweeps of elapsed windows.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Path prefixes that are rate limited.
    #[serde(default = "default_protected_paths")]
    pub protected_paths: Vec<String>,
}

fn default_window_secs() -> u64 {
    15 * 60 // 15 minutes
}

fn default_max_requests() -> u32 {
    10
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_protected_paths() -> Vec<String> {
    vec![
        "/api/auth/login".to_string(),
        "/api/auth/register".to_string(),
    ]
}

impl RateLimitConfig {
    /// Window length as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            sweep_interval_secs: default_sweep_interval(),
            protected_paths: default_protected_paths(),
        }
    }
}

/// Request origin checks.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Origin hosts accepted regardless of the request Host (local development).
    #[serde(default = "default_dev_origin_hosts")]
    pub dev_origin_hosts: Vec<String>,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`.
    /// Enable only behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

fn default_dev_origin_hosts() -> Vec<String> {
    vec!["localhost".to_string()]
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            dev_origin_hosts: default_dev_origin_hosts(),
            trust_forwarded_headers: false,
        }
    }
}

/// Password reset mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Public base URL used to build reset links.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Reset token lifetime in seconds.
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_secs: u64,
}

fn default_app_url() -> String {
    "http://localhost:4321".to_string()
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_reset_token_ttl() -> u64 {
    60 * 60 // 1 hour
}

impl MailConfig {
    /// Reset token lifetime as a duration.
    pub fn reset_token_ttl(&self) -> Duration {
        Duration::from_secs(self.reset_token_ttl_secs)
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            app_url: default_app_url(),
            from_address: default_from_address(),
            reset_token_ttl_secs: default_reset_token_ttl(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Password hashing configuration.
    #[serde(default)]
    pub password: PasswordConfig,
    /// Rate limit configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Origin check configuration.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Mail configuration.
    #[serde(default)]
    pub mail: MailConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(AuthgateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AuthgateError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DATABASE_PATH`: Override the database file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.session.lifetime_secs == 0 {
            return Err(AuthgateError::Config(
                "session.lifetime_secs must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(AuthgateError::Config(
                "rate_limit.window_secs and rate_limit.max_requests must be greater than zero"
                    .to_string(),
            ));
        }
        if url::Url::parse(&self.mail.app_url).is_err() {
            return Err(AuthgateError::Config(format!(
                "mail.app_url is not a valid URL: {}",
                self.mail.app_url
            )));
        }
        Ok(())
    }
}
