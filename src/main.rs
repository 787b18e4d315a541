use std::sync::Arc;

use tracing::{error, info};

use authgate::{AppState, Config, Database, LogMailer, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = authgate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        authgate::logging::init_console_only(&config.logging.level);
    }

    info!("authgate - authentication service");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    // Migrations run inside open; the service cannot start without them.
    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, path = %config.database.path, "Failed to open database");
            std::process::exit(1);
        }
    };

    let mailer = Arc::new(LogMailer::new(config.mail.from_address.clone()));
    let server = match AppState::new(db, config, mailer).and_then(WebServer::new) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to initialize server");
            std::process::exit(1);
        }
    };

    info!("Server configured on {}", server.addr());

    if let Err(e) = server.run().await {
        error!(error = %e, "Web server stopped");
        std::process::exit(1);
    }
}
