//! Database module for authgate.
//!
//! This module provides SQLite connectivity through a sqlx pool and applies
//! the versioned migrations recorded in the `_migrations` ledger.

mod repository;
mod reset_token;
mod schema;
mod session;
mod user;

pub use repository::UserRepository;
pub use reset_token::{PasswordResetToken, ResetTokenRepository};
pub use schema::{Migration, MIGRATIONS};
pub use session::{Session, SessionRepository};
pub use user::{ConflictField, NewUser, User};

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error, info};

use crate::{AuthgateError, Result};

/// Pool type shared by every repository.
pub type DbPool = SqlitePool;

/// Convert a timestamp to the INTEGER milliseconds stored in the database.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Convert stored INTEGER milliseconds back to a timestamp.
pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Database wrapper owning the connection pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open a database at the specified path.
    ///
    /// The file is created if it doesn't exist. Migrations are applied before
    /// the database is returned.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| AuthgateError::Database(format!("failed to open database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// Every SQLite in-memory connection is a separate database, so the pool
    /// holds exactly one connection that is never recycled.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Apply every registered migration that is not yet in the ledger.
    pub async fn migrate(&self) -> Result<()> {
        let applied = apply_migrations(&self.pool, MIGRATIONS).await?;
        if applied == 0 {
            debug!("Database schema is up to date");
        } else {
            info!(applied, "Database migration complete");
        }
        Ok(())
    }

    /// Names of the applied migrations, in the order they were applied.
    pub async fn applied_migrations(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT name FROM _migrations ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

/// Apply pending migrations from `migrations`, in order.
///
/// Each migration runs in its own transaction together with its ledger row,
/// so a failing step leaves neither schema changes nor a ledger entry behind.
/// Returns the number of migrations applied.
pub async fn apply_migrations(pool: &DbPool, migrations: &[Migration]) -> Result<usize> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT UNIQUE NOT NULL,
            run_at  INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let completed: HashSet<String> = sqlx::query_scalar("SELECT name FROM _migrations")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    let mut applied = 0;
    for migration in migrations {
        if completed.contains(migration.name) {
            continue;
        }

        info!(migration = migration.name, "Running migration");

        let mut tx = pool.begin().await?;

        if let Err(e) = sqlx::raw_sql(migration.sql).execute(&mut *tx).await {
            error!(migration = migration.name, error = %e, "Migration failed");
            return Err(AuthgateError::Database(format!(
                "migration {} failed: {e}",
                migration.name
            )));
        }

        sqlx::query("INSERT INTO _migrations (name, run_at) VALUES (?, ?)")
            .bind(migration.name)
            .bind(to_millis(Utc::now()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(migration = migration.name, "Completed migration");
        applied += 1;
    }

    Ok(applied)
}
