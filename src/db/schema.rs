//! Database schema migrations for authgate.
//!
//! Migrations are applied in registry order and recorded by name in the
//! `_migrations` ledger. New migrations go at the end; existing entries are
//! never renamed, reordered or edited.

/// A named schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Unique name recorded in the ledger.
    pub name: &'static str,
    /// SQL script, may contain several statements.
    pub sql: &'static str,
}

/// Registered migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_initial_schema",
        sql: r#"
-- Users table for authentication
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY,
    username        TEXT UNIQUE NOT NULL,
    password_hash   TEXT NOT NULL,           -- Argon2id PHC string
    created_at      INTEGER NOT NULL         -- Unix epoch milliseconds
);

-- Server-side sessions referenced by the session cookie
CREATE TABLE IF NOT EXISTS sessions (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id),
    expires_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
"#,
    },
    Migration {
        name: "002_add_email_and_reset_tokens",
        sql: r#"
-- SQLite cannot add a UNIQUE column directly; the unique index enforces it.
-- Rows predating this migration keep NULL, which the index allows repeatedly.
ALTER TABLE users ADD COLUMN email TEXT;
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);

-- Single-use password reset tokens, at most one live row per user
CREATE TABLE IF NOT EXISTS password_reset_tokens (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id),
    expires_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_password_reset_tokens_user_id ON password_reset_tokens(user_id);
"#,
    },
];
