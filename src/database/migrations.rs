//! Database migrations for tokengate
//!
//! This module contains SQL migrations for the SQLite database schema.

/// Connection settings applied to every pooled connection
pub const CONNECTION_PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
"#;

/// Journal settings for file-backed databases
pub const FILE_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
"#;

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
-- Accounts table
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    bio TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Token digests table
CREATE TABLE IF NOT EXISTS tokens (
    hash BLOB PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    expiry TEXT NOT NULL,
    scope TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tokens_account_scope ON tokens(account_id, scope);
CREATE INDEX IF NOT EXISTS idx_tokens_expiry ON tokens(expiry);
"#;
