//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.
//!
//! Each `tokio_rusqlite::Connection` owns a dedicated thread. A file-backed
//! database gets a small round-robin pool of them (WAL lets readers proceed
//! alongside the writer); `:memory:` always uses a single connection since
//! every in-memory connection would be its own database.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::{CONNECTION_PRAGMAS, CREATE_SCHEMA, FILE_PRAGMAS};
use super::Database;
use crate::auth::Credential;
use crate::error::DbError;
use crate::models::{Account, Token, TokenScope};

/// Default number of pooled connections for file-backed databases
pub const DEFAULT_POOL_SIZE: usize = 4;

const IN_MEMORY: &str = ":memory:";

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, bio, created_at, updated_at";

/// SQLite database implementation
pub struct SqliteDatabase {
    pool: Vec<Connection>,
    next: AtomicUsize,
}

impl SqliteDatabase {
    /// Open a database with the default pool size
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        Self::with_pool_size(path, DEFAULT_POOL_SIZE).await
    }

    /// Open a database with `pool_size` connections
    pub async fn with_pool_size(path: &str, pool_size: usize) -> Result<Self, DbError> {
        let pool_size = if path == IN_MEMORY {
            1
        } else {
            pool_size.max(1)
        };

        let mut pool = Vec::with_capacity(pool_size);
        for index in 0..pool_size {
            let conn = Connection::open(path).await?;
            let is_file = path != IN_MEMORY;
            let is_first = index == 0;

            conn.call(move |conn| {
                conn.execute_batch(CONNECTION_PRAGMAS)?;
                if is_first {
                    if is_file {
                        conn.execute_batch(FILE_PRAGMAS)?;
                    }
                    conn.execute_batch(CREATE_SCHEMA)?;
                }
                Ok(())
            })
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

            pool.push(conn);
        }

        tracing::debug!(path = %path, pool_size, "SQLite connection pool opened");

        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
        })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(IN_MEMORY).await
    }

    /// Number of pooled connections
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    fn conn(&self) -> &Connection {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        &self.pool[index]
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // Account operations
    // =========================================================================

    async fn create_account(&self, account: &Account) -> Result<Account, DbError> {
        let password_hash = account
            .credential
            .hash()
            .ok_or_else(|| DbError::ConstraintViolation("account has no password hash".into()))?
            .to_string();
        let mut stored = account.clone();
        let now = Utc::now();
        stored.created_at = now;
        stored.updated_at = now;

        let username = stored.username.clone();
        let email = stored.email.clone();
        let bio = stored.bio.clone();
        let timestamp = format_timestamp(now);

        let id = self
            .conn()
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO accounts
                    (username, email, password_hash, bio, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                    "#,
                    rusqlite::params![username, email, password_hash, bio, timestamp],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        stored.id = id;
        Ok(stored)
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
        let username = username.to_string();

        self.conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM accounts WHERE username = ?1",
                    ACCOUNT_COLUMNS
                ))?;
                let result = stmt.query_row([&username], account_from_row).optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_account_by_id(&self, id: i64) -> Result<Option<Account>, DbError> {
        self.conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM accounts WHERE id = ?1",
                    ACCOUNT_COLUMNS
                ))?;
                let result = stmt.query_row([id], account_from_row).optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn update_account(&self, account: &Account) -> Result<DateTime<Utc>, DbError> {
        let id = account.id;
        let username = account.username.clone();
        let email = account.email.clone();
        let bio = account.bio.clone();
        let now = Utc::now();
        let timestamp = format_timestamp(now);

        let rows_affected = self
            .conn()
            .call(move |conn| {
                let count = conn.execute(
                    r#"
                    UPDATE accounts
                    SET username = ?1, email = ?2, bio = ?3, updated_at = ?4
                    WHERE id = ?5
                    "#,
                    rusqlite::params![username, email, bio, timestamp, id],
                )?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(now)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DbError> {
        let password_hash = password_hash.to_string();
        let timestamp = format_timestamp(Utc::now());

        let rows_affected = self
            .conn()
            .call(move |conn| {
                let count = conn.execute(
                    "UPDATE accounts SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![password_hash, timestamp, id],
                )?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn delete_account(&self, id: i64) -> Result<(), DbError> {
        let rows_affected = self
            .conn()
            .call(move |conn| {
                let count = conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    // =========================================================================
    // Token operations
    // =========================================================================

    async fn insert_token(&self, token: &Token) -> Result<(), DbError> {
        let hash = token.hash.clone();
        let account_id = token.account_id;
        let expiry = format_timestamp(token.expiry);
        let scope = token.scope.as_str();

        self.conn()
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO tokens (hash, account_id, expiry, scope)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![hash, account_id, expiry, scope],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn get_account_for_token(
        &self,
        scope: TokenScope,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, DbError> {
        let hash = hash.to_vec();
        let scope = scope.as_str();
        let now = format_timestamp(now);

        self.conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT a.id, a.username, a.email, a.password_hash, a.bio,
                           a.created_at, a.updated_at
                    FROM accounts a
                    INNER JOIN tokens t ON t.account_id = a.id
                    WHERE t.hash = ?1 AND t.scope = ?2 AND t.expiry > ?3
                    "#,
                )?;
                let result = stmt
                    .query_row(rusqlite::params![hash, scope, now], account_from_row)
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_tokens_for_account(
        &self,
        account_id: i64,
        scope: TokenScope,
    ) -> Result<u64, DbError> {
        let scope = scope.as_str();

        self.conn()
            .call(move |conn| {
                let count = conn.execute(
                    "DELETE FROM tokens WHERE account_id = ?1 AND scope = ?2",
                    rusqlite::params![account_id, scope],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let now = format_timestamp(now);

        self.conn()
            .call(move |conn| {
                let count = conn.execute("DELETE FROM tokens WHERE expiry <= ?1", [&now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

/// Fixed-width RFC 3339 in UTC, so text order matches time order
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(index: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        credential: Credential::from_hash(row.get::<_, String>(3)?),
        bio: row.get(4)?,
        created_at: parse_timestamp(5, row.get(5)?)?,
        updated_at: parse_timestamp(6, row.get(6)?)?,
    })
}
