//! Database layer for tokengate
//!
//! This module defines the storage trait for accounts and token digests, and
//! its SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{Account, Token, TokenScope};

/// Database trait for data persistence
///
/// This trait defines all database operations needed by the application.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // Account operations
    // =========================================================================

    /// Insert a new account
    ///
    /// Returns the stored account with its assigned ID and timestamps.
    /// Duplicate username or email is a `ConstraintViolation`.
    async fn create_account(&self, account: &Account) -> Result<Account, DbError>;

    /// Look up an account by username
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError>;

    /// Look up an account by ID
    async fn get_account_by_id(&self, id: i64) -> Result<Option<Account>, DbError>;

    /// Update username, email and bio
    ///
    /// Returns the new modification timestamp.
    async fn update_account(&self, account: &Account) -> Result<DateTime<Utc>, DbError>;

    /// Replace the stored password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DbError>;

    /// Delete an account and, through the foreign key, all of its tokens
    async fn delete_account(&self, id: i64) -> Result<(), DbError>;

    // =========================================================================
    // Token operations
    // =========================================================================

    /// Persist a token digest in a single write
    async fn insert_token(&self, token: &Token) -> Result<(), DbError>;

    /// Find the account owning a live token
    ///
    /// Returns None when no token has this digest and scope, or when it
    /// expired at or before `now`.
    async fn get_account_for_token(
        &self,
        scope: TokenScope,
        hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, DbError>;

    /// Delete every token of `scope` for an account
    ///
    /// Returns the number of deleted tokens. Zero is not an error.
    async fn delete_tokens_for_account(
        &self,
        account_id: i64,
        scope: TokenScope,
    ) -> Result<u64, DbError>;

    /// Delete tokens that expired at or before `now`
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}
