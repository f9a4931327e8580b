//! Authentication manager
//!
//! This module provides the main authentication interface for the application.
//! It handles registration, login, token resolution and revocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::database::Database;
use crate::error::{AuthError, DbError};
use crate::models::{Account, AccountChanges, NewAccount, Token, TokenScope};

use super::credential::Credential;
use super::token::{generate_token, hash_token, is_valid_token_format};

/// Lifetime of tokens issued at login
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the authentication manager
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Time-to-live of login tokens
    pub token_ttl: Duration,

    /// Timeout applied to every store call
    pub store_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl: DEFAULT_TOKEN_TTL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Authentication manager
///
/// Provides methods for authenticating callers and managing their tokens.
pub struct AuthManager<D: Database> {
    db: Arc<D>,
    config: AuthConfig,
}

impl<D: Database> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Register a new account
    ///
    /// The password is hashed on the blocking pool before the insert.
    pub async fn register(&self, request: NewAccount) -> Result<Account, AuthError> {
        request.validate()?;

        let NewAccount {
            username,
            email,
            password,
            bio,
        } = request;
        let credential = Credential::hashed(password).await?;

        let now = Utc::now();
        let account = Account {
            id: 0,
            username,
            email,
            credential,
            bio,
            created_at: now,
            updated_at: now,
        };

        let account = self
            .store(self.db.create_account(&account))
            .await
            .map_err(conflict_as_exists)?;

        tracing::info!(account_id = account.id, username = %account.username, "Account registered");
        Ok(account)
    }

    /// Verify a username and password and issue an authentication token
    ///
    /// Unknown usernames and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`], and take comparable time.
    pub async fn login(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let account = self.store(self.db.get_account_by_username(username)).await?;

        let Some(account) = account else {
            Credential::verify_dummy(password.to_string()).await;
            tracing::debug!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !account.credential.verify(password.to_string()).await? {
            tracing::debug!(account_id = account.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_token(account.id, TokenScope::Authentication)
            .await
    }

    /// Create and persist a token for `account_id`
    ///
    /// The token is only returned once its digest has been stored.
    pub async fn issue_token(
        &self,
        account_id: i64,
        scope: TokenScope,
    ) -> Result<Token, AuthError> {
        let ttl = chrono::Duration::from_std(self.config.token_ttl)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;
        let token = generate_token(account_id, ttl, scope)?;

        self.store(self.db.insert_token(&token)).await?;

        tracing::info!(account_id, scope = %scope, expiry = %token.expiry, "Token issued");
        Ok(token)
    }

    /// Resolve a presented token to its account
    ///
    /// Returns `Ok(None)` when no live token of `scope` matches; expired and
    /// unknown tokens are indistinguishable. Strings that cannot be tokens are
    /// rejected without touching the store.
    pub async fn resolve_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<Option<Account>, AuthError> {
        if !is_valid_token_format(plaintext) {
            return Ok(None);
        }

        let hash = hash_token(plaintext);
        self.store(self.db.get_account_for_token(scope, &hash, Utc::now()))
            .await
    }

    /// Revoke every token of `scope` for an account
    ///
    /// Idempotent: revoking when none exist returns 0.
    pub async fn revoke_all(&self, account_id: i64, scope: TokenScope) -> Result<u64, AuthError> {
        let revoked = self
            .store(self.db.delete_tokens_for_account(account_id, scope))
            .await?;
        tracing::info!(account_id, scope = %scope, revoked, "Tokens revoked");
        Ok(revoked)
    }

    /// Replace an account's password and sign out all of its sessions
    ///
    /// Sessions are revoked before the new hash is written.
    pub async fn change_password(
        &self,
        account: &Account,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::InvalidRequest("password is required".into()));
        }
        if !account
            .credential
            .verify(current_password.to_string())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let credential = Credential::hashed(new_password.to_string()).await?;
        let hash = credential
            .hash()
            .ok_or_else(|| AuthError::Hashing("no hash produced".into()))?;

        self.revoke_all(account.id, TokenScope::Authentication)
            .await?;
        self.store(self.db.update_password(account.id, hash)).await?;
        tracing::info!(account_id = account.id, "Password changed");
        Ok(())
    }

    /// Apply profile changes to an account
    pub async fn update_profile(
        &self,
        mut account: Account,
        changes: AccountChanges,
    ) -> Result<Account, AuthError> {
        changes.apply_to(&mut account)?;
        account.updated_at = self
            .store(self.db.update_account(&account))
            .await
            .map_err(conflict_as_exists)?;
        Ok(account)
    }

    /// Delete an account together with all of its tokens
    pub async fn delete_account(&self, account_id: i64) -> Result<(), AuthError> {
        self.store(self.db.delete_account(account_id)).await?;
        tracing::info!(account_id, "Account deleted");
        Ok(())
    }

    /// Remove token rows that can no longer resolve
    pub async fn purge_expired_tokens(&self) -> Result<u64, AuthError> {
        let purged = self
            .store(self.db.delete_expired_tokens(Utc::now()))
            .await?;
        if purged > 0 {
            tracing::debug!(purged, "Expired tokens purged");
        }
        Ok(purged)
    }

    /// Run a store call under the configured timeout
    async fn store<T>(
        &self,
        call: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::Timeout),
        }
    }
}

fn conflict_as_exists(err: AuthError) -> AuthError {
    match err {
        AuthError::Storage(DbError::ConstraintViolation(_)) => AuthError::AccountExists,
        other => other,
    }
}
