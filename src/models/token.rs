//! Token-related domain models
//!
//! This module defines bearer tokens and the scopes that classify them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Purpose a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    /// Bearer tokens presented on ordinary requests
    Authentication,
}

impl TokenScope {
    /// Stable string stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer token
///
/// `plaintext` is handed to the client once, at creation. Only `hash` is
/// persisted, so the plaintext cannot be recovered afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Secret shown to the client
    #[serde(rename = "token")]
    pub plaintext: String,

    /// SHA-256 digest of the plaintext
    #[serde(skip)]
    pub hash: Vec<u8>,

    /// Owning account
    #[serde(skip)]
    pub account_id: i64,

    /// When the token stops resolving
    pub expiry: DateTime<Utc>,

    /// What the token may be used for
    #[serde(skip, default = "default_scope")]
    pub scope: TokenScope,
}

fn default_scope() -> TokenScope {
    TokenScope::Authentication
}

// Keep the secret out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}
