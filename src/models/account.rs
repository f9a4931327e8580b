//! Account models
//!
//! An account owns exactly one credential. The credential never appears in
//! any serialized representation.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Credential;
use crate::error::AuthError;

/// Maximum username length accepted at registration
pub const MAX_USERNAME_LEN: usize = 50;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID
    pub id: i64,

    /// Unique login name
    pub username: String,

    /// Unique email address
    pub email: String,

    /// Password credential
    #[serde(skip)]
    pub credential: Credential,

    /// Free-form profile text
    pub bio: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

/// Registration request
#[derive(Clone, Deserialize)]
pub struct NewAccount {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub bio: String,
}

impl NewAccount {
    /// Create a registration request
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            bio: String::new(),
        }
    }

    /// Check required fields and formats
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AuthError::InvalidRequest("password is required".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("bio", &self.bio)
            .finish_non_exhaustive()
    }
}

/// Partial profile update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

impl AccountChanges {
    /// Validate and apply the changes to `account`
    pub fn apply_to(self, account: &mut Account) -> Result<(), AuthError> {
        if let Some(username) = self.username {
            validate_username(&username)?;
            account.username = username;
        }
        if let Some(email) = self.email {
            validate_email(&email)?;
            account.email = email;
        }
        if let Some(bio) = self.bio {
            account.bio = bio;
        }
        Ok(())
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidRequest("username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::InvalidRequest(format!(
            "username cannot be longer than {} characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::InvalidRequest("email is required".into()));
    }
    if !email_regex().is_match(email) {
        return Err(AuthError::InvalidRequest("invalid email format".into()));
    }
    Ok(())
}

fn email_regex() -> &'static regex_lite::Regex {
    static EMAIL: OnceLock<regex_lite::Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        regex_lite::Regex::new(EMAIL_PATTERN).expect("Invalid regex pattern for email")
    })
}
