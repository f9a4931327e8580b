//! Password credentials
//!
//! Passwords are hashed with Argon2id and stored as PHC strings, which embed
//! the salt and cost parameters. The plaintext is never stored or logged.
//!
//! Hashing is CPU-bound, so the async entry points (`hashed`, `verify`) move
//! the work onto tokio's blocking pool.

use std::sync::OnceLock;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use crate::error::AuthError;

/// Argon2 memory cost in KiB
pub const MEMORY_COST_KIB: u32 = 19 * 1024;

/// Argon2 iterations
pub const TIME_COST: u32 = 2;

/// Argon2 lanes
pub const PARALLELISM: u32 = 1;

/// One-way password hash owned by an account
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    hash: Option<String>,
}

impl Credential {
    /// Wrap a stored PHC hash string
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
        }
    }

    /// Stored PHC hash, if one has been set
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Hash `plaintext` and store the result
    ///
    /// Fails with [`AuthError::Hashing`] only if the hasher itself fails.
    pub fn set(&mut self, plaintext: &str) -> Result<(), AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        self.hash = Some(hash.to_string());
        Ok(())
    }

    /// Check `plaintext` against the stored hash
    ///
    /// A wrong password is `Ok(false)`, not an error. A credential without a
    /// hash never matches.
    pub fn matches(&self, plaintext: &str) -> Result<bool, AuthError> {
        let Some(stored) = self.hash.as_deref() else {
            return Ok(false);
        };
        verify_against(stored, plaintext)
    }

    /// Build a credential for `plaintext` on the blocking pool
    pub async fn hashed(plaintext: String) -> Result<Self, AuthError> {
        tokio::task::spawn_blocking(move || {
            let mut credential = Credential::default();
            credential.set(&plaintext)?;
            Ok(credential)
        })
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    /// [`Credential::matches`] on the blocking pool
    pub async fn verify(&self, plaintext: String) -> Result<bool, AuthError> {
        let credential = self.clone();
        tokio::task::spawn_blocking(move || credential.matches(&plaintext))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    /// Spend the same work as a real verification when there is no account
    ///
    /// Keeps the response time of "unknown user" in line with "wrong password".
    pub async fn verify_dummy(plaintext: String) {
        let _ = tokio::task::spawn_blocking(move || {
            if let Some(stored) = dummy_hash() {
                let _ = verify_against(stored, &plaintext);
            }
        })
        .await;
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("hash", &self.hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn hasher() -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn verify_against(stored: &str, plaintext: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Hashing(e.to_string()))?;

    match hasher()?.verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Hashing(e.to_string())),
    }
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| {
            let mut credential = Credential::default();
            credential.set("tokengate-dummy-password").ok()?;
            credential.hash
        })
        .as_deref()
}
