//! Token generation and hashing
//!
//! A token is 32 bytes from the OS random source encoded as URL-safe Base64
//! without padding (43 characters). The database only ever sees the SHA-256
//! digest of that string. Tokens carry 256 bits of entropy, so a fast
//! unsalted digest is enough and lookups stay a single indexed query.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Datelike, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::models::{Token, TokenScope};

/// Length of the random part of the token in bytes
pub const TOKEN_RANDOM_BYTES: usize = 32;

/// Length of the encoded plaintext
pub const TOKEN_ENCODED_LEN: usize = 43;

/// Latest year an expiry may fall in; stored timestamps are four-digit years
pub const MAX_EXPIRY_YEAR: i32 = 9999;

/// Generate a new token for `account_id`
///
/// The returned token has its plaintext populated. The caller hands it to the
/// client once; it cannot be recovered from storage.
///
/// # Errors
///
/// Returns [`AuthError::TokenGeneration`] if the OS random source fails or
/// the expiry would fall past [`MAX_EXPIRY_YEAR`].
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use tokengate::auth::token::{generate_token, hash_token};
/// use tokengate::models::TokenScope;
///
/// let token = generate_token(1, Duration::hours(24), TokenScope::Authentication).unwrap();
/// assert_eq!(token.plaintext.len(), 43);
/// assert_eq!(token.hash, hash_token(&token.plaintext));
/// ```
pub fn generate_token(
    account_id: i64,
    ttl: Duration,
    scope: TokenScope,
) -> Result<Token, AuthError> {
    let expiry = Utc::now()
        .checked_add_signed(ttl)
        .filter(|expiry| expiry.year() <= MAX_EXPIRY_YEAR)
        .ok_or_else(|| {
            AuthError::TokenGeneration(format!("token lifetime out of range: {}", ttl))
        })?;

    let mut random_bytes = [0u8; TOKEN_RANDOM_BYTES];
    OsRng
        .try_fill_bytes(&mut random_bytes)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))?;

    let plaintext = URL_SAFE_NO_PAD.encode(random_bytes);
    let hash = hash_token(&plaintext);

    Ok(Token {
        plaintext,
        hash,
        account_id,
        expiry,
        scope,
    })
}

/// SHA-256 digest of a token's plaintext, as stored in the database
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Check if a string could be a token issued by [`generate_token`]
pub fn is_valid_token_format(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_ENCODED_LEN
        && URL_SAFE_NO_PAD
            .decode(plaintext)
            .map(|bytes| bytes.len() == TOKEN_RANDOM_BYTES)
            .unwrap_or(false)
}
