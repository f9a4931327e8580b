//! Authentication system for tokengate
//!
//! This module provides authentication functionality:
//! - Password credentials (Argon2id)
//! - Bearer token generation and hashing
//! - Account registration, login and token revocation
//! - Periodic purging of expired tokens

pub mod credential;
pub mod manager;
pub mod purge;
pub mod token;

pub use credential::Credential;
pub use manager::{AuthConfig, AuthManager, DEFAULT_STORE_TIMEOUT, DEFAULT_TOKEN_TTL};
pub use purge::TokenPurger;
pub use token::{generate_token, hash_token, is_valid_token_format, TOKEN_ENCODED_LEN};
