//! Domain models for tokengate
//!
//! This module contains the account, token and identity types shared by the
//! authentication layers.

pub mod account;
pub mod identity;
pub mod token;

// Re-export commonly used types
pub use account::{Account, AccountChanges, NewAccount};
pub use identity::Identity;
pub use token::{Token, TokenScope};
