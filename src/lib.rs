//! tokengate - Bearer-token authentication service
//!
//! This crate issues opaque bearer tokens for password-authenticated accounts,
//! stores only their digests, and resolves the `Authorization` header of every
//! request to a caller identity.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod server;
