//! Error types for tokengate
//!
//! This module defines the error taxonomy shared by the credential, token,
//! storage and pipeline layers. All error types use `thiserror`.
//!
//! Only the outermost HTTP boundary (`server::middleware::AuthResponse`) turns
//! these into status codes; everything below returns typed outcomes.

use thiserror::Error;

/// Broad classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed header or request body. Client fault, do not retry.
    Validation,
    /// Wrong credentials or an invalid/expired token. Deliberately vague.
    Authentication,
    /// A valid identity that may not perform the operation.
    Authorization,
    /// Uniqueness conflict (username or email already taken).
    Conflict,
    /// Storage, hashing or randomness failure. Server fault.
    Internal,
}

/// Authentication-related errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Authorization header does not have the form `Bearer <token>`
    #[error("invalid authorization header")]
    MalformedHeader,

    /// Request payload failed validation
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown username or wrong password
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token does not exist, has expired, or has the wrong scope
    #[error("invalid or expired token")]
    InvalidToken,

    /// Anonymous caller on a route that requires an account
    #[error("you must be logged in to access this route")]
    IdentityRequired,

    /// No identity was attached to the request by the pipeline
    #[error("no identity established for request")]
    IdentityMissing,

    /// Username or email already in use
    #[error("username or email already taken")]
    AccountExists,

    /// Password hashing or verification failed
    #[error("hashing failed: {0}")]
    Hashing(String),

    /// The random source could not produce a token
    #[error("token generation failed: {0}")]
    TokenGeneration(String),

    /// Store call did not finish in time
    #[error("storage timed out")]
    Timeout,

    /// Underlying storage failure
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl AuthError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MalformedHeader | AuthError::InvalidRequest(_) => ErrorKind::Validation,
            AuthError::InvalidCredentials | AuthError::InvalidToken => ErrorKind::Authentication,
            AuthError::IdentityRequired => ErrorKind::Authorization,
            AuthError::AccountExists => ErrorKind::Conflict,
            AuthError::IdentityMissing
            | AuthError::Hashing(_)
            | AuthError::TokenGeneration(_)
            | AuthError::Timeout
            | AuthError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection thread error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => classify_sqlite(e),
            other => DbError::Connection(other.to_string()),
        }
    }
}

/// Map unique/foreign key failures to `ConstraintViolation`
fn classify_sqlite(err: rusqlite::Error) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref msg)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::ConstraintViolation(msg.clone().unwrap_or_else(|| failure.to_string()))
        }
        other => DbError::Sqlite(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(
            AuthError::MalformedHeader.to_string(),
            "invalid authorization header"
        );
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
        assert_eq!(
            AuthError::InvalidToken.to_string(),
            "invalid or expired token"
        );
        assert_eq!(
            AuthError::IdentityRequired.to_string(),
            "you must be logged in to access this route"
        );
    }

    #[test]
    fn test_auth_error_kinds() {
        assert_eq!(AuthError::MalformedHeader.kind(), ErrorKind::Validation);
        assert_eq!(
            AuthError::InvalidRequest("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AuthError::InvalidCredentials.kind(),
            ErrorKind::Authentication
        );
        assert_eq!(AuthError::InvalidToken.kind(), ErrorKind::Authentication);
        assert_eq!(AuthError::IdentityRequired.kind(), ErrorKind::Authorization);
        assert_eq!(AuthError::AccountExists.kind(), ErrorKind::Conflict);
        assert_eq!(AuthError::IdentityMissing.kind(), ErrorKind::Internal);
        assert_eq!(AuthError::Timeout.kind(), ErrorKind::Internal);
        assert_eq!(
            AuthError::Storage(DbError::NotFound).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_auth_error_from_db_error() {
        let err: AuthError = DbError::NotFound.into();
        assert!(matches!(err, AuthError::Storage(DbError::NotFound)));
    }

    #[test]
    fn test_db_error_messages() {
        assert_eq!(DbError::NotFound.to_string(), "Record not found");
        assert_eq!(
            DbError::ConstraintViolation("unique".to_string()).to_string(),
            "Constraint violation: unique"
        );
        assert_eq!(
            DbError::Migration("v2 failed".to_string()).to_string(),
            "Migration error: v2 failed"
        );
    }
}
