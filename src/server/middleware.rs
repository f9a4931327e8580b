//! HTTP middleware for tokengate
//!
//! This module provides:
//! - The authentication pipeline (`Authorization: Bearer <token>` to [`Identity`])
//! - A guard for routes that require an identified caller
//! - Extractors that hand the resolved identity to handlers
//! - A JSON body extractor whose rejections use the error envelope
//! - Request/response logging

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthManager;
use crate::database::Database;
use crate::error::{AuthError, ErrorKind};
use crate::models::{Account, Identity, TokenScope};

/// Authentication middleware function
///
/// This middleware:
/// 1. Treats a request without an Authorization header as anonymous
/// 2. Rejects any header that is not exactly `Bearer <token>`
/// 3. Resolves the token to an account, rejecting unknown or expired tokens
/// 4. Adds the resulting [`Identity`] to the request extensions
///
/// Every response, rejections included, carries `Vary: Authorization`.
pub async fn authenticate<D: Database + 'static>(
    State(auth_manager): State<Arc<AuthManager<D>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = identify(&auth_manager, request.headers()).await;

    let mut response = match identity {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => AuthResponse::from_error(e).into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Build the caller identity from request headers
pub async fn identify<D: Database>(
    auth_manager: &AuthManager<D>,
    headers: &HeaderMap,
) -> Result<Identity, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let token = parse_bearer(value)?;

    match auth_manager
        .resolve_token(TokenScope::Authentication, token)
        .await?
    {
        Some(account) => Ok(Identity::Account(account)),
        None => Err(AuthError::InvalidToken),
    }
}

/// Extract the token from an `Authorization` header value
///
/// The value must split on single spaces into exactly `Bearer` and one token.
pub fn parse_bearer(value: &HeaderValue) -> Result<&str, AuthError> {
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let parts: Vec<&str> = value.split(' ').collect();

    match parts.as_slice() {
        ["Bearer", token] => Ok(*token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Guard for routes that need an account
///
/// Must run after [`authenticate`].
pub async fn require_identified(request: Request, next: Next) -> Result<Response, AuthResponse> {
    match request.extensions().get::<Identity>() {
        Some(Identity::Account(_)) => Ok(next.run(request).await),
        Some(Identity::Anonymous) => Err(AuthError::IdentityRequired.into()),
        None => Err(AuthError::IdentityMissing.into()),
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AuthResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AuthError::IdentityMissing.into())
    }
}

/// Extractor for the identified caller's account
///
/// Rejects anonymous callers.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentAccount {
    type Rejection = AuthResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        identity
            .into_account()
            .map(CurrentAccount)
            .ok_or_else(|| AuthError::IdentityRequired.into())
    }
}

/// JSON request body
///
/// Like [`axum::Json`], but a missing content type or an unparsable body is
/// rejected as [`AuthError::InvalidRequest`] instead of axum's plain-text
/// rejection.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthResponse;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(request, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "Request body rejected");
                Err(AuthError::InvalidRequest("invalid request payload".into()).into())
            }
        }
    }
}

/// Error response for the HTTP boundary
#[derive(Debug)]
pub struct AuthResponse {
    status: StatusCode,
    message: String,
    challenge: bool,
}

impl AuthResponse {
    pub fn from_error(error: AuthError) -> Self {
        match error.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %error, "Request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal server error".to_string(),
                    challenge: false,
                }
            }
            ErrorKind::Validation if !matches!(error, AuthError::MalformedHeader) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: error.to_string(),
                challenge: false,
            },
            ErrorKind::Conflict => Self {
                status: StatusCode::CONFLICT,
                message: error.to_string(),
                challenge: false,
            },
            _ => Self {
                status: StatusCode::UNAUTHORIZED,
                challenge: matches!(error, AuthError::MalformedHeader | AuthError::InvalidToken),
                message: error.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AuthError> for AuthResponse {
    fn from(error: AuthError) -> Self {
        Self::from_error(error)
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });
        let mut response = (self.status, axum::Json(body)).into_response();
        if self.challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
