//! HTTP router for tokengate
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Account registration and profile management
//! - Issuing and revoking authentication tokens

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::middleware::{
    authenticate, logging_middleware, require_identified, AuthResponse, CurrentAccount, JsonBody,
};
use crate::auth::AuthManager;
use crate::database::Database;
use crate::error::AuthError;
use crate::models::{AccountChanges, Identity, NewAccount, TokenScope};

/// Shared application state
pub struct AppState<D: Database> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager<D>>,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(), AuthError> {
        if self.username.is_empty() {
            return Err(AuthError::InvalidRequest("username is required".into()));
        }
        if self.password.is_empty() {
            return Err(AuthError::InvalidRequest("password is required".into()));
        }
        Ok(())
    }
}

/// Password change request
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Build the main application router
///
/// Every route runs behind the authentication pipeline. Routes that need an
/// account are additionally guarded by [`require_identified`].
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    Router::new()
        // Open to anonymous callers
        .route("/health", get(health_handler))
        .route("/whoami", get(whoami_handler))
        .route("/users", post(register_handler::<D>))
        // Account routes
        .route(
            "/users/me",
            get(get_me_handler)
                .put(update_me_handler::<D>)
                .delete(delete_me_handler::<D>)
                .route_layer(middleware::from_fn(require_identified)),
        )
        .route(
            "/users/me/password",
            put(change_password_handler::<D>)
                .route_layer(middleware::from_fn(require_identified)),
        )
        // Token routes
        .route(
            "/tokens/authentication",
            post(login_handler::<D>).merge(
                delete(revoke_tokens_handler::<D>)
                    .route_layer(middleware::from_fn(require_identified)),
            ),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_manager),
            authenticate::<D>,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

// =============================================================================
// Health Handlers
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Report who the caller is
async fn whoami_handler(identity: Identity) -> impl IntoResponse {
    match identity {
        Identity::Anonymous => Json(serde_json::json!({ "anonymous": true })),
        Identity::Account(account) => Json(serde_json::json!({
            "anonymous": false,
            "user": account
        })),
    }
}

// =============================================================================
// Account Handlers
// =============================================================================

/// Registration handler
async fn register_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    JsonBody(req): JsonBody<NewAccount>,
) -> Result<impl IntoResponse, AuthResponse> {
    let account = state.auth_manager.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "user": account })),
    ))
}

/// Current account handler
async fn get_me_handler(CurrentAccount(account): CurrentAccount) -> impl IntoResponse {
    Json(serde_json::json!({ "user": account }))
}

/// Profile update handler
async fn update_me_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentAccount(account): CurrentAccount,
    JsonBody(changes): JsonBody<AccountChanges>,
) -> Result<impl IntoResponse, AuthResponse> {
    let account = state.auth_manager.update_profile(account, changes).await?;

    Ok(Json(serde_json::json!({ "user": account })))
}

/// Account deletion handler
async fn delete_me_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentAccount(account): CurrentAccount,
) -> Result<StatusCode, AuthResponse> {
    state.auth_manager.delete_account(account.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Password change handler
async fn change_password_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentAccount(account): CurrentAccount,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode, AuthResponse> {
    state
        .auth_manager
        .change_password(&account, &req.current_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Token Handlers
// =============================================================================

/// Login handler
async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AuthResponse> {
    req.validate()?;
    let token = state
        .auth_manager
        .login(&req.username, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "auth_token": token })),
    ))
}

/// Sign out everywhere
async fn revoke_tokens_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentAccount(account): CurrentAccount,
) -> Result<StatusCode, AuthResponse> {
    state
        .auth_manager
        .revoke_all(account.id, TokenScope::Authentication)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_token, hash_token, AuthConfig, Credential};
    use crate::database::MockDatabase;
    use crate::error::DbError;
    use crate::models::Account;
    use axum::http::{header, HeaderValue};
    use axum_test::TestServer;
    use chrono::Utc;

    fn alice(password: Option<&str>) -> Account {
        let mut credential = Credential::default();
        if let Some(password) = password {
            credential.set(password).unwrap();
        }
        Account {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            credential,
            bio: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn create_test_state(mock_db: MockDatabase) -> AppState<MockDatabase> {
        let db = Arc::new(mock_db);
        let auth_manager = Arc::new(AuthManager::new(db, AuthConfig::default()));
        AppState { auth_manager }
    }

    fn create_test_server(mock_db: MockDatabase) -> TestServer {
        TestServer::new(build_router(create_test_state(mock_db))).unwrap()
    }

    /// Mock whose token lookups always resolve to alice
    fn identified_db() -> (MockDatabase, HeaderValue) {
        let token =
            generate_token(1, chrono::Duration::hours(1), TokenScope::Authentication).unwrap();
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_get_account_for_token()
            .returning(|_, _, _| Ok(Some(alice(Some("Secr3t!")))));
        let value = HeaderValue::from_str(&format!("Bearer {}", token.plaintext)).unwrap();
        (mock_db, value)
    }

    // Test 1: Health endpoint returns OK
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let server = create_test_server(MockDatabase::new());

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert!(!body.version.is_empty());
        assert!(response.headers().get(header::VARY).is_some());
    }

    // Test 2: Registration returns 201 without the credential
    #[tokio::test]
    async fn test_register_endpoint() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_create_account().returning(|account| {
            let mut stored = account.clone();
            stored.id = 7;
            Ok(stored)
        });
        let server = create_test_server(mock_db);

        let response = server
            .post("/users")
            .json(&serde_json::json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "Secr3t!"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["id"], 7);
        assert_eq!(body["user"]["username"], "alice");
        assert!(!body.to_string().contains("argon2"));
        assert!(!body.to_string().contains("Secr3t!"));
    }

    // Test 3: Registration validation errors are 422
    #[tokio::test]
    async fn test_register_validation() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_create_account().never();
        let server = create_test_server(mock_db);

        let response = server
            .post("/users")
            .json(&serde_json::json!({ "username": "alice", "password": "Secr3t!" }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "email is required");
    }

    // Test 4: Unparsable bodies get the JSON error envelope
    #[tokio::test]
    async fn test_malformed_body_is_422_envelope() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_create_account().never();
        mock_db.expect_get_account_by_username().never();
        let server = create_test_server(mock_db);

        for path in ["/users", "/tokens/authentication"] {
            let response = server
                .post(path)
                .text("{not json")
                .content_type("application/json")
                .await;
            response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

            let body: serde_json::Value = response.json();
            assert_eq!(
                body,
                serde_json::json!({ "error": "invalid request payload" })
            );
        }

        // Missing content type is handled the same way
        let response = server
            .post("/users")
            .bytes(r#"{"username":"alice"}"#.into())
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid request payload");
    }

    // Test 5: Duplicate registration is 409
    #[tokio::test]
    async fn test_register_duplicate() {
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_create_account()
            .returning(|_| Err(DbError::ConstraintViolation("UNIQUE".into())));
        let server = create_test_server(mock_db);

        let response = server
            .post("/users")
            .json(&serde_json::json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "Secr3t!"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    // Test 6: Login returns the token and its expiry
    #[tokio::test]
    async fn test_login_endpoint() {
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_get_account_by_username()
            .returning(|_| Ok(Some(alice(Some("Secr3t!")))));
        mock_db
            .expect_insert_token()
            .withf(|token| token.hash == hash_token(&token.plaintext))
            .returning(|_| Ok(()));
        let server = create_test_server(mock_db);

        let response = server
            .post("/tokens/authentication")
            .json(&serde_json::json!({ "username": "alice", "password": "Secr3t!" }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        let token = body["auth_token"]["token"].as_str().unwrap();
        assert_eq!(token.len(), 43);
        assert!(body["auth_token"]["expiry"].is_string());
        assert!(body["auth_token"].get("hash").is_none());
    }

    // Test 7: Wrong password and unknown user look the same
    #[tokio::test]
    async fn test_login_invalid_credentials() {
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_get_account_by_username()
            .returning(|username| {
                Ok((username == "alice").then(|| alice(Some("Secr3t!"))))
            });
        mock_db.expect_insert_token().never();
        let server = create_test_server(mock_db);

        for (username, password) in [("alice", "wrong"), ("mallory", "Secr3t!")] {
            let response = server
                .post("/tokens/authentication")
                .json(&serde_json::json!({ "username": username, "password": password }))
                .await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: serde_json::Value = response.json();
            assert_eq!(body["error"], "invalid credentials");
        }
    }

    // Test 8: Anonymous callers are rejected from account routes
    #[tokio::test]
    async fn test_account_routes_require_identity() {
        let server = create_test_server(MockDatabase::new());

        server
            .get("/users/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .delete("/users/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .delete("/tokens/authentication")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .put("/users/me/password")
            .json(&serde_json::json!({}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 9: whoami reports anonymous and identified callers
    #[tokio::test]
    async fn test_whoami() {
        let (mock_db, auth) = identified_db();
        let server = create_test_server(mock_db);

        let body: serde_json::Value = server.get("/whoami").await.json();
        assert_eq!(body, serde_json::json!({ "anonymous": true }));

        let body: serde_json::Value = server
            .get("/whoami")
            .add_header(header::AUTHORIZATION, auth)
            .await
            .json();
        assert_eq!(body["anonymous"], false);
        assert_eq!(body["user"]["username"], "alice");
    }

    // Test 10: GET /users/me returns the caller's account
    #[tokio::test]
    async fn test_get_me() {
        let (mock_db, auth) = identified_db();
        let server = create_test_server(mock_db);

        let response = server
            .get("/users/me")
            .add_header(header::AUTHORIZATION, auth)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["email"], "alice@example.com");
    }

    // Test 11: PUT /users/me updates the profile
    #[tokio::test]
    async fn test_update_me() {
        let (mut mock_db, auth) = identified_db();
        mock_db
            .expect_update_account()
            .withf(|account| account.bio == "cyclist")
            .returning(|_| Ok(Utc::now()));
        let server = create_test_server(mock_db);

        let response = server
            .put("/users/me")
            .add_header(header::AUTHORIZATION, auth)
            .json(&serde_json::json!({ "bio": "cyclist" }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["bio"], "cyclist");
    }

    // Test 12: DELETE /tokens/authentication revokes the caller's tokens
    #[tokio::test]
    async fn test_revoke_tokens() {
        let (mut mock_db, auth) = identified_db();
        mock_db
            .expect_delete_tokens_for_account()
            .withf(|id, scope| *id == 1 && *scope == TokenScope::Authentication)
            .times(1)
            .returning(|_, _| Ok(1));
        let server = create_test_server(mock_db);

        server
            .delete("/tokens/authentication")
            .add_header(header::AUTHORIZATION, auth)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    // Test 13: PUT /users/me/password changes the password
    #[tokio::test]
    async fn test_change_password() {
        let (mut mock_db, auth) = identified_db();
        mock_db
            .expect_update_password()
            .times(1)
            .returning(|_, _| Ok(()));
        mock_db
            .expect_delete_tokens_for_account()
            .times(1)
            .returning(|_, _| Ok(1));
        let server = create_test_server(mock_db);

        server
            .put("/users/me/password")
            .add_header(header::AUTHORIZATION, auth)
            .json(&serde_json::json!({
                "current_password": "Secr3t!",
                "new_password": "N3w-Secr3t!"
            }))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    // Test 14: DELETE /users/me removes the account
    #[tokio::test]
    async fn test_delete_me() {
        let (mut mock_db, auth) = identified_db();
        mock_db
            .expect_delete_account()
            .withf(|id| *id == 1)
            .times(1)
            .returning(|_| Ok(()));
        let server = create_test_server(mock_db);

        server
            .delete("/users/me")
            .add_header(header::AUTHORIZATION, auth)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
