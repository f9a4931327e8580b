//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use tokengate::auth::{AuthConfig, AuthManager};
use tokengate::config::ServerConfig;
use tokengate::database::{Database, SqliteDatabase};
use tokengate::models::{Account, NewAccount};
use tokengate::server::{AppState, Server};

pub const ALICE_USERNAME: &str = "alice";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const ALICE_PASSWORD: &str = "Secr3t!";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Create a test authentication manager with default settings
pub fn create_test_auth_manager<D: Database>(db: Arc<D>) -> Arc<AuthManager<D>> {
    Arc::new(AuthManager::new(db, AuthConfig::default()))
}

/// Create a test authentication manager with a custom token lifetime
pub fn create_test_auth_manager_with_ttl<D: Database>(
    db: Arc<D>,
    token_ttl: std::time::Duration,
) -> Arc<AuthManager<D>> {
    let config = AuthConfig {
        token_ttl,
        ..Default::default()
    };
    Arc::new(AuthManager::new(db, config))
}

/// Register the standard test account
pub async fn register_alice<D: Database>(auth_manager: &AuthManager<D>) -> Account {
    auth_manager
        .register(NewAccount::new(ALICE_USERNAME, ALICE_EMAIL, ALICE_PASSWORD))
        .await
        .expect("Failed to register alice")
}

/// Create a test application state
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    let database = create_test_database().await;
    let auth_manager = create_test_auth_manager(database);
    AppState { auth_manager }
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Let OS assign a free port
    }
}

/// Create a test server
pub async fn create_test_server() -> (Server<SqliteDatabase>, AppState<SqliteDatabase>) {
    let state = create_test_state().await;
    let config = create_test_server_config();
    let server = Server::new(config, state.clone());
    (server, state)
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let server = Server::new(create_test_server_config(), state);
    let listener = server.bind().await.expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}
