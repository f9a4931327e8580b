//! HTTP server components for tokengate
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Authentication and logging middleware
//! - Server lifecycle management

pub mod middleware;
pub mod router;

pub use middleware::{
    authenticate, identify, parse_bearer, require_identified, AuthResponse, CurrentAccount,
    JsonBody,
};
pub use router::{build_router, AppState, HealthResponse};

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::database::Database;

/// The router with request tracing applied
pub fn build_app<D: Database + 'static>(state: AppState<D>) -> Router {
    build_router(state).layer(tower_http::trace::TraceLayer::new_for_http())
}

/// HTTP Server for tokengate
///
/// Binds the configured host and port and serves the authenticated router
/// until a shutdown future resolves.
pub struct Server<D: Database + 'static> {
    config: ServerConfig,
    state: AppState<D>,
}

impl<D: Database + 'static> Server<D> {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState<D>) -> Self {
        Self { config, state }
    }

    /// Bind the configured address
    ///
    /// Host names such as `localhost` are resolved.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let ServerConfig { host, port } = &self.config;
        TcpListener::bind((host.as_str(), *port))
            .await
            .map_err(|e| ServerError::Bind(format!("{}:{}: {}", host, port, e)))
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// In-flight requests are allowed to finish once `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        tracing::info!(%addr, "Server listening");

        axum::serve(listener, build_app(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),
}
