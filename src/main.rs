//! tokengate - Bearer-token authentication service
//!
//! This is the main entry point for the tokengate application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

use tokengate::auth::{AuthManager, TokenPurger};
use tokengate::config::Config;
use tokengate::database::SqliteDatabase;
use tokengate::logging::init_tracing;
use tokengate::server::{AppState, Server};

/// tokengate - Bearer-token authentication service
#[derive(Parser, Debug)]
#[command(name = "tokengate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "TOKENGATE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting tokengate");

    let database =
        SqliteDatabase::with_pool_size(&config.database.path, config.database.pool_size).await?;
    let database = Arc::new(database);
    info!(
        path = %config.database.path,
        pool_size = database.pool_size(),
        "Database initialized"
    );

    let auth_config = config.auth.to_auth_config();
    let auth_manager = Arc::new(AuthManager::new(Arc::clone(&database), auth_config));
    info!(
        token_ttl_secs = config.auth.token_ttl_secs,
        store_timeout_ms = config.auth.store_timeout_ms,
        "Authentication manager initialized"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let purge_handle = config.auth.purge_interval().map(|interval| {
        let purger = TokenPurger::new(Arc::clone(&auth_manager), interval, shutdown_tx.subscribe());
        tokio::spawn(purger.run())
    });

    let state = AppState { auth_manager };

    let server = Server::new(config.server.clone(), state);
    let shutdown = shutdown_signal(shutdown_tx.clone());

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown).await;

    // Stop background tasks if the server exited on its own
    let _ = shutdown_tx.send(());
    if let Some(handle) = purge_handle {
        let _ = handle.await;
    }

    info!("tokengate shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
///
/// Also notifies background tasks through `shutdown_tx`.
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
