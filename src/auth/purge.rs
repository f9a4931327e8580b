//! Periodic removal of expired tokens
//!
//! Expired tokens never resolve, so purging only reclaims space. The task runs
//! until a shutdown signal is broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::database::Database;

use super::AuthManager;

/// Background task that purges expired tokens on a fixed interval
pub struct TokenPurger<D: Database> {
    auth_manager: Arc<AuthManager<D>>,
    interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<D: Database + 'static> TokenPurger<D> {
    pub fn new(
        auth_manager: Arc<AuthManager<D>>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            auth_manager,
            interval,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signaled
    ///
    /// A failed purge is logged and retried on the next tick.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Token purge task started");

        let mut timer = interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    debug!("Token purge task shutting down");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(e) = self.auth_manager.purge_expired_tokens().await {
                        warn!(error = %e, "Failed to purge expired tokens");
                    }
                }
            }
        }
    }
}
