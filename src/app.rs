//! Engine wiring and lifecycle
//!
//! The Engine owns every long-lived piece: the session manager, the chunk
//! queue, the worker pool, the expiry sweeper, and the result store. It
//! builds the HTTP router and coordinates a controlled shutdown (workers
//! first, then the sweeper, then a store flush).

use crate::api;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{PricebatchError, Result};
use crate::lookup::{HttpPriceClient, PriceClient};
use crate::ratelimit::SessionRateLimiter;
use crate::scheduler::ChunkQueue;
use crate::session::SessionManager;
use crate::store::{InMemoryResultStore, ResultStore};
use crate::worker::WorkerPool;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Shared state handed to API handlers
#[derive(Clone)]
pub struct AppContext {
    pub sessions: Arc<SessionManager>,
    pub store: Arc<dyn ResultStore>,
}

/// The assembled processing engine
pub struct Engine {
    config: Config,
    ctx: AppContext,
    pool: WorkerPool,
    sweeper_shutdown: Arc<Notify>,
    sweeper: JoinHandle<()>,
}

impl Engine {
    /// Build an engine with the real HTTP price client and system clock
    pub fn new(config: Config) -> Result<Self> {
        let client = Arc::new(HttpPriceClient::new(&config.lookup)?);
        Ok(Self::with_parts(config, client, Arc::new(SystemClock)))
    }

    /// Build an engine with injected collaborators
    ///
    /// Tests substitute a fake price client and a manual clock here; the
    /// wiring is otherwise identical to production.
    pub fn with_parts(
        config: Config,
        client: Arc<dyn PriceClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue = Arc::new(ChunkQueue::new());
        let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());

        let sessions = Arc::new(SessionManager::new(
            config.session.clone(),
            queue.clone(),
            store.clone(),
            clock.clone(),
        ));

        let limiter = Arc::new(SessionRateLimiter::new(&config.rate_limit));

        let pool = WorkerPool::new(
            &config.worker,
            queue,
            sessions.clone(),
            limiter,
            client,
            clock.clone(),
        );

        let sweeper_shutdown = Arc::new(Notify::new());
        let sweeper = spawn_sweeper(
            sessions.clone(),
            clock,
            config.session.sweep_interval_secs,
            sweeper_shutdown.clone(),
        );

        Self {
            config,
            ctx: AppContext { sessions, store },
            pool,
            sweeper_shutdown,
            sweeper,
        }
    }

    pub fn context(&self) -> AppContext {
        self.ctx.clone()
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        self.ctx.sessions.clone()
    }

    /// Build the HTTP router backed by this engine
    pub fn router(&self) -> Router {
        api::router(self.context())
    }

    /// Serve the HTTP API until interrupted, then shut down cleanly
    pub async fn serve(self) -> Result<()> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| PricebatchError::internal(format!("invalid server address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PricebatchError::internal(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(%addr, workers = self.pool.worker_count(), "pricebatch listening");

        let router = self.router();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        self.shutdown().await;

        served.map_err(|e| PricebatchError::internal(format!("server error: {e}")))
    }

    /// Controlled shutdown: stop workers, stop the sweeper, flush the store
    pub async fn shutdown(self) {
        self.pool.shutdown().await;

        self.sweeper_shutdown.notify_one();
        let abort = self.sweeper.abort_handle();
        match tokio::time::timeout(Duration::from_secs(5), self.sweeper).await {
            Ok(_) => tracing::debug!("Expiry sweeper stopped cleanly"),
            Err(_) => {
                tracing::warn!("Expiry sweeper did not stop within timeout");
                abort.abort();
            }
        }

        if let Err(e) = self.ctx.store.flush().await {
            tracing::error!(error = %e, "Failed to flush result store during shutdown");
        }

        tracing::info!("Engine shut down");
    }
}

fn spawn_sweeper(
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = interval.tick() => {
                    let expired = sessions.expire_idle(clock.now()).await;
                    if expired > 0 {
                        tracing::debug!(expired, "Expiry sweep finished");
                    }
                }
            }
        }

        tracing::debug!("Expiry sweeper stopped");
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
