//! pricebatch - a bulk price-lookup engine
//!
//! Callers open a session with an upstream credential, submit large batches
//! of product identifiers, and poll results incrementally while a bounded
//! worker pool drains chunked lookups through a per-session rate limiter.
//!
//! # Features
//!
//! - **Sessions**: caller-scoped work units with TTL-based expiry
//! - **Chunking**: submissions split into bounded chunks, scheduled fairly
//!   round-robin across sessions
//! - **Workers**: a fixed pool with a hard ceiling on concurrent outbound
//!   lookups, retrying transient failures with jittered backoff
//! - **Rate limiting**: per-session token buckets via governor
//! - **Results**: incremental, idempotent writes polled by session id
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pricebatch::{Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Initialize logging
//!     pricebatch::init_tracing();
//!
//!     // Load config and start the engine
//!     let config = Config::from_env();
//!     let engine = Engine::new(config)?;
//!
//!     // Serve the HTTP API until interrupted
//!     engine.serve().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
mod app;
mod clock;
mod config;
mod error;
pub mod lookup;
pub mod parse;
pub mod ratelimit;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod utils;
pub mod worker;

// Re-exports for public API
pub use app::{AppContext, Engine};
pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use error::{PricebatchError, Result};
pub use lookup::{
    HttpPriceClient, LookupConfig, LookupError, LookupOutcome, LookupReply, LookupResult,
    PriceClient, ProductDetails, RetryDecision, RetryPolicy,
};
pub use parse::{ParsedIdentifiers, parse_identifiers};
pub use ratelimit::{RateLimitConfig, RateLimitConfigBuilder, SessionRateLimiter};
pub use scheduler::{Chunk, ChunkQueue, ChunkStatus};
pub use session::{Progress, SessionConfig, SessionManager, SessionState, SubmitReceipt};
pub use store::{InMemoryResultStore, ResultStore};
pub use worker::{LookupWorker, WorkerConfig, WorkerPool};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early, typically in main() before creating the
/// Engine.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "pricebatch=debug")
/// - `PRICEBATCH_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("PRICEBATCH_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
