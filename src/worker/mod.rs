//! Lookup worker pool
//!
//! A fixed number of workers drain the shared chunk queue. Each worker
//! polls for the next chunk, resolves every identifier in it through the
//! rate limiter and the price client, and records results as they land.
//! A global semaphore sized to the pool caps concurrent outbound lookups
//! even when chunks run with internal sub-concurrency.

mod config;


pub use config::WorkerConfig;

use crate::clock::Clock;
use crate::lookup::{
    LookupError, LookupReply, LookupResult, PriceClient, RetryDecision, RetryPolicy,
};
use crate::ratelimit::SessionRateLimiter;
use crate::scheduler::{Chunk, ChunkQueue, ChunkStatus};
use crate::session::SessionManager;
use futures::stream::{self, StreamExt};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Duration, sleep};

/// A single worker that processes chunks from the shared queue
pub struct LookupWorker {
    queue: Arc<ChunkQueue>,
    sessions: Arc<SessionManager>,
    limiter: Arc<SessionRateLimiter>,
    client: Arc<dyn PriceClient>,
    /// Global cap on concurrent outbound lookups, shared by the pool
    permits: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    chunk_concurrency: usize,
    worker_id: String,
    shutdown_tx: mpsc::Sender<()>,
}

impl LookupWorker {
    /// Create a new lookup worker
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<ChunkQueue>,
        sessions: Arc<SessionManager>,
        limiter: Arc<SessionRateLimiter>,
        client: Arc<dyn PriceClient>,
        permits: Arc<Semaphore>,
        clock: Arc<dyn Clock>,
        config: &WorkerConfig,
        worker_id: String,
    ) -> (Self, mpsc::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                queue,
                sessions,
                limiter,
                client,
                permits,
                clock,
                policy: RetryPolicy::new(
                    config.max_retries,
                    config.retry_base_delay_ms,
                    config.retry_max_delay_ms,
                ),
                chunk_concurrency: config.chunk_concurrency.max(1),
                worker_id,
                shutdown_tx,
            },
            shutdown_rx,
        )
    }

    /// Start the worker and begin draining chunks
    ///
    /// Runs until shutdown is requested via the shutdown channel.
    pub async fn start(self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(worker_id = %self.worker_id, "Lookup worker started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(worker_id = %self.worker_id, "Shutdown signal received, finishing current chunk...");
                    break;
                }
                processed = Box::pin(self.process_next_chunk()) => {
                    if processed.is_none() {
                        // No chunk available, wait a bit before polling again
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            _ = sleep(Duration::from_millis(100)) => {},
                        }
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Lookup worker stopped");
    }

    /// Process the next available chunk from the queue
    ///
    /// Returns the chunk's sequence number, or `None` when the queue is
    /// empty.
    async fn process_next_chunk(&self) -> Option<u64> {
        let mut chunk = self.queue.pop_next().await?;
        let sequence = chunk.sequence;

        tracing::debug!(
            worker_id = %self.worker_id,
            session_id = %chunk.session_id,
            chunk = sequence,
            size = chunk.len(),
            "Processing chunk"
        );

        match self.sessions.auth_token(&chunk.session_id).await {
            Some(token) => self.process_chunk(&chunk, token).await,
            None => {
                // Session expired or was removed after this chunk was queued
                tracing::debug!(
                    worker_id = %self.worker_id,
                    session_id = %chunk.session_id,
                    chunk = sequence,
                    "Discarding chunk for defunct session"
                );
            }
        }

        chunk.status = ChunkStatus::Done;
        tracing::debug!(
            worker_id = %self.worker_id,
            session_id = %chunk.session_id,
            chunk = sequence,
            "Chunk done"
        );
        self.sessions.chunk_done(&chunk.session_id).await;
        Some(sequence)
    }

    /// Resolve every identifier in a chunk
    ///
    /// Identifiers are dispatched in submission order with bounded
    /// sub-concurrency; each result is recorded as soon as it lands.
    async fn process_chunk(&self, chunk: &Chunk, token: Arc<SecretString>) {
        stream::iter(chunk.identifiers.iter().enumerate())
            .map(|(offset, identifier)| {
                let token = token.clone();
                Box::pin(async move {
                    let position = chunk.base_position + offset as u64;
                    let result = self
                        .process_identifier(&chunk.session_id, &token, identifier, position)
                        .await;
                    self.sessions.record_result(&chunk.session_id, result).await;
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>
            })
            .buffered(self.chunk_concurrency)
            .collect::<Vec<_>>()
            .await;
    }

    /// Resolve one identifier to a terminal result
    async fn process_identifier(
        &self,
        session_id: &str,
        token: &SecretString,
        identifier: &str,
        position: u64,
    ) -> LookupResult {
        let mut attempts: u32 = 0;

        loop {
            // Once the credential is known bad, burn no more lookups on it
            if self.sessions.auth_invalid(session_id).await {
                return LookupResult::failed(
                    identifier,
                    position,
                    "session credential rejected by upstream",
                    attempts,
                    self.clock.now(),
                );
            }

            if self.limiter.acquire(session_id).await.is_err() {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    session_id = %session_id,
                    identifier = %identifier,
                    "Rate-limit wait exceeded"
                );
                return LookupResult::failed(
                    identifier,
                    position,
                    "rate-limit wait exceeded",
                    attempts,
                    self.clock.now(),
                );
            }

            attempts += 1;

            let reply = {
                let permit = match self.permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return LookupResult::failed(
                            identifier,
                            position,
                            "worker pool shutting down",
                            attempts,
                            self.clock.now(),
                        );
                    }
                };
                let reply = self.client.fetch(token, identifier).await;
                drop(permit);
                reply
            };

            match reply {
                Ok(LookupReply::Found(details)) => {
                    return LookupResult::success(
                        identifier,
                        position,
                        details,
                        attempts,
                        self.clock.now(),
                    );
                }
                Ok(LookupReply::NotCarried) => {
                    return LookupResult::not_found(
                        identifier,
                        position,
                        attempts,
                        self.clock.now(),
                    );
                }
                Err(LookupError::AuthInvalid) => {
                    self.sessions.flag_auth_invalid(session_id).await;
                    return LookupResult::failed(
                        identifier,
                        position,
                        "upstream rejected the session credential",
                        attempts,
                        self.clock.now(),
                    );
                }
                Err(LookupError::Transient(reason)) => match self.policy.decide(attempts) {
                    RetryDecision::Retry(delay) => {
                        tracing::warn!(
                            worker_id = %self.worker_id,
                            session_id = %session_id,
                            identifier = %identifier,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %reason,
                            "Retrying lookup after transient failure"
                        );
                        sleep(delay).await;
                    }
                    RetryDecision::GiveUp => {
                        return LookupResult::failed(
                            identifier,
                            position,
                            reason,
                            attempts,
                            self.clock.now(),
                        );
                    }
                },
            }
        }
    }

    /// Request shutdown of this worker
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Pool of workers draining the shared chunk queue concurrently
pub struct WorkerPool {
    workers: Vec<tokio::task::JoinHandle<()>>,
    shutdown_txs: Vec<mpsc::Sender<()>>,
}

impl WorkerPool {
    /// Create a new worker pool and start its workers
    pub fn new(
        config: &WorkerConfig,
        queue: Arc<ChunkQueue>,
        sessions: Arc<SessionManager>,
        limiter: Arc<SessionRateLimiter>,
        client: Arc<dyn PriceClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let worker_count = config.max_workers.max(1);
        let permits = Arc::new(Semaphore::new(worker_count));

        let mut workers = Vec::new();
        let mut shutdown_txs = Vec::new();

        for i in 0..worker_count {
            let worker_id = format!("worker-{}", i);
            let (worker, shutdown_rx) = LookupWorker::new(
                queue.clone(),
                sessions.clone(),
                limiter.clone(),
                client.clone(),
                permits.clone(),
                clock.clone(),
                config,
                worker_id,
            );
            let shutdown_tx = worker.shutdown_tx.clone();

            let handle = tokio::spawn(Box::pin(async move {
                worker.start(shutdown_rx).await;
            }));

            workers.push(handle);
            shutdown_txs.push(shutdown_tx);
        }

        Self {
            workers,
            shutdown_txs,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Shutdown all workers gracefully
    ///
    /// Sends shutdown signals to all workers and waits for them to finish
    /// processing their current chunks.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down worker pool...");

        for shutdown_tx in self.shutdown_txs {
            let _ = shutdown_tx.send(()).await;
        }

        for worker in self.workers {
            let _ = worker.await;
        }

        tracing::info!("Worker pool shut down");
    }
}
