//! Session lifecycle and ownership
//!
//! The SessionManager exclusively owns session state: identity, the
//! caller's credential, progress counters, and chunk accounting. Every
//! mutation goes through its methods so counter updates stay serialized.
//! Sessions move forward only: Active -> Draining -> Completed, or any of
//! those -> Expired; there is no resurrection.
//!
//! The auth token is held in memory as a `SecretString` and is never
//! logged or written to the result store.

mod config;

pub use config::SessionConfig;

use crate::clock::Clock;
use crate::error::{PricebatchError, Result};
use crate::lookup::{LookupOutcome, LookupResult};
use crate::scheduler::{self, ChunkQueue};
use crate::store::ResultStore;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepting submissions and processing chunks
    Active,
    /// No further submissions; outstanding chunks still processing
    Draining,
    /// All submitted chunks done
    Completed,
    /// Idle TTL elapsed; state and results purged
    Expired,
}

struct Session {
    auth_token: Arc<SecretString>,
    state: SessionState,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    /// Next chunk sequence number for this session
    next_sequence: u64,
    /// Submission-order index for the next accepted identifier
    next_position: u64,
    /// Chunks queued or in flight
    chunks_outstanding: usize,
    total_submitted: u64,
    total_completed: u64,
    total_failed: u64,
    auth_invalid: bool,
}

/// Point-in-time progress snapshot for a session
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub session_id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Set once the upstream rejects the session credential; the caller
    /// should stop submitting further chunks
    pub auth_invalid: bool,
    pub results: Vec<LookupResult>,
}

/// Outcome of one submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    /// Sequence numbers of the chunks created for this submission
    pub chunk_ids: Vec<u64>,
    /// Identifiers accepted after within-submission dedup
    pub accepted: usize,
    /// Repeat occurrences dropped from this submission
    pub duplicate_count: usize,
}

/// Owner of all sessions and their chunk queues
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    queue: Arc<ChunkQueue>,
    store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        queue: Arc<ChunkQueue>,
        store: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            queue,
            store,
            clock,
            config,
        }
    }

    /// Create a new session bound to the caller's credential
    pub async fn create_session(&self, auth_token: &str) -> Result<String> {
        if auth_token.trim().is_empty() {
            return Err(PricebatchError::invalid_credential(
                "auth token must not be empty",
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        let now = self.clock.now();

        let session = Session {
            auth_token: Arc::new(SecretString::from(auth_token.to_string())),
            state: SessionState::Active,
            created_at: now,
            last_activity_at: now,
            next_sequence: 0,
            next_position: 0,
            chunks_outstanding: 0,
            total_submitted: 0,
            total_completed: 0,
            total_failed: 0,
            auth_invalid: false,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), session);

        tracing::info!(session_id = %session_id, "Session created");
        Ok(session_id)
    }

    /// Submit a batch of identifiers to a session
    ///
    /// The batch is deduplicated (first occurrence wins, within this
    /// submission only), split into chunks, and enqueued for the worker
    /// pool. Re-submitting an identifier in a later submission is allowed
    /// and triggers a fresh lookup.
    pub async fn submit(
        &self,
        session_id: &str,
        identifiers: Vec<String>,
    ) -> Result<SubmitReceipt> {
        if identifiers.is_empty() {
            return Err(PricebatchError::bad_request("no identifiers submitted"));
        }

        let now = self.clock.now();
        let ttl = chrono::Duration::seconds(self.config.ttl_secs as i64);

        let chunks = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| PricebatchError::unknown_session(session_id))?;

            match session.state {
                SessionState::Expired => {
                    return Err(PricebatchError::session_expired(session_id));
                }
                SessionState::Draining | SessionState::Completed => {
                    return Err(PricebatchError::session_closed(session_id));
                }
                SessionState::Active => {}
            }

            if now - session.last_activity_at > ttl {
                // The sweeper will purge it; refuse new work now
                return Err(PricebatchError::session_expired(session_id));
            }

            let chunks = scheduler::split(
                session_id,
                &identifiers,
                self.config.chunk_size,
                session.next_sequence,
                session.next_position,
            );

            let accepted: usize = chunks.iter().map(|c| c.len()).sum();
            session.next_sequence += chunks.len() as u64;
            session.next_position += accepted as u64;
            session.total_submitted += accepted as u64;
            session.chunks_outstanding += chunks.len();
            session.last_activity_at = now;

            chunks
        };

        let receipt = SubmitReceipt {
            chunk_ids: chunks.iter().map(|c| c.sequence).collect(),
            accepted: chunks.iter().map(|c| c.len()).sum(),
            duplicate_count: identifiers.len()
                - chunks.iter().map(|c| c.len()).sum::<usize>(),
        };

        tracing::debug!(
            session_id = %session_id,
            chunks = receipt.chunk_ids.len(),
            accepted = receipt.accepted,
            duplicates = receipt.duplicate_count,
            "Submission enqueued"
        );

        self.queue.push(chunks).await;
        Ok(receipt)
    }

    /// Point-in-time progress snapshot
    ///
    /// Never blocks on outstanding work; callers poll this while chunks are
    /// processing and treat the partial view as a monotonically growing one.
    pub async fn progress(&self, session_id: &str) -> Result<Progress> {
        let (state, created_at, submitted, completed, failed, auth_invalid) = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| PricebatchError::unknown_session(session_id))?;
            (
                session.state,
                session.created_at,
                session.total_submitted,
                session.total_completed,
                session.total_failed,
                session.auth_invalid,
            )
        };

        let results = self.store.snapshot(session_id).await?;

        Ok(Progress {
            session_id: session_id.to_string(),
            state,
            created_at,
            submitted,
            completed,
            failed,
            auth_invalid,
            results,
        })
    }

    /// Signal that no further submissions will arrive
    ///
    /// Moves an Active session to Draining (or straight to Completed when
    /// nothing is outstanding). Idempotent on already-closed sessions.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| PricebatchError::unknown_session(session_id))?;

        match session.state {
            SessionState::Expired => Err(PricebatchError::session_expired(session_id)),
            SessionState::Draining | SessionState::Completed => Ok(()),
            SessionState::Active => {
                session.last_activity_at = self.clock.now();
                if session.chunks_outstanding == 0 {
                    session.state = SessionState::Completed;
                    tracing::info!(session_id = %session_id, "Session completed");
                } else {
                    session.state = SessionState::Draining;
                    tracing::debug!(session_id = %session_id, "Session draining");
                }
                Ok(())
            }
        }
    }

    /// Expire sessions idle past the TTL
    ///
    /// Transitions them to Expired, drops their queued chunks, and deletes
    /// their stored results. A session with chunks still in a worker's
    /// hands lingers (state only) until the last chunk is accounted for,
    /// then vanishes. Returns the number of sessions newly expired.
    pub async fn expire_idle(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::seconds(self.config.ttl_secs as i64);

        let newly_expired: Vec<String> = {
            let mut sessions = self.sessions.write().await;
            sessions
                .iter_mut()
                .filter_map(|(id, session)| {
                    if session.state != SessionState::Expired
                        && now - session.last_activity_at > ttl
                    {
                        session.state = SessionState::Expired;
                        Some(id.clone())
                    } else {
                        None
                    }
                })
                .collect()
        };

        for session_id in &newly_expired {
            let dropped = self.queue.drop_session(session_id).await;

            {
                let mut sessions = self.sessions.write().await;
                if let Some(session) = sessions.get_mut(session_id) {
                    session.chunks_outstanding =
                        session.chunks_outstanding.saturating_sub(dropped);
                    if session.chunks_outstanding == 0 {
                        sessions.remove(session_id);
                    }
                }
            }

            if let Err(e) = self.store.delete_session(session_id).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to delete results for expired session");
            }

            tracing::info!(session_id = %session_id, dropped_chunks = dropped, "Expired idle session");
        }

        newly_expired.len()
    }

    /// Remove a session and its results immediately (caller-driven cleanup)
    pub async fn remove(&self, session_id: &str) {
        {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id);
        }
        self.queue.drop_session(session_id).await;
        if let Err(e) = self.store.delete_session(session_id).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to delete results for removed session");
        }
        tracing::info!(session_id = %session_id, "Session removed");
    }

    /// Credential for a session's outbound lookups
    ///
    /// Returns `None` once a session is expired or gone, which tells a
    /// worker holding one of its chunks to discard the work.
    pub async fn auth_token(&self, session_id: &str) -> Option<Arc<SecretString>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).and_then(|s| match s.state {
            SessionState::Active | SessionState::Draining => Some(s.auth_token.clone()),
            SessionState::Completed | SessionState::Expired => None,
        })
    }

    /// Whether the upstream has rejected this session's credential
    pub async fn auth_invalid(&self, session_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| s.auth_invalid).unwrap_or(false)
    }

    /// Mark the session credential as rejected by the upstream
    pub async fn flag_auth_invalid(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if !session.auth_invalid {
                session.auth_invalid = true;
                tracing::warn!(
                    session_id = %session_id,
                    "Upstream rejected session credential; failing remaining lookups"
                );
            }
        }
    }

    /// Record one terminal lookup result
    ///
    /// Checked against the session's current state at write time: results
    /// for expired or removed sessions are discarded, so a worker that
    /// outlives its session cannot resurrect deleted rows. Returns whether
    /// the result was stored.
    pub async fn record_result(&self, session_id: &str, result: LookupResult) -> bool {
        let now = self.clock.now();

        {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                tracing::debug!(session_id = %session_id, "Dropping result for unknown session");
                return false;
            };
            if session.state == SessionState::Expired {
                tracing::debug!(session_id = %session_id, "Dropping result for expired session");
                return false;
            }

            match result.outcome {
                LookupOutcome::Success | LookupOutcome::NotFound => {
                    session.total_completed += 1;
                }
                LookupOutcome::Failed => {
                    session.total_failed += 1;
                }
            }
            session.last_activity_at = now;
        }

        if let Err(e) = self.store.put(session_id, result).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to store lookup result");
            return false;
        }
        true
    }

    /// Account for one chunk leaving the in-flight set
    ///
    /// Completes a Draining session when its last chunk finishes, and
    /// finishes tearing down an Expired session once no worker holds its
    /// chunks anymore.
    pub async fn chunk_done(&self, session_id: &str) {
        let remove_rows = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(session_id) else {
                return;
            };

            session.chunks_outstanding = session.chunks_outstanding.saturating_sub(1);

            match session.state {
                SessionState::Draining if session.chunks_outstanding == 0 => {
                    session.state = SessionState::Completed;
                    tracing::info!(session_id = %session_id, "Session completed");
                    false
                }
                SessionState::Expired if session.chunks_outstanding == 0 => {
                    sessions.remove(session_id);
                    true
                }
                _ => false,
            }
        };

        if remove_rows {
            // Wipe anything a racing write slipped in after expiry deletion
            if let Err(e) = self.store.delete_session(session_id).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to delete results for expired session");
            }
        }
    }

    /// Current state of a session, if it exists
    pub async fn state(&self, session_id: &str) -> Option<SessionState> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|s| s.state)
    }

    /// Number of sessions currently tracked (including expired tombstones)
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}
