//! Result storage
//!
//! Results are keyed by (session, identifier) and written incrementally by
//! workers while callers poll snapshots. The trait abstracts the backend;
//! the in-memory implementation is the default and data does not survive a
//! process restart.

mod in_memory;

pub use in_memory::InMemoryResultStore;

use crate::error::Result;
use crate::lookup::LookupResult;
use async_trait::async_trait;

/// Storage for per-session lookup results
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Idempotent upsert keyed by (session, identifier)
    ///
    /// A retry for the same identifier overwrites the prior row. Safe under
    /// concurrent calls from different workers on the same session.
    async fn put(&self, session_id: &str, result: LookupResult) -> Result<()>;

    /// Point-in-time snapshot of a session's results, ordered by submission
    /// position (stable)
    ///
    /// Returns an empty list for sessions with no stored rows.
    async fn snapshot(&self, session_id: &str) -> Result<Vec<LookupResult>>;

    /// Remove every row for a session
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Flush buffered writes; called once during controlled shutdown
    async fn flush(&self) -> Result<()>;

    /// Check if the store is operational
    fn is_healthy(&self) -> bool;
}
