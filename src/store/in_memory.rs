use crate::error::Result;
use crate::lookup::LookupResult;
use crate::store::ResultStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory result store
///
/// Stores results in a per-session map. Rows survive only for the process
/// lifetime, which matches the engine's retention contract: everything is
/// purged on session expiry or restart.
#[derive(Clone, Default)]
pub struct InMemoryResultStore {
    sessions: Arc<RwLock<HashMap<String, HashMap<String, LookupResult>>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows for a session
    pub async fn len(&self, session_id: &str) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(HashMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, session_id: &str, result: LookupResult) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(result.identifier.clone(), result);
        Ok(())
    }

    async fn snapshot(&self, session_id: &str) -> Result<Vec<LookupResult>> {
        let sessions = self.sessions.read().await;

        let mut results: Vec<LookupResult> = sessions
            .get(session_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();

        results.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        Ok(results)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        // Nothing buffered; writes are visible immediately
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{LookupOutcome, LookupResult, ProductDetails};
    use chrono::Utc;

    fn success(identifier: &str, position: u64, price: f64) -> LookupResult {
        let product = ProductDetails {
            current_price: Some(price),
            currency: "CAD".to_string(),
            ..Default::default()
        };
        LookupResult::success(identifier, position, product, 1, Utc::now())
    }

    #[tokio::test]
    async fn test_put_and_snapshot() {
        let store = InMemoryResultStore::new();
        store.put("s1", success("B", 1, 2.0)).await.unwrap();
        store.put("s1", success("A", 0, 1.0)).await.unwrap();

        let snapshot = store.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.len(), 2);
        // Ordered by submission position, not completion order
        assert_eq!(snapshot[0].identifier, "A");
        assert_eq!(snapshot[1].identifier, "B");
    }

    #[tokio::test]
    async fn test_put_overwrites_same_identifier() {
        let store = InMemoryResultStore::new();
        store.put("s1", success("A", 0, 1.0)).await.unwrap();

        let retry = LookupResult::failed("A", 0, "timed out", 4, Utc::now());
        store.put("s1", retry).await.unwrap();

        let snapshot = store.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].outcome, LookupOutcome::Failed);
        assert_eq!(snapshot[0].attempts, 4);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemoryResultStore::new();
        store.put("s1", success("A", 0, 1.0)).await.unwrap();
        store.put("s2", success("B", 0, 2.0)).await.unwrap();

        assert_eq!(store.len("s1").await, 1);
        assert_eq!(store.len("s2").await, 1);

        store.delete_session("s1").await.unwrap();
        assert!(store.snapshot("s1").await.unwrap().is_empty());
        assert_eq!(store.snapshot("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_then_delete_leaves_no_rows() {
        let store = InMemoryResultStore::new();
        store.put("s1", success("A", 0, 1.0)).await.unwrap();
        store.put("s1", success("B", 1, 2.0)).await.unwrap();

        store.flush().await.unwrap();
        assert!(store.is_healthy());
        assert_eq!(store.len("s1").await, 2);

        store.delete_session("s1").await.unwrap();
        assert_eq!(store.len("s1").await, 0);
        assert!(store.snapshot("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_puts_leave_one_row() {
        let store = InMemoryResultStore::new();

        let mut handles = Vec::new();
        for i in 0..50u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put("s1", success("A", 0, i as f64)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = store.snapshot("s1").await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].identifier, "A");
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_session_is_empty() {
        let store = InMemoryResultStore::new();
        assert!(store.snapshot("missing").await.unwrap().is_empty());
    }
}
