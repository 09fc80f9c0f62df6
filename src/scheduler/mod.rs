//! Chunk scheduling
//!
//! Splits identifier submissions into bounded chunks and holds them in a
//! shared queue drained by the worker pool. The queue rotates round-robin
//! across sessions with pending work so a single large submission cannot
//! starve other sessions.

use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

/// Processing state of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Queued,
    InFlight,
    Done,
}

/// A bounded-size partition of one submission
#[derive(Debug, Clone)]
pub struct Chunk {
    pub session_id: String,
    /// Monotonic per session
    pub sequence: u64,
    /// Submission-order index of this chunk's first identifier
    pub base_position: u64,
    pub identifiers: Vec<String>,
    pub status: ChunkStatus,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// Partition one submission into chunks
///
/// Deterministic: preserves input order, drops repeat occurrences within
/// this submission (first occurrence wins), and groups the remainder into
/// consecutive runs of `chunk_size`; the final chunk may be shorter.
/// Sequences and positions continue from the session's running totals.
pub fn split(
    session_id: &str,
    identifiers: &[String],
    chunk_size: usize,
    first_sequence: u64,
    base_position: u64,
) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);

    let mut seen = HashSet::new();
    let deduped: Vec<String> = identifiers
        .iter()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect();

    deduped
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, group)| Chunk {
            session_id: session_id.to_string(),
            sequence: first_sequence + i as u64,
            base_position: base_position + (i * chunk_size) as u64,
            identifiers: group.to_vec(),
            status: ChunkStatus::Queued,
        })
        .collect()
}

/// Shared queue of pending chunks across all sessions
///
/// Workers pop from it concurrently; submissions push onto it. Fairness is
/// round-robin over sessions, not strict FIFO over chunks.
#[derive(Default)]
pub struct ChunkQueue {
    inner: Mutex<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    pending: HashMap<String, VecDeque<Chunk>>,
    rotation: VecDeque<String>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue chunks for their session
    pub async fn push(&self, chunks: Vec<Chunk>) {
        if chunks.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;
        for chunk in chunks {
            let session_id = chunk.session_id.clone();
            let queue = inner.pending.entry(session_id.clone()).or_default();
            let was_empty = queue.is_empty();
            queue.push_back(chunk);
            if was_empty && !inner.rotation.contains(&session_id) {
                inner.rotation.push_back(session_id);
            }
        }
    }

    /// Pop the next chunk, rotating across sessions with pending work
    ///
    /// Returns `None` when no work is queued. The returned chunk is marked
    /// in-flight.
    pub async fn pop_next(&self) -> Option<Chunk> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        while let Some(session_id) = inner.rotation.pop_front() {
            if let Some(queue) = inner.pending.get_mut(&session_id) {
                if let Some(mut chunk) = queue.pop_front() {
                    if queue.is_empty() {
                        inner.pending.remove(&session_id);
                    } else {
                        inner.rotation.push_back(session_id);
                    }
                    chunk.status = ChunkStatus::InFlight;
                    return Some(chunk);
                }
                inner.pending.remove(&session_id);
            }
        }

        None
    }

    /// Drop every queued chunk for a session; returns how many were dropped
    pub async fn drop_session(&self, session_id: &str) -> usize {
        let mut inner = self.inner.lock().await;
        inner.rotation.retain(|id| id != session_id);
        inner
            .pending
            .remove(session_id)
            .map(|queue| queue.len())
            .unwrap_or(0)
    }

    /// Total queued chunks across all sessions
    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.pending.values().map(VecDeque::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_partitions_in_order() {
        let chunks = split("s1", &ids(&["a", "b", "c", "d", "e"]), 2, 0, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].identifiers, ids(&["a", "b"]));
        assert_eq!(chunks[1].identifiers, ids(&["c", "d"]));
        assert_eq!(chunks[2].identifiers, ids(&["e"]));
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[2].sequence, 2);
        assert_eq!(chunks[1].base_position, 2);
        assert_eq!(chunks[2].base_position, 4);
    }

    #[test]
    fn test_split_dedups_within_submission() {
        let chunks = split("s1", &ids(&["a", "a", "b", "a"]), 10, 0, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].identifiers, ids(&["a", "b"]));
    }

    #[test]
    fn test_split_no_identifier_lost_or_duplicated() {
        let input = ids(&["a", "b", "c", "b", "d", "a", "e"]);
        let chunks = split("s1", &input, 3, 0, 0);

        let flat: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.identifiers.iter().cloned())
            .collect();
        assert_eq!(flat, ids(&["a", "b", "c", "d", "e"]));
    }

    #[test]
    fn test_split_continues_sequences() {
        let chunks = split("s1", &ids(&["x", "y", "z"]), 2, 5, 40);
        assert_eq!(chunks[0].sequence, 5);
        assert_eq!(chunks[1].sequence, 6);
        assert_eq!(chunks[0].base_position, 40);
        assert_eq!(chunks[1].base_position, 42);
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split("s1", &[], 10, 0, 0).is_empty());
    }

    #[tokio::test]
    async fn test_queue_round_robin_across_sessions() {
        let queue = ChunkQueue::new();
        queue.push(split("s1", &ids(&["a", "b", "c", "d"]), 1, 0, 0)).await;
        queue.push(split("s2", &ids(&["x", "y"]), 1, 0, 0)).await;

        let order: Vec<String> = {
            let mut popped = Vec::new();
            while let Some(chunk) = queue.pop_next().await {
                popped.push(chunk.session_id);
            }
            popped
        };

        // s2's two chunks interleave with s1's four rather than waiting
        assert_eq!(order, vec!["s1", "s2", "s1", "s2", "s1", "s1"]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_pop_marks_in_flight() {
        let queue = ChunkQueue::new();
        queue.push(split("s1", &ids(&["a"]), 1, 0, 0)).await;

        let chunk = queue.pop_next().await.unwrap();
        assert_eq!(chunk.status, ChunkStatus::InFlight);
        assert!(queue.pop_next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_session_clears_only_that_session() {
        let queue = ChunkQueue::new();
        queue.push(split("s1", &ids(&["a", "b"]), 1, 0, 0)).await;
        queue.push(split("s2", &ids(&["x"]), 1, 0, 0)).await;

        assert_eq!(queue.drop_session("s1").await, 2);
        assert_eq!(queue.len().await, 1);

        let chunk = queue.pop_next().await.unwrap();
        assert_eq!(chunk.session_id, "s2");
    }
}
