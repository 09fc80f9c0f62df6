//! Per-session outbound rate limiting backed by governor
//!
//! Each session gets its own token bucket (GCRA via governor's keyed
//! limiter), so one session's aggressive submissions cannot throttle
//! others. Waits are bounded: a worker that cannot get a permit within the
//! acquire timeout records the identifier as failed instead of blocking.

mod config;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shrink the keyed state store every N acquires to prevent unbounded
/// memory growth from expired sessions.
const SHRINK_INTERVAL: u64 = 1000;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// The bounded wait for a permit elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for a rate-limit permit")]
pub struct AcquireTimeout;

/// Per-session token-bucket limiter for outbound lookups
pub struct SessionRateLimiter {
    limiter: KeyedLimiter,
    acquire_timeout: Duration,
    /// Counter for periodic shrinking of the keyed state store
    acquire_count: AtomicU64,
}

impl SessionRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second.max(1))
            .expect("requests_per_second is clamped to at least 1");
        let burst =
            NonZeroU32::new(config.burst.max(1)).expect("burst is clamped to at least 1");

        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
            acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
            acquire_count: AtomicU64::new(0),
        }
    }

    /// Wait until this session may issue one outbound lookup
    ///
    /// Blocks at most the configured acquire timeout; on expiry the caller
    /// records the lookup as failed rather than waiting further.
    pub async fn acquire(&self, session_id: &str) -> Result<(), AcquireTimeout> {
        let count = self.acquire_count.fetch_add(1, Ordering::Relaxed);
        if count % SHRINK_INTERVAL == 0 && count > 0 {
            self.limiter.retain_recent();
        }

        tokio::time::timeout(
            self.acquire_timeout,
            self.limiter.until_key_ready(&session_id.to_string()),
        )
        .await
        .map(|_| ())
        .map_err(|_| AcquireTimeout)
    }
}
