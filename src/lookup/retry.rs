//! Retry policy for transient lookup failures
//!
//! The policy is an explicit decision function over the number of attempts
//! already made, so it can be unit-tested without any network layer. Delays
//! follow exponential backoff with a cap and 0-25% jitter.

use std::time::Duration;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),
    /// Retries exhausted; record the identifier as failed
    GiveUp,
}

/// Bounded exponential-backoff retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial one
    max_retries: u32,
    /// Base delay in milliseconds, doubled per attempt
    base_delay_ms: u64,
    /// Ceiling on the pre-jitter delay in milliseconds
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Decide the next step given how many attempts have been made so far
    ///
    /// `attempts_made` counts completed attempts, so the first failure calls
    /// this with 1. A policy with `max_retries = N` permits `N + 1` total
    /// attempts.
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made > self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for(attempts_made.saturating_sub(1)))
        }
    }

    /// Backoff delay for a retry: base * 2^attempt, capped, plus jitter
    /// (0-25% of the delay).
    fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        let delay_ms = delay_ms.min(self.max_delay_ms);

        let jitter = if delay_ms > 0 {
            fastrand::u64(0..=delay_ms / 4)
        } else {
            0
        };
        Duration::from_millis(delay_ms.saturating_add(jitter))
    }
}
