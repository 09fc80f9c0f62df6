//! Injectable time source
//!
//! Session expiry is driven by wall-clock time. Hiding the clock behind a
//! trait lets the expiry sweep run against a manual clock in tests instead
//! of waiting out real TTLs.

use chrono::{DateTime, Utc};

/// Time source for session timestamps and TTL checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
