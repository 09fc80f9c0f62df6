use crate::utils::env_parse;
use serde::{Deserialize, Serialize};

/// Per-session outbound rate limit configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Sustained lookups per second allowed per session
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size per session
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Maximum time a worker waits for a permit in milliseconds
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new RateLimitConfig builder
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Load rate limit configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(rps) = env_parse("REQUESTS_PER_SECOND") {
            config.requests_per_second = rps;
        }

        if let Some(burst) = env_parse("RATE_LIMIT_BURST") {
            config.burst = burst;
        }

        if let Some(timeout) = env_parse("ACQUIRE_TIMEOUT_MS") {
            config.acquire_timeout_ms = timeout;
        }

        config
    }
}

/// Builder for RateLimitConfig
#[must_use = "builder does nothing until you call build()"]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.config.requests_per_second = rps;
        self
    }

    pub fn burst(mut self, burst: u32) -> Self {
        self.config.burst = burst;
        self
    }

    pub fn acquire_timeout_ms(mut self, ms: u64) -> Self {
        self.config.acquire_timeout_ms = ms;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_burst() -> u32 {
    4
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}
