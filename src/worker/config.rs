//! Configuration for the lookup worker pool

use crate::utils::env_parse;
use serde::{Deserialize, Serialize};

/// Worker pool and retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of workers; also the hard ceiling on concurrent outbound
    /// lookups process-wide
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Lookups a single worker may run concurrently within one chunk
    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,

    /// Maximum retry attempts after the initial lookup
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry delay in milliseconds (doubled per attempt)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Ceiling on the retry delay in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            chunk_concurrency: default_chunk_concurrency(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl WorkerConfig {
    /// Load worker configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(workers) = env_parse("MAX_WORKERS") {
            config.max_workers = workers;
        }

        if let Some(concurrency) = env_parse("CHUNK_CONCURRENCY") {
            config.chunk_concurrency = concurrency;
        }

        if let Some(retries) = env_parse("MAX_RETRIES") {
            config.max_retries = retries;
        }

        if let Some(base) = env_parse("RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = base;
        }

        if let Some(max) = env_parse("RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = max;
        }

        config
    }
}

fn default_max_workers() -> usize {
    3
}

fn default_chunk_concurrency() -> usize {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}
