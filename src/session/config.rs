use crate::utils::env_parse;
use serde::{Deserialize, Serialize};

/// Session lifecycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum identifiers per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Idle seconds after which a session and its results are purged
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between expiry sweeps in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SessionConfig {
    /// Load session configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_parse("CHUNK_SIZE") {
            config.chunk_size = size;
        }

        if let Some(ttl) = env_parse("SESSION_TTL_SECS") {
            config.ttl_secs = ttl;
        }

        if let Some(interval) = env_parse("SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = interval;
        }

        config
    }
}

fn default_chunk_size() -> usize {
    500
}

fn default_ttl_secs() -> u64 {
    24 * 3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.ttl_secs, 86_400);
        assert_eq!(config.sweep_interval_secs, 60);
    }
}
