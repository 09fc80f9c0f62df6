//! Configuration for the upstream lookup client

use crate::utils::{env_parse, env_var};
use serde::{Deserialize, Serialize};

/// Configuration for outbound price lookups
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookupConfig {
    /// Base URL of the upstream pricing API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LookupConfig {
    /// Load lookup configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_var("UPSTREAM_BASE_URL") {
            config.base_url = url;
        }

        if let Some(timeout) = env_parse("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout;
        }

        config
    }
}

fn default_base_url() -> String {
    "https://voila.ca".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LookupConfig::default();
        assert_eq!(config.base_url, "https://voila.ca");
        assert_eq!(config.request_timeout_secs, 15);
    }
}
