use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::lookup::LookupConfig;
use crate::ratelimit::RateLimitConfig;
use crate::session::SessionConfig;
use crate::utils::{env_parse, env_var};
use crate::worker::WorkerConfig;

/// Main configuration for a pricebatch process
///
/// All settings are resolved once at startup; the engine treats them as
/// immutable for the process lifetime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub worker: WorkerConfig,
    pub rate_limit: RateLimitConfig,
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            worker: WorkerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Config {
    /// Create a new Config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Load configuration from environment variables
    ///
    /// Each section reads its own `PRICEBATCH_*` variables; unset variables
    /// keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(host) = env_var("HOST") {
            config.server.host = host;
        }

        if let Some(port) = env_parse("PORT") {
            config.server.port = port;
        }

        if let Some(level) = env_var("LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(json) = env_parse("LOG_JSON") {
            config.logging.json = json;
        }

        config.session = SessionConfig::from_env();
        config.worker = WorkerConfig::from_env();
        config.rate_limit = RateLimitConfig::from_env();
        config.lookup = LookupConfig::from_env();

        config
    }
}

/// Builder for Config
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.config.worker = worker;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn with_lookup(mut self, lookup: LookupConfig) -> Self {
        self.config.lookup = lookup;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9100,
        };
        let addr = config.addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .with_host("127.0.0.1")
            .with_port(3000)
            .with_log_level("debug")
            .with_json_logging(true)
            .build();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }
}
