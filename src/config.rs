//! Configuration management for Floodgate.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{Classification, ConfigSnapshot, LimitConfig};

/// Main configuration for the Floodgate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiting configuration
    #[serde(default = "default_rate_limiting")]
    pub rate_limiting: ConfigSnapshot,
}

impl Default for FloodgateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            rate_limiting: default_rate_limiting(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Seconds between configuration reload polls; zero disables polling
    #[serde(default = "default_reload_interval")]
    pub config_reload_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            config_reload_interval_secs: default_reload_interval(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_reload_interval() -> u64 {
    60
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_rate_limiting() -> ConfigSnapshot {
    let mut limits = HashMap::new();
    limits.insert(
        Classification::Ip,
        LimitConfig {
            max_requests: 10,
            block_duration_mins: 5,
        },
    );
    limits.insert(
        Classification::Token,
        LimitConfig {
            max_requests: 100,
            block_duration_mins: 10,
        },
    );

    ConfigSnapshot {
        limits,
        ..ConfigSnapshot::default()
    }
}

impl FloodgateConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| FloodgateError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FloodgateConfig::default();

        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.config_reload_interval_secs, 60);
        assert_eq!(config.store.redis_url, "redis://localhost:6379");
        assert!(config.rate_limiting.enabled);
        assert_eq!(config.rate_limiting.limits.len(), 2);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
server:
  listen_addr: "0.0.0.0:9000"
  config_reload_interval_secs: 5
store:
  redis_url: "redis://redis.internal:6379"
rate_limiting:
  enabled: true
  on_store_error: allow
  limits:
    ip:
      max_requests: 20
      block_duration_mins: 1
"#;
        let config: FloodgateConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.server.config_reload_interval_secs, 5);
        assert_eq!(config.store.redis_url, "redis://redis.internal:6379");

        let ip = config
            .rate_limiting
            .limit_for(Classification::Ip)
            .unwrap();
        assert_eq!(ip.max_requests, 20);
        assert!(config.rate_limiting.limit_for(Classification::Token).is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let yaml = r#"
rate_limiting:
  enabled: false
"#;
        let config: FloodgateConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(!config.rate_limiting.enabled);
        assert!(config.rate_limiting.limits.is_empty());
    }

    #[test]
    fn test_from_file_missing_path_is_io_error() {
        let result = FloodgateConfig::from_file("/does/not/exist.yaml");
        assert!(matches!(result, Err(FloodgateError::Io(_))));
    }
}
