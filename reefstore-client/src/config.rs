//! Client configuration
//!
//! Loaded from a TOML file or built from defaults. All caches, pools and
//! deadlines take their sizing from here at construction time; there is no
//! implicit first-use initialization.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Manifest cache sizing
    #[serde(default)]
    pub cache: CacheSettings,

    /// Per-OSD connection behavior
    #[serde(default)]
    pub osd: OsdSettings,

    /// Proxy connection behavior
    #[serde(default)]
    pub proxy: ProxySettings,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.manifest_capacity == 0 {
            return Err(ConfigError::Validation(
                "cache.manifest_capacity must be at least 1".to_string(),
            ));
        }
        if self.osd.connection_pool_size == 0 {
            return Err(ConfigError::Validation(
                "osd.connection_pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Manifest cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Capacity of each per-namespace manifest LRU. Applied at namespace
    /// creation; already-created namespaces keep their capacity.
    #[serde(default = "default_manifest_capacity")]
    pub manifest_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            manifest_capacity: default_manifest_capacity(),
        }
    }
}

fn default_manifest_capacity() -> usize {
    10_000
}

/// Per-OSD connection behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsdSettings {
    /// Connections kept per OSD in the direct-path pool
    #[serde(default = "default_pool_size")]
    pub connection_pool_size: usize,

    /// Failures after which an OSD's pool stops handing out connections
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,

    /// Deadline for one partial-read exchange, in milliseconds
    #[serde(default = "default_partial_read_timeout_ms")]
    pub partial_read_timeout_ms: u64,

    /// Whether to use the fast path for OSDs that advertise it
    #[serde(default = "default_use_fast_path")]
    pub use_fast_path: bool,
}

impl OsdSettings {
    pub fn partial_read_timeout(&self) -> Duration {
        Duration::from_millis(self.partial_read_timeout_ms)
    }
}

impl Default for OsdSettings {
    fn default() -> Self {
        Self {
            connection_pool_size: default_pool_size(),
            failure_threshold: default_failure_threshold(),
            partial_read_timeout_ms: default_partial_read_timeout_ms(),
            use_fast_path: default_use_fast_path(),
        }
    }
}

fn default_pool_size() -> usize {
    5
}

fn default_failure_threshold() -> u64 {
    3
}

fn default_partial_read_timeout_ms() -> u64 {
    5_000
}

fn default_use_fast_path() -> bool {
    true
}

/// Proxy connection behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Deadline for one proxy request/response exchange, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ProxySettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.cache.manifest_capacity, 10_000);
        assert_eq!(config.osd.connection_pool_size, 5);
        assert_eq!(config.osd.failure_threshold, 3);
        assert!(config.osd.use_fast_path);
        assert_eq!(config.proxy.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [cache]
            manifest_capacity = 100

            [osd]
            connection_pool_size = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.manifest_capacity, 100);
        assert_eq!(config.osd.connection_pool_size, 2);
        // unspecified sections fall back to defaults
        assert_eq!(config.osd.failure_threshold, 3);
        assert_eq!(config.proxy.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config: ClientConfig = toml::from_str("[cache]\nmanifest_capacity = 0")
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
