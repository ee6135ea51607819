//! Application configuration.
//!
//! Configuration is an explicit value object: loaded once from a JSON file
//! at startup and passed by reference to the components that need it.
//! Every field has a default, so a missing file or a partial file is fine;
//! only malformed JSON is an error.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] serde_json::Error),
}

/// Network addressing for the UDP channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Destination address for outbound sentences.
    pub udp_address: String,
    /// Destination port for outbound sentences.
    pub udp_port: u16,
    /// Local port the receiver binds to.
    pub receive_port: u16,
    /// Socket timeout in seconds.
    pub timeout: f64,
    /// UDP receive buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            udp_address: "127.0.0.1".to_string(),
            udp_port: 19711,
            receive_port: 19710,
            timeout: 5.0,
            buffer_size: 4096,
        }
    }
}

/// GPS data handling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    /// Capacity of the live fix history.
    pub max_stored_positions: usize,
    /// Pacing between emitted positions, in seconds.
    pub time_between_positions: f64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            max_stored_positions: 1000,
            time_between_positions: 1.0,
        }
    }
}

/// Retry behavior for outbound sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter_enabled: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            exponential_base: 2.0,
            jitter_enabled: true,
        }
    }
}

/// Circuit breaker thresholds for outbound sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub half_open_max_requests: u32,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            half_open_max_requests: 1,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub gps: GpsConfig,
    pub retry: RetrySettings,
    pub circuit: CircuitSettings,
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file logs a warning and yields the defaults; unreadable
    /// or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&text)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.network.udp_address, "127.0.0.1");
        assert_eq!(config.network.udp_port, 19711);
        assert_eq!(config.network.receive_port, 19710);
        assert_eq!(config.gps.max_stored_positions, 1000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.circuit.failure_threshold, 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{
            "network": { "receive_port": 20000 },
            "gps": { "max_stored_positions": 50 }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.network.receive_port, 20000);
        assert_eq!(config.network.udp_port, 19711);
        assert_eq!(config.gps.max_stored_positions, 50);
        assert_eq!(config.gps.time_between_positions, 1.0);
        assert_eq!(config.retry.exponential_base, 2.0);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let result: Result<AppConfig, _> = serde_json::from_str("{ not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/definitely/not/here.json")).unwrap();
        assert_eq!(config.network.udp_port, 19711);
    }
}
