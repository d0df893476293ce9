//! Configuration system for the telemetry device
//!
//! Configuration is loaded from a TOML file and holds the device identity,
//! the broker endpoint, and the session policy switches. Credentials are
//! never stored inline; the file names environment variables instead.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level device configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub device: DeviceSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub session: SessionSection,
}

/// Device identity section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier (must match [a-zA-Z0-9._-]+, at most 64 chars)
    pub id: String,
    /// Free-form description of what this device reports
    #[serde(default)]
    pub description: String,
}

/// Broker endpoint section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL with protocol and port (mqtt:// or mqtts://)
    pub url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// MQTT keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Per-attempt timeout for the startup link probe in seconds (default: 5)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_keep_alive() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    5
}

/// Session policy section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Refuse to enter the dispatch loop when the broker answers the
    /// handshake with a non-success code. When false, the device logs the
    /// code and proceeds anyway.
    #[serde(default = "default_strict_handshake")]
    pub strict_handshake: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            strict_handshake: default_strict_handshake(),
        }
    }
}

fn default_strict_handshake() -> bool {
    true
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
}

impl DeviceConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DeviceConfig = toml::from_str(&content)?;

        validate_device_id(&config.device.id)?;

        Ok(config)
    }
}

/// Validate device ID format: [a-zA-Z0-9._-]+, at most 64 characters
fn validate_device_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || id.len() > 64 {
        return Err(ConfigError::InvalidDeviceId(id.to_string()));
    }

    let valid = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(ConfigError::InvalidDeviceId(id.to_string()));
    }

    Ok(())
}
