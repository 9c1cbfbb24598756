// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::discovery::{
    DIAGNOSTIC_TOKENS, FALLBACK_SERVICES, HID_DEVICE_CLASS, PRIMARY_SERVICE, SENSOR_TOKENS,
};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Discovery configuration
    pub discovery: DiscoveryConfig,

    /// Polling configuration
    pub polling: PollingConfig,

    /// Registry backend configuration
    pub registry: RegistryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "spumotion".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            discovery: DiscoveryConfig::default(),
            polling: PollingConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        if self.discovery.primary_service.is_empty() {
            bail!("discovery.primary_service must not be empty");
        }
        if self.discovery.sensor_tokens.iter().any(|t| t.is_empty()) {
            bail!("discovery.sensor_tokens must not contain empty tokens");
        }
        if self.discovery.diagnostic_tokens.iter().any(|t| t.is_empty()) {
            bail!("discovery.diagnostic_tokens must not contain empty tokens");
        }
        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("spumotion"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Service class probed first
    pub primary_service: String,

    /// Generic HID class enumerated when the primary service is missing
    pub hid_class: String,

    /// Alternate services tried in order
    pub fallback_services: Vec<String>,

    /// Case-sensitive tokens deciding whether a sensor subtree exists
    pub sensor_tokens: Vec<String>,

    /// Case-insensitive tokens for fallback diagnostics
    pub diagnostic_tokens: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            primary_service: PRIMARY_SERVICE.to_string(),
            hid_class: HID_DEVICE_CLASS.to_string(),
            fallback_services: FALLBACK_SERVICES.iter().map(|s| s.to_string()).collect(),
            sensor_tokens: SENSOR_TOKENS.iter().map(|s| s.to_string()).collect(),
            diagnostic_tokens: DIAGNOSTIC_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Tick period in milliseconds
    pub interval_ms: u64,
}

impl PollingConfig {
    /// Tick period
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 16 }  // ~60 Hz
    }
}

/// Registry backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Which registry backend to use
    pub backend: RegistryBackend,

    /// JSON snapshot for the snapshot backend
    pub snapshot_path: Option<PathBuf>,

    /// Device directory root for the sysfs backend
    pub sysfs_root: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Sysfs,
            snapshot_path: None,
            sysfs_root: PathBuf::from("/sys/bus/iio/devices"),
        }
    }
}

/// Registry implementation to read services from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// JSON snapshot loaded into memory
    Snapshot,
    /// Live Linux sysfs device directories
    Sysfs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.polling.interval(), Duration::from_millis(16));
        assert_eq!(config.discovery.primary_service, "AppleSPUHIDInterface");
        assert_eq!(config.discovery.fallback_services.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [polling]
            interval_ms = 20

            [registry]
            backend = "snapshot"
            snapshot_path = "registry.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.polling.interval_ms, 20);
        assert_eq!(config.registry.backend, RegistryBackend::Snapshot);
        assert_eq!(config.registry.snapshot_path, Some(PathBuf::from("registry.json")));
        assert_eq!(config.discovery.hid_class, "IOHIDDevice");
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("spumotion-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.polling.interval_ms = 8;
        config.discovery.fallback_services = vec!["AppleSMC".to_string()];

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.polling.interval_ms, 8);
        assert_eq!(loaded.discovery.fallback_services, vec!["AppleSMC"]);
    }

    #[test]
    fn test_empty_tokens_rejected() {
        let mut config = Config::default();
        config.discovery.diagnostic_tokens.push(String::new());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.discovery.sensor_tokens = vec!["AOP".to_string(), String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
