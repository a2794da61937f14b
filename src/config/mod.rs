// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

mod properties;
mod resolve;

pub use resolve::resolve_address;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::detection::{Metric, ThresholdTable};

/// Invalid or incomplete configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no devices configured")]
    NoDevices,

    #[error("device '{0}' is configured more than once")]
    DuplicateDevice(String),

    #[error("unrecognized property '{key}' for device '{device}'")]
    UnknownProperty { device: String, key: String },

    #[error("incomplete configuration for device '{device}': missing {missing}")]
    IncompleteDevice { device: String, missing: &'static str },

    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("cannot resolve '{host}': {reason}")]
    Unresolvable { host: String, reason: String },
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,

    /// Append logs to this file instead of stderr
    pub log_file: Option<PathBuf>,

    /// Per-request timeout towards masters
    pub http_timeout_secs: f64,

    pub storage: StorageConfig,

    pub audit: AuditConfig,

    pub supervisor: SupervisorConfig,

    pub devices: Vec<DeviceConfig>,

    pub thresholds: Vec<ThresholdConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            http_timeout_secs: 3.0,
            storage: StorageConfig::default(),
            audit: AuditConfig::default(),
            supervisor: SupervisorConfig::default(),
            devices: Vec::new(),
            thresholds: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
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

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("sensorcap"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn http_timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.http_timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => {
                warn!(
                    "Invalid HTTP timeout {}, using 3 seconds",
                    self.http_timeout_secs
                );
                Duration::from_secs(3)
            }
        }
    }

    /// Check device entries before anything is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.name.clone()));
            }
            if device.address.trim().is_empty() {
                return Err(ConfigError::IncompleteDevice {
                    device: device.name.clone(),
                    missing: "address",
                });
            }
            if device.port == 0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}.port", device.name),
                    value: "0".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build the lookup table used by the evaluator
    pub fn threshold_table(&self) -> ThresholdTable {
        let mut table = ThresholdTable::new();
        for entry in &self.thresholds {
            table.insert(entry.vendor_id, &entry.serial, entry.metric, entry.limit);
        }
        table
    }
}

/// Where measurement points go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Influx,
    Sqlite,
    Disabled,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// InfluxDB base URL
    pub influx_url: String,

    /// InfluxDB database name
    pub database: String,

    /// SQLite file for the `sqlite` backend
    pub sqlite_path: PathBuf,

    /// Retention period in days for the `sqlite` backend
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Influx,
            influx_url: "http://localhost:8086".to_string(),
            database: "sensor".to_string(),
            sqlite_path: dirs::data_local_dir()
                .map(|d| d.join("sensorcap").join("points.db"))
                .unwrap_or_else(|| PathBuf::from("./data/points.db")),
            retention_days: 30,
        }
    }
}

/// Audit stamping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,

    /// Stamping program, called as `<program> [args] --etype <type> --data <json>`
    pub program: String,

    pub args: Vec<String>,

    pub timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "/opt/corlina/bin/api/get-eventstamp".to_string(),
            args: Vec::new(),
            timeout_secs: 10,
        }
    }
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Restart policy for device loops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,

    /// Consecutive restarts before a device is reported degraded
    pub degraded_after: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            degraded_after: 3,
        }
    }
}

impl SupervisorConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

fn default_http_port() -> u16 {
    80
}

fn default_delay() -> u64 {
    Cadence::DEFAULT_DELAY_SECS
}

fn default_iterations() -> u32 {
    Cadence::DEFAULT_ITERATIONS
}

/// One IO-Link master to poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,

    /// Dotted-quad or DNS name
    pub address: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    #[serde(default = "default_delay")]
    pub delay_secs: u64,

    /// Partial polls between two full polls
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl DeviceConfig {
    pub fn cadence(&self) -> Cadence {
        Cadence::validated(&self.name, self.delay_secs, self.iterations)
    }
}

/// A configured limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub vendor_id: u32,
    pub serial: String,
    pub metric: Metric,
    pub limit: f64,
}

/// Polling period and full-poll spacing of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub delay: Duration,
    pub iterations: u32,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(Self::DEFAULT_DELAY_SECS),
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }
}

impl Cadence {
    pub const DEFAULT_DELAY_SECS: u64 = 10;
    pub const DEFAULT_ITERATIONS: u32 = 6;
    pub const DELAY_RANGE: std::ops::RangeInclusive<u64> = 5..=600;
    pub const ITERATION_RANGE: std::ops::RangeInclusive<u32> = 5..=20;

    /// Apply bounds, replacing bad values with defaults
    ///
    /// An out-of-range delay resets both values; an out-of-range iteration
    /// count resets only itself.
    pub fn validated(device: &str, delay_secs: u64, iterations: u32) -> Self {
        if !Self::DELAY_RANGE.contains(&delay_secs) {
            warn!(
                "Out of range delay {}s for {}, using defaults",
                delay_secs, device
            );
            return Self::default();
        }

        let iterations = if Self::ITERATION_RANGE.contains(&iterations) {
            iterations
        } else {
            warn!(
                "Out of range iterations {} for {}, using {}",
                iterations,
                device,
                Self::DEFAULT_ITERATIONS
            );
            Self::DEFAULT_ITERATIONS
        };

        Self {
            delay: Duration::from_secs(delay_secs),
            iterations,
        }
    }
}
