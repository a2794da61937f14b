// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Legacy `sensorcap.properties` loader

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{Cadence, Config, ConfigError, DeviceConfig, ThresholdConfig};
use crate::detection::Metric;

/// Parse `key=value` lines, skipping blanks and `#` comments
fn parse_lines(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        props.insert(
            key.trim().to_string(),
            value.trim().trim_matches('"').to_string(),
        );
    }
    props
}

/// `<secs>,<iterations>`
///
/// A bad delay resets both values; a missing or bad iteration count resets
/// only the iterations.
fn parse_delay(device: &str, raw: &str) -> Cadence {
    let (delay, iterations) = match raw.split_once(',') {
        Some((delay, iterations)) => (delay.trim(), Some(iterations.trim())),
        None => (raw.trim(), None),
    };

    let Ok(delay) = delay.parse::<u64>() else {
        warn!("Invalid delay value '{}' for {}, using defaults", raw, device);
        return Cadence::default();
    };

    let iterations = match iterations.map(str::parse::<u32>) {
        Some(Ok(iterations)) => iterations,
        Some(Err(_)) | None => {
            warn!("Missing or invalid iterations for {}, defaulted", device);
            Cadence::DEFAULT_ITERATIONS
        }
    };

    Cadence::validated(device, delay, iterations)
}

fn log_level(raw: &str) -> &'static str {
    match raw.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "ERROR" | "CRITICAL" => "error",
        "NOTSET" => "trace",
        _ => "warn",
    }
}

fn number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// `<vendor>@<serial>@<metric>`
fn threshold(key: &str, value: &str) -> Result<ThresholdConfig, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    let mut parts = key.splitn(3, '@');
    let (Some(vendor), Some(serial), Some(metric)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    Ok(ThresholdConfig {
        vendor_id: vendor.trim().parse().map_err(|_| invalid())?,
        serial: serial.trim().to_string(),
        metric: metric.parse::<Metric>().map_err(|_| invalid())?,
        limit: value.parse().map_err(|_| invalid())?,
    })
}

impl Config {
    /// Build a configuration from legacy properties text
    pub fn from_properties(content: &str) -> Result<Self, ConfigError> {
        let props = parse_lines(content);
        info!("{} properties read", props.len());

        let mut config = Config::default();
        // The legacy daemon always stamped events and logged to a file
        config.audit.enabled = true;
        config.log_file = Some(PathBuf::from("./sensormgr.log"));

        if let Some(timeout) = props.get("httptimeout") {
            config.http_timeout_secs = number("httptimeout", timeout)?;
        }
        let host = props.get("influxhost").map_or("localhost", String::as_str);
        let port: u16 = match props.get("influxport") {
            Some(port) => number("influxport", port)?,
            None => 8086,
        };
        config.storage.influx_url = format!("http://{}:{}", host, port);
        if let Some(database) = props.get("influxdatabase") {
            config.storage.database = database.clone();
        }
        if let Some(file) = props.get("logfile") {
            config.log_file = Some(PathBuf::from(file));
        }
        if let Some(level) = props.get("debuglevel") {
            config.log_level = log_level(level).to_string();
        }

        let names: Vec<&str> = props
            .get("devicelist")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if names.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        for name in names {
            config.devices.push(device(name, &props)?);
        }

        for (key, value) in &props {
            if key.contains('@') {
                config.thresholds.push(threshold(key, value)?);
            }
        }
        config
            .thresholds
            .sort_by(|a, b| (a.vendor_id, &a.serial).cmp(&(b.vendor_id, &b.serial)));

        config.validate()?;
        Ok(config)
    }

    pub fn from_properties_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_properties(&content)?;
        info!("Loaded properties from {:?}", path);
        Ok(config)
    }
}

fn device(name: &str, props: &HashMap<String, String>) -> Result<DeviceConfig, ConfigError> {
    let prefix = format!("{}.", name);
    let mut address = None;
    let mut port = None;
    let mut cadence = None;

    for (key, value) in props {
        let Some(prop) = key.strip_prefix(&prefix) else {
            continue;
        };
        debug!("Property {} for device {}", prop, name);
        match prop {
            "ipaddress" => address = Some(value.clone()),
            "port" => port = Some(number::<u16>(key, value)?),
            "delay" => cadence = Some(parse_delay(name, value)),
            _ => {
                return Err(ConfigError::UnknownProperty {
                    device: name.to_string(),
                    key: prop.to_string(),
                })
            }
        }
    }

    let incomplete = |missing| ConfigError::IncompleteDevice {
        device: name.to_string(),
        missing,
    };
    let address = address.filter(|a| !a.is_empty()).ok_or_else(|| incomplete("ipaddress"))?;
    let port = port.ok_or_else(|| incomplete("port"))?;
    let cadence = cadence.ok_or_else(|| incomplete("delay"))?;

    Ok(DeviceConfig {
        name: name.to_string(),
        address,
        port,
        delay_secs: cadence.delay.as_secs(),
        iterations: cadence.iterations,
    })
}
