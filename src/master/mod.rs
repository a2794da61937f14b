// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! IO-Link master HTTP API
//!
//! Masters expose every datum under its own `.../getdata` path and wrap the
//! answer in `{"data": {"value": ...}}`. [`MasterApi`] is the transport seam;
//! [`Master`] layers typed getters on top of it. Every getter fails on its
//! own so one unreadable field never spoils the rest of a cycle.

mod http;

pub use http::HttpMaster;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sensors::{MasterSnapshot, PortStatus, SensorIdentity, SupervisionStatus};

/// Request paths on the master
pub mod paths {
    pub const SERIAL: &str = "/deviceinfo/serialnumber/getdata";
    pub const VENDOR: &str = "/deviceinfo/vendor/getdata";
    pub const FAMILY: &str = "/deviceinfo/devicefamily/getdata";
    pub const PRODUCT_CODE: &str = "/deviceinfo/productcode/getdata";
    pub const IP_ADDRESS: &str = "/iotsetup/network/ipaddress/getdata";
    pub const TEMPERATURE: &str = "/processdatamaster/temperature/getdata";
    pub const SUPERVISION: &str = "/processdatamaster/supervisionstatus/getdata";
    pub const CURRENT: &str = "/processdatamaster/current/getdata";
    pub const VOLTAGE: &str = "/processdatamaster/voltage/getdata";
    pub const TREE: &str = "/gettree";

    pub const PORT_STATUS: &str = "status";
    pub const PORT_DEVICE_ID: &str = "deviceid";
    pub const PORT_VENDOR_ID: &str = "vendorid";
    pub const PORT_SERIAL: &str = "serial";
    pub const PORT_LOCAL_NAME: &str = "applicationspecifictag";
    pub const PORT_PRODUCT_NAME: &str = "productname";
    pub const PORT_PROCESS_DATA: &str = "pdin";

    /// Path of a per-port device field
    pub fn port(port: u16, field: &str) -> String {
        format!("/iolinkmaster/port[{}]/iolinkdevice/{}/getdata", port, field)
    }
}

/// Failure to read one datum from a master
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("request for {path} timed out")]
    Timeout { path: String },

    #[error("connection error on {path}: {message}")]
    Connection { path: String, message: String },

    #[error("HTTP {status} on {path}")]
    Status { path: String, status: u16 },

    #[error("unexpected response on {path}: {reason}")]
    Protocol { path: String, reason: String },
}

impl FieldError {
    fn protocol(path: &str, reason: impl Into<String>) -> Self {
        FieldError::Protocol {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Transport to a single master
#[async_trait]
pub trait MasterApi: Send + Sync {
    /// Address the master is reached at
    fn address(&self) -> &str;

    /// GET a path and return the body untouched
    async fn get_raw(&self, path: &str) -> Result<String, FieldError>;

    /// GET a path and unwrap the `data.value` envelope
    async fn get_value(&self, path: &str) -> Result<Value, FieldError> {
        let body = self.get_raw(path).await?;
        unwrap_envelope(path, &body)
    }
}

/// Extract `data.value` from a master response body
pub fn unwrap_envelope(path: &str, body: &str) -> Result<Value, FieldError> {
    let mut json: Value = serde_json::from_str(body)
        .map_err(|e| FieldError::protocol(path, format!("invalid JSON: {}", e)))?;

    json.get_mut("data")
        .and_then(|data| data.get_mut("value"))
        .map(Value::take)
        .ok_or_else(|| FieldError::protocol(path, "missing data.value"))
}

/// Count the ports listed under `iolinkmaster` in a `/gettree` body
///
/// A tree without an `iolinkmaster` node has zero ports.
pub fn count_ports(body: &str) -> Result<u16, FieldError> {
    let tree: Value = serde_json::from_str(body)
        .map_err(|e| FieldError::protocol(paths::TREE, format!("invalid JSON: {}", e)))?;

    let subs = tree
        .get("data")
        .and_then(|data| data.get("subs"))
        .and_then(Value::as_array)
        .ok_or_else(|| FieldError::protocol(paths::TREE, "missing data.subs"))?;

    let ports = subs
        .iter()
        .find(|sub| sub.get("identifier").and_then(Value::as_str) == Some("iolinkmaster"))
        .and_then(|master| master.get("subs"))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);

    u16::try_from(ports).map_err(|_| FieldError::protocol(paths::TREE, "too many ports"))
}

fn as_text(path: &str, value: Value) -> Result<String, FieldError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(FieldError::protocol(path, format!("expected text, got {}", other))),
    }
}

fn as_number(path: &str, value: &Value) -> Result<f64, FieldError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FieldError::protocol(path, format!("expected number, got {}", value)))
}

fn as_integer(path: &str, value: &Value) -> Result<i64, FieldError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FieldError::protocol(path, format!("expected integer, got {}", value)))
}

/// Log a field failure and turn it into "unavailable"
pub(crate) fn available<T>(result: Result<T, FieldError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} unavailable: {}", what, e);
            None
        }
    }
}

/// Typed view of a master's HTTP API
#[derive(Clone)]
pub struct Master {
    api: Arc<dyn MasterApi>,
}

impl Master {
    pub fn new(api: Arc<dyn MasterApi>) -> Self {
        Self { api }
    }

    pub fn address(&self) -> &str {
        self.api.address()
    }

    pub async fn text(&self, path: &str) -> Result<String, FieldError> {
        let value = self.api.get_value(path).await?;
        as_text(path, value)
    }

    pub async fn number(&self, path: &str) -> Result<f64, FieldError> {
        let value = self.api.get_value(path).await?;
        as_number(path, &value)
    }

    pub async fn integer(&self, path: &str) -> Result<i64, FieldError> {
        let value = self.api.get_value(path).await?;
        as_integer(path, &value)
    }

    /// Number of IO-Link ports, from the capability tree
    pub async fn port_count(&self) -> Result<u16, FieldError> {
        let body = self.api.get_raw(paths::TREE).await?;
        count_ports(&body)
    }

    pub async fn port_status(&self, port: u16) -> Result<PortStatus, FieldError> {
        self.integer(&paths::port(port, paths::PORT_STATUS))
            .await
            .map(PortStatus::from_code)
    }

    pub async fn process_data(&self, port: u16) -> Result<String, FieldError> {
        self.text(&paths::port(port, paths::PORT_PROCESS_DATA)).await
    }

    /// Identity of the sensor on a port
    ///
    /// Fails if vendor id, device id or serial cannot be read; the two
    /// names are optional.
    pub async fn sensor_identity(&self, port: u16) -> Result<SensorIdentity, FieldError> {
        let device_id = self.id(&paths::port(port, paths::PORT_DEVICE_ID)).await?;
        let local_name = available(
            self.text(&paths::port(port, paths::PORT_LOCAL_NAME)).await,
            "sensor local name",
        );
        let serial = self.text(&paths::port(port, paths::PORT_SERIAL)).await?;
        let vendor_id = self.id(&paths::port(port, paths::PORT_VENDOR_ID)).await?;
        let product_name = available(
            self.text(&paths::port(port, paths::PORT_PRODUCT_NAME)).await,
            "sensor product name",
        );

        Ok(SensorIdentity {
            vendor_id,
            device_id,
            serial,
            product_name,
            local_name,
        })
    }

    async fn id(&self, path: &str) -> Result<u32, FieldError> {
        let raw = self.integer(path).await?;
        u32::try_from(raw)
            .map_err(|_| FieldError::protocol(path, format!("id {} out of range", raw)))
    }

    /// Identity and health fields, each independently optional
    pub async fn snapshot(&self, port_count: u16) -> MasterSnapshot {
        debug!("Reading master identity and health");
        let address = available(self.text(paths::IP_ADDRESS).await, "master IP address")
            .unwrap_or_else(|| self.address().to_string());

        MasterSnapshot {
            address,
            port_count,
            serial: available(self.text(paths::SERIAL).await, "master serial"),
            vendor: available(self.text(paths::VENDOR).await, "master vendor"),
            family: available(self.text(paths::FAMILY).await, "master family"),
            temperature: available(self.number(paths::TEMPERATURE).await, "master temperature"),
            supervision: available(self.integer(paths::SUPERVISION).await, "supervision status")
                .map(SupervisionStatus::from_code),
            current_ma: available(self.number(paths::CURRENT).await, "master current"),
            product_code: available(self.text(paths::PRODUCT_CODE).await, "master product code"),
            voltage: available(self.number(paths::VOLTAGE).await, "master voltage"),
            taken_at: Utc::now(),
        }
    }
}
