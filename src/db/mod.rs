// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Time-series storage for master and sensor measurements

mod influx;
mod points;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use influx::InfluxSink;
pub use points::{master_point, sensor_point, stamp_point};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteSink, StoredPoint};

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Storage write failure
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("write rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// A typed field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// One measurement point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn tag(mut self, key: &str, value: impl ToString) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// Add a field only when the value is available
    pub fn field_opt<V: Into<FieldValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Encode as one InfluxDB line-protocol line with second precision
    ///
    /// Empty tag values and non-finite floats are dropped since line
    /// protocol cannot carry them. Returns `None` if no field survives.
    pub fn to_line_protocol(&self) -> Option<String> {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let encoded = match value {
                    FieldValue::Float(v) if v.is_finite() => format!("{}", v),
                    FieldValue::Float(_) => return None,
                    FieldValue::Integer(v) => format!("{}i", v),
                    FieldValue::Text(v) => format!("\"{}\"", escape(v, &['"'])),
                    FieldValue::Bool(v) => v.to_string(),
                };
                Some(format!("{}={}", escape(key, &[',', '=', ' ']), encoded))
            })
            .collect();

        if fields.is_empty() {
            return None;
        }

        let _ = write!(line, " {} {}", fields.join(","), self.timestamp.timestamp());
        Some(line)
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Destination for measurement points
#[async_trait]
pub trait PointSink: Send + Sync {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError>;
}

/// Sink used when storage is disabled
pub struct DiscardSink;

#[async_trait]
impl PointSink for DiscardSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        debug!("Storage disabled, discarding {} points", points.len());
        Ok(())
    }
}
