// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Threshold evaluation for decoded sensor values

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AuditEvent, Severity};
use crate::sensors::{DecodedFields, SensorClass, SensorIdentity};

/// A configurable limit on a decoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    AccelerationMax,
    VelocityMax,
    TemperatureMin,
    TemperatureMax,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::AccelerationMax => "accelerationMax",
            Metric::VelocityMax => "velocityMax",
            Metric::TemperatureMin => "temperatureMin",
            Metric::TemperatureMax => "temperatureMax",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown threshold metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    /// Accepts the legacy property names (`acceleration`, `temperaturemax`, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acceleration" | "accelerationmax" => Ok(Metric::AccelerationMax),
            "velocity" | "velocitymax" => Ok(Metric::VelocityMax),
            "temperaturemin" => Ok(Metric::TemperatureMin),
            "temperaturemax" => Ok(Metric::TemperatureMax),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = UnknownMetric;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.name().to_string()
    }
}

/// Limits keyed by (vendor id, sensor serial, metric)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    limits: HashMap<(u32, Metric), HashMap<String, f64>>,
}

impl ThresholdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, vendor_id: u32, serial: &str, metric: Metric, limit: f64) {
        self.limits
            .entry((vendor_id, metric))
            .or_default()
            .insert(serial.to_string(), limit);
    }

    pub fn get(&self, vendor_id: u32, serial: &str, metric: Metric) -> Option<f64> {
        self.limits
            .get(&(vendor_id, metric))
            .and_then(|by_serial| by_serial.get(serial))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.limits.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which limit was crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    AccelerationExceeded,
    VelocityExceeded,
    TemperatureBelowMin,
    TemperatureAboveMax,
}

/// A decoded value outside its configured limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub port: u16,
    pub vendor_id: u32,
    pub serial: String,
    pub sensor: String,
    pub value: f64,
    pub limit: f64,
}

impl AuditEvent for AlertEvent {
    fn event_type(&self) -> &'static str {
        "SENSOR"
    }

    fn code(&self) -> &'static str {
        match self.kind {
            AlertKind::AccelerationExceeded => "ACCELERATION",
            AlertKind::VelocityExceeded => "VELOCITY",
            AlertKind::TemperatureBelowMin => "TEMPERATUREMIN",
            AlertKind::TemperatureAboveMax => "TEMPERATUREMAX",
        }
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn message(&self) -> String {
        let what = match self.kind {
            AlertKind::AccelerationExceeded => "Acceleration value",
            AlertKind::VelocityExceeded => "Velocity value",
            AlertKind::TemperatureBelowMin | AlertKind::TemperatureAboveMax => "Temperature value",
        };
        let bound = match self.kind {
            AlertKind::TemperatureBelowMin => "is below minimum threshold",
            AlertKind::TemperatureAboveMax => "exceeds maximum threshold",
            _ => "exceeds threshold",
        };
        format!(
            "{} for {} sensor on port {} {}, {}--{}",
            what, self.sensor, self.port, bound, self.value, self.limit
        )
    }
}

/// Check one sensor's decoded values against its configured limits
///
/// Missing limits default to an unbounded range, so an unconfigured metric
/// never alerts. Stateless: the same inputs always give the same alerts.
pub fn evaluate(
    port: u16,
    decoded: &DecodedFields,
    thresholds: &ThresholdTable,
    identity: &SensorIdentity,
) -> Vec<AlertEvent> {
    let limit = |metric| thresholds.get(identity.vendor_id, &identity.serial, metric);
    let alert = |kind, value, bound| AlertEvent {
        kind,
        port,
        vendor_id: identity.vendor_id,
        serial: identity.serial.clone(),
        sensor: identity.label(),
        value,
        limit: bound,
    };

    let mut alerts = Vec::new();
    match decoded.class {
        SensorClass::Vibration => {
            let checks = [
                ("acceleration", Metric::AccelerationMax, AlertKind::AccelerationExceeded),
                ("velocity", Metric::VelocityMax, AlertKind::VelocityExceeded),
            ];
            for (field, metric, kind) in checks {
                let Some(value) = decoded.get(field) else {
                    continue;
                };
                let max = limit(metric).unwrap_or(f64::INFINITY);
                if value > max {
                    alerts.push(alert(kind, value, max));
                }
            }
        }
        SensorClass::Temperature => {
            if let Some(value) = decoded.get("temperature") {
                let min = limit(Metric::TemperatureMin).unwrap_or(f64::NEG_INFINITY);
                let max = limit(Metric::TemperatureMax).unwrap_or(f64::INFINITY);
                if value < min {
                    alerts.push(alert(AlertKind::TemperatureBelowMin, value, min));
                } else if value > max {
                    alerts.push(alert(AlertKind::TemperatureAboveMax, value, max));
                }
            }
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::CodecRegistry;

    fn identity(device_id: u32, serial: &str) -> SensorIdentity {
        SensorIdentity {
            vendor_id: 310,
            device_id,
            serial: serial.to_string(),
            product_name: Some("JN2201".to_string()),
            local_name: Some("pump-3".to_string()),
        }
    }

    fn vibration(acceleration: f64, velocity: f64) -> DecodedFields {
        let hex = format!(
            "{:04X}{:04X}0000",
            (acceleration * 100.0).round() as u16,
            (velocity * 100.0).round() as u16
        );
        CodecRegistry::default().decode(310, 416, &hex).unwrap()
    }

    fn temperature(value: f64) -> DecodedFields {
        let hex = format!("{:08X}", (value * 10.0).round() as u32);
        CodecRegistry::default().decode(310, 446, &hex).unwrap()
    }

    #[test]
    fn test_metric_names() {
        assert_eq!("accelerationMax".parse::<Metric>().unwrap(), Metric::AccelerationMax);
        assert_eq!("acceleration".parse::<Metric>().unwrap(), Metric::AccelerationMax);
        assert_eq!("TemperatureMin".parse::<Metric>().unwrap(), Metric::TemperatureMin);
        assert_eq!("velocity".parse::<Metric>().unwrap(), Metric::VelocityMax);
        assert!("humidity".parse::<Metric>().is_err());
    }

    #[test]
    fn test_acceleration_limit() {
        let mut table = ThresholdTable::new();
        table.insert(310, "S1", Metric::AccelerationMax, 5.0);
        let sensor = identity(416, "S1");

        let alerts = evaluate(1, &vibration(6.0, 1.0), &table, &sensor);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::AccelerationExceeded);
        assert_eq!(alerts[0].value, 6.0);
        assert_eq!(alerts[0].limit, 5.0);

        assert!(evaluate(1, &vibration(4.0, 1.0), &table, &sensor).is_empty());
    }

    #[test]
    fn test_vibration_checks_are_independent() {
        let mut table = ThresholdTable::new();
        table.insert(310, "S1", Metric::AccelerationMax, 5.0);
        table.insert(310, "S1", Metric::VelocityMax, 2.0);

        let alerts = evaluate(3, &vibration(7.5, 3.0), &table, &identity(417, "S1"));
        let kinds: Vec<_> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::AccelerationExceeded, AlertKind::VelocityExceeded]);
    }

    #[test]
    fn test_missing_limit_never_alerts() {
        let table = ThresholdTable::new();
        assert!(evaluate(1, &vibration(600.0, 600.0), &table, &identity(416, "S1")).is_empty());
        assert!(evaluate(1, &temperature(6000.0), &table, &identity(446, "T1")).is_empty());
    }

    #[test]
    fn test_limits_are_per_serial() {
        let mut table = ThresholdTable::new();
        table.insert(310, "OTHER", Metric::AccelerationMax, 1.0);
        assert!(evaluate(1, &vibration(6.0, 0.0), &table, &identity(416, "S1")).is_empty());
    }

    #[test]
    fn test_temperature_above_max_only() {
        let mut table = ThresholdTable::new();
        table.insert(310, "T1", Metric::TemperatureMin, -10.0);
        table.insert(310, "T1", Metric::TemperatureMax, 50.0);

        let alerts = evaluate(2, &temperature(60.0), &table, &identity(446, "T1"));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::TemperatureAboveMax);
    }

    #[test]
    fn test_temperature_min_takes_precedence() {
        let mut table = ThresholdTable::new();
        table.insert(310, "T1", Metric::TemperatureMin, 70.0);
        table.insert(310, "T1", Metric::TemperatureMax, 50.0);

        let alerts = evaluate(2, &temperature(60.0), &table, &identity(446, "T1"));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::TemperatureBelowMin);
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let mut table = ThresholdTable::new();
        table.insert(310, "S1", Metric::AccelerationMax, 5.0);
        let fields = vibration(6.0, 1.0);
        let sensor = identity(416, "S1");

        let first = evaluate(1, &fields, &table, &sensor);
        let second = evaluate(1, &fields, &table, &sensor);
        assert_eq!(first, second);
    }

    #[test]
    fn test_alert_audit_fields() {
        let mut table = ThresholdTable::new();
        table.insert(310, "T1", Metric::TemperatureMax, 50.0);
        let alerts = evaluate(2, &temperature(60.0), &table, &identity(446, "T1"));

        assert_eq!(alerts[0].event_type(), "SENSOR");
        assert_eq!(alerts[0].code(), "TEMPERATUREMAX");
        assert!(alerts[0].message().contains("JN2201/pump-3"));
    }
}
