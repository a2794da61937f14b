// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Point layouts for the measurements a poll cycle produces

use chrono::{DateTime, Utc};

use super::{FieldValue, Point};
use crate::audit::EventStamp;
use crate::sensors::{DecodedFields, MasterSnapshot, SensorSnapshot, ValueKind};

pub const MASTER_MEASUREMENT: &str = "iolmEvents";
pub const AUDIT_MEASUREMENT: &str = "saasResults";

/// Master identity and health, written on full polls
pub fn master_point(snapshot: &MasterSnapshot) -> Point {
    Point::new(MASTER_MEASUREMENT)
        .at(snapshot.taken_at)
        .tag("iolmip", &snapshot.address)
        .tag("serial", snapshot.serial.as_deref().unwrap_or_default())
        .tag("vendor", snapshot.vendor.as_deref().unwrap_or_default())
        .tag("family", snapshot.family.as_deref().unwrap_or_default())
        .tag("productcode", snapshot.product_code.as_deref().unwrap_or_default())
        .tag("ports", snapshot.port_count)
        .field_opt("volts", snapshot.voltage)
        .field_opt("milliamperes", snapshot.current_ma)
        .field_opt("temperature", snapshot.temperature)
        .field_opt("status", snapshot.supervision.map(|s| s.code()))
}

/// Decoded values of one sensor, in its class measurement
pub fn sensor_point(
    address: &str,
    sensor: &SensorSnapshot,
    decoded: &DecodedFields,
    timestamp: DateTime<Utc>,
) -> Point {
    let identity = &sensor.identity;
    let mut point = Point::new(decoded.class.measurement())
        .at(timestamp)
        .tag("iolmip", address)
        .tag("sensorvendorid", identity.vendor_id)
        .tag("sensorserial", &identity.serial)
        .tag("sensorport", sensor.port)
        .tag("sensorlocalname", identity.local_name.as_deref().unwrap_or_default())
        .tag("sensorname", identity.product_name.as_deref().unwrap_or_default())
        .tag("sensortype", identity.device_id);

    for value in &decoded.values {
        let field = match value.kind {
            ValueKind::Integer => FieldValue::Integer(value.value as i64),
            ValueKind::Float => FieldValue::Float(value.value),
        };
        point = point.field(value.name, field);
    }
    point
}

/// Record of an event accepted by the audit collaborator
pub fn stamp_point(address: &str, stamp: &EventStamp, code: &str, payload: &str) -> Point {
    Point::new(AUDIT_MEASUREMENT)
        .tag("iolmip", address)
        .tag("agentuuid", stamp.uuid)
        .tag("eventstamp", &stamp.eventstamp)
        .field("event", code)
        .field("eventdata", payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{CodecRegistry, SensorIdentity, SupervisionStatus};

    #[test]
    fn test_master_point_skips_missing_fields() {
        let snapshot = MasterSnapshot {
            address: "10.0.0.5".to_string(),
            port_count: 8,
            serial: Some("000174210147".to_string()),
            vendor: Some("ifm electronic gmbh".to_string()),
            family: None,
            product_code: Some("AL1350".to_string()),
            temperature: Some(41.0),
            current_ma: None,
            voltage: Some(23.9),
            supervision: Some(SupervisionStatus::NoError),
            taken_at: Utc::now(),
        };

        let point = master_point(&snapshot);
        assert_eq!(point.measurement, "iolmEvents");
        assert_eq!(point.get_tag("ports"), Some("8"));
        assert_eq!(point.get_field("volts"), Some(&FieldValue::Float(23.9)));
        assert_eq!(point.get_field("status"), Some(&FieldValue::Integer(0)));
        assert!(point.get_field("milliamperes").is_none());

        let line = point.to_line_protocol().unwrap();
        assert!(!line.contains("family="));
    }

    #[test]
    fn test_sensor_point_uses_class_measurement() {
        let sensor = SensorSnapshot::new(
            1,
            SensorIdentity {
                vendor_id: 310,
                device_id: 416,
                serial: "V1".to_string(),
                product_name: Some("JN2201".to_string()),
                local_name: Some("pump 3".to_string()),
            },
            Some("04B0014107A3".to_string()),
        );
        let decoded = CodecRegistry::default()
            .decode(310, 416, "04B0014107A3")
            .unwrap();

        let point = sensor_point("10.0.0.5", &sensor, &decoded, Utc::now());
        assert_eq!(point.measurement, "vibrationEvents");
        assert_eq!(point.get_tag("sensortype"), Some("416"));
        assert_eq!(point.get_field("acceleration"), Some(&FieldValue::Float(12.0)));
        assert_eq!(point.get_field("diagnosis"), Some(&FieldValue::Integer(7)));
    }
}
