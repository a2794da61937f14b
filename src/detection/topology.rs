// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Topology diffing between consecutive poll cycles

use serde::Serialize;

use super::{AuditEvent, Severity};
use crate::sensors::{PortState, Topology};

/// A sensor arrived, left or was swapped on a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEvent {
    SensorAdded {
        port: u16,
        device_id: u32,
        serial: String,
    },
    SensorRemoved {
        port: u16,
        device_id: u32,
        serial: String,
    },
    SensorTypeChanged {
        port: u16,
        old_device_id: u32,
        new_device_id: u32,
        serial: String,
    },
    SensorSerialChanged {
        port: u16,
        device_id: u32,
        old_serial: String,
        new_serial: String,
    },
}

impl AuditEvent for ChangeEvent {
    fn event_type(&self) -> &'static str {
        "CONFIGURATION"
    }

    fn code(&self) -> &'static str {
        match self {
            ChangeEvent::SensorAdded { .. } => "NEWSENSORFOUND",
            ChangeEvent::SensorRemoved { .. } => "SENSORNOTFOUND",
            ChangeEvent::SensorTypeChanged { .. } => "SENSORTYPECHANGED",
            ChangeEvent::SensorSerialChanged { .. } => "SENSORSERIALCHANGED",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            ChangeEvent::SensorAdded { .. } => Severity::Low,
            ChangeEvent::SensorSerialChanged { .. } => Severity::Medium,
            ChangeEvent::SensorTypeChanged { .. } => Severity::Medium,
            ChangeEvent::SensorRemoved { .. } => Severity::High,
        }
    }

    fn message(&self) -> String {
        match self {
            ChangeEvent::SensorAdded { port, device_id, serial } => format!(
                "New sensor on port {} detected, type {}, with serial {}",
                port, device_id, serial
            ),
            ChangeEvent::SensorRemoved { port, device_id, serial } => format!(
                "Sensor on port {}, type {}, with serial {} not found",
                port, device_id, serial
            ),
            ChangeEvent::SensorTypeChanged {
                port,
                old_device_id,
                new_device_id,
                serial,
            } => format!(
                "Sensor type on port {} changed from {} to {}, with serial {}",
                port, old_device_id, new_device_id, serial
            ),
            ChangeEvent::SensorSerialChanged {
                port,
                device_id,
                old_serial,
                new_serial,
            } => format!(
                "Sensor serial on port {} changed from {} to {}, type {}",
                port, old_serial, new_serial, device_id
            ),
        }
    }
}

/// Compare two topologies port by port
///
/// Returns nothing when there is no previous snapshot. Ports missing on one
/// side count as empty; `Unknown` ports never produce events. Events are in
/// ascending port order.
pub fn diff(previous: Option<&Topology>, current: &Topology) -> Vec<ChangeEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let port_count = previous.port_count().max(current.port_count());
    let mut events = Vec::new();

    for port in 1..=port_count as u16 {
        let before = previous.port(port).unwrap_or(&PortState::Absent);
        let after = current.port(port).unwrap_or(&PortState::Absent);

        let event = match (before, after) {
            (PortState::Absent, PortState::Present(new)) => Some(ChangeEvent::SensorAdded {
                port,
                device_id: new.identity.device_id,
                serial: new.identity.serial.clone(),
            }),
            (PortState::Present(old), PortState::Absent) => Some(ChangeEvent::SensorRemoved {
                port,
                device_id: old.identity.device_id,
                serial: old.identity.serial.clone(),
            }),
            (PortState::Present(old), PortState::Present(new)) => {
                if old.identity.device_id != new.identity.device_id {
                    Some(ChangeEvent::SensorTypeChanged {
                        port,
                        old_device_id: old.identity.device_id,
                        new_device_id: new.identity.device_id,
                        serial: new.identity.serial.clone(),
                    })
                } else if old.identity.serial != new.identity.serial {
                    Some(ChangeEvent::SensorSerialChanged {
                        port,
                        device_id: new.identity.device_id,
                        old_serial: old.identity.serial.clone(),
                        new_serial: new.identity.serial.clone(),
                    })
                } else {
                    None
                }
            }
            _ => None,
        };

        events.extend(event);
    }

    events
}
