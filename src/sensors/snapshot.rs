// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Per-cycle snapshots of a master and its ports

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::DecodedFields;

/// IO-Link port state as reported by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortStatus {
    NotConnected,
    Preoperate,
    Operate,
    WrongSensor,
    Other(i64),
}

impl PortStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PortStatus::NotConnected,
            1 => PortStatus::Preoperate,
            2 => PortStatus::Operate,
            3 => PortStatus::WrongSensor,
            other => PortStatus::Other(other),
        }
    }

    /// Only a sensor in operate mode delivers process data
    pub fn is_present(&self) -> bool {
        matches!(self, PortStatus::Operate)
    }
}

/// Supervision state of the master's power stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisionStatus {
    NoError,
    ShortCircuit,
    Overload,
    Undervoltage,
    Other(i64),
}

impl SupervisionStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => SupervisionStatus::NoError,
            1 => SupervisionStatus::ShortCircuit,
            2 => SupervisionStatus::Overload,
            3 => SupervisionStatus::Undervoltage,
            other => SupervisionStatus::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            SupervisionStatus::NoError => 0,
            SupervisionStatus::ShortCircuit => 1,
            SupervisionStatus::Overload => 2,
            SupervisionStatus::Undervoltage => 3,
            SupervisionStatus::Other(code) => *code,
        }
    }
}

/// Identity of a connected sensor
///
/// Vendor id, device id and serial are required: they key the codec
/// registry, the topology diff and the threshold table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorIdentity {
    pub vendor_id: u32,
    pub device_id: u32,
    pub serial: String,
    pub product_name: Option<String>,
    pub local_name: Option<String>,
}

impl SensorIdentity {
    /// Human readable "product/local name" label
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.product_name.as_deref().unwrap_or("?"),
            self.local_name.as_deref().unwrap_or("?")
        )
    }
}

/// A sensor present on a port during one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub port: u16,
    pub identity: SensorIdentity,
    /// Raw hex process data, absent when the read failed
    pub process_data: Option<String>,
    /// Filled in by the codec registry; `None` when undecodable
    pub decoded: Option<DecodedFields>,
}

impl SensorSnapshot {
    pub fn new(port: u16, identity: SensorIdentity, process_data: Option<String>) -> Self {
        Self {
            port,
            identity,
            process_data,
            decoded: None,
        }
    }
}

/// What occupies a port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PortState {
    Absent,
    Present(SensorSnapshot),
    /// Presence or identity could not be read this cycle
    Unknown,
}

impl PortState {
    pub fn sensor(&self) -> Option<&SensorSnapshot> {
        match self {
            PortState::Present(sensor) => Some(sensor),
            _ => None,
        }
    }
}

/// Ordered port states of one master, index 0 is port 1
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topology {
    ports: Vec<PortState>,
}

impl Topology {
    pub fn new(ports: Vec<PortState>) -> Self {
        Self { ports }
    }

    /// Topology with every port empty
    pub fn empty(port_count: u16) -> Self {
        Self {
            ports: vec![PortState::Absent; usize::from(port_count)],
        }
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// State of a 1-based port number
    pub fn port(&self, port: u16) -> Option<&PortState> {
        usize::from(port)
            .checked_sub(1)
            .and_then(|index| self.ports.get(index))
    }

    /// Iterate `(port number, state)` in ascending port order
    pub fn ports(&self) -> impl Iterator<Item = (u16, &PortState)> {
        self.ports
            .iter()
            .enumerate()
            .map(|(index, state)| (index as u16 + 1, state))
    }

    pub fn sensors(&self) -> impl Iterator<Item = &SensorSnapshot> {
        self.ports.iter().filter_map(PortState::sensor)
    }

    pub fn sensors_mut(&mut self) -> impl Iterator<Item = &mut SensorSnapshot> {
        self.ports.iter_mut().filter_map(|state| match state {
            PortState::Present(sensor) => Some(sensor),
            _ => None,
        })
    }

    /// Resolve `Unknown` ports to their last known state
    ///
    /// Used when this snapshot becomes the "previous" one, so a port that
    /// could not be read for a cycle does not look like a fresh arrival
    /// next time.
    pub fn settle(mut self, previous: Option<&Topology>) -> Topology {
        if let Some(previous) = previous {
            for (index, state) in self.ports.iter_mut().enumerate() {
                if *state == PortState::Unknown {
                    if let Some(known) = previous.ports.get(index) {
                        *state = known.clone();
                    }
                }
            }
        }
        self
    }
}

/// Identity and health of a master for one full poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterSnapshot {
    pub address: String,
    pub port_count: u16,
    pub serial: Option<String>,
    pub vendor: Option<String>,
    pub family: Option<String>,
    pub product_code: Option<String>,
    pub temperature: Option<f64>,
    pub current_ma: Option<f64>,
    pub voltage: Option<f64>,
    pub supervision: Option<SupervisionStatus>,
    pub taken_at: DateTime<Utc>,
}
