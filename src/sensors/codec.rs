// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Process-data codecs keyed by (vendor id, device id)
//!
//! IO-Link masters report a sensor's process data as a hex string whose
//! layout depends on the device type. The registry maps each known
//! (vendor, device) pair either to a codec or to an explicit
//! "known but unsupported" marker, so adding a sensor family is a table
//! entry rather than another branch.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::catalog::{IFM_VENDOR_ID, UNSUPPORTED_TYPES};

/// Measurement family a codec produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SensorClass {
    Vibration,
    Temperature,
}

impl SensorClass {
    /// Storage measurement name for this class
    pub fn measurement(&self) -> &'static str {
        match self {
            SensorClass::Vibration => "vibrationEvents",
            SensorClass::Temperature => "temperatureEvents",
        }
    }
}

/// How a decoded value should be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    Integer,
    Float,
}

/// One named value pulled out of process data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedValue {
    pub name: &'static str,
    pub value: f64,
    pub kind: ValueKind,
}

impl DecodedValue {
    fn integer(name: &'static str, value: u64) -> Self {
        Self {
            name,
            value: value as f64,
            kind: ValueKind::Integer,
        }
    }

    fn float(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value,
            kind: ValueKind::Float,
        }
    }
}

/// Result of a successful decode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFields {
    pub class: SensorClass,
    pub values: Vec<DecodedValue>,
}

impl DecodedFields {
    /// Look up a value by field name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Why process data could not be turned into measurements
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no process data reported")]
    NoData,

    #[error("unhandled sensor type {device_id} from vendor {vendor_id} ({products})")]
    Unsupported {
        vendor_id: u32,
        device_id: u32,
        products: &'static str,
    },

    #[error("unrecognized sensor type {device_id} from vendor {vendor_id}")]
    Unknown { vendor_id: u32, device_id: u32 },

    #[error("malformed process data {raw:?}: {reason}")]
    Malformed { raw: String, reason: &'static str },
}

/// A fixed-layout process-data decoder
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub class: SensorClass,
    /// Accepted payload sizes in bytes
    pub widths: &'static [usize],
    pub decode: fn(&[u8]) -> Vec<DecodedValue>,
}

impl Codec {
    pub const fn new(
        class: SensorClass,
        widths: &'static [usize],
        decode: fn(&[u8]) -> Vec<DecodedValue>,
    ) -> Self {
        Self { class, widths, decode }
    }
}

#[derive(Debug, Clone, Copy)]
enum CodecEntry {
    Supported(Codec),
    Unsupported(&'static str),
}

/// Vibration sensors (JN2201, JN2202)
///
/// Bytes 0-1 acceleration and 2-3 velocity, both big-endian in hundredths;
/// byte 4 diagnosis; high nibble of byte 5 configuration.
pub const VIBRATION: Codec = Codec::new(SensorClass::Vibration, &[6], decode_vibration);

/// Temperature transmitters (TA2xxx family)
///
/// The whole payload is an unsigned big-endian integer in tenths of a degree.
pub const TEMPERATURE: Codec = Codec::new(SensorClass::Temperature, &[2, 4], decode_temperature);

fn decode_vibration(bytes: &[u8]) -> Vec<DecodedValue> {
    let acceleration = u16::from_be_bytes([bytes[0], bytes[1]]);
    let velocity = u16::from_be_bytes([bytes[2], bytes[3]]);
    vec![
        DecodedValue::integer("configuration", u64::from(bytes[5] >> 4)),
        DecodedValue::integer("diagnosis", u64::from(bytes[4])),
        DecodedValue::float("velocity", f64::from(velocity) / 100.0),
        DecodedValue::float("acceleration", f64::from(acceleration) / 100.0),
    ]
}

fn decode_temperature(bytes: &[u8]) -> Vec<DecodedValue> {
    let raw = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    vec![DecodedValue::float("temperature", raw as f64 / 10.0)]
}

/// Parse a hex string into bytes, rejecting anything but hex digit pairs
fn parse_hex(raw: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(raw).map_err(|e| DecodeError::Malformed {
        raw: raw.to_string(),
        reason: match e {
            hex::FromHexError::OddLength => "odd number of hex digits",
            hex::FromHexError::InvalidHexCharacter { .. } => "non-hex characters",
            hex::FromHexError::InvalidStringLength => "invalid string length",
        },
    })
}

/// Table of process-data codecs
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    entries: HashMap<(u32, u32), CodecEntry>,
}

impl CodecRegistry {
    /// Registry with no entries
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a decoder for a (vendor, device) pair, replacing any entry
    pub fn register(&mut self, vendor_id: u32, device_id: u32, codec: Codec) {
        self.entries
            .insert((vendor_id, device_id), CodecEntry::Supported(codec));
    }

    /// Record a pair as known but without a decoder
    pub fn mark_unsupported(&mut self, vendor_id: u32, device_id: u32, products: &'static str) {
        self.entries
            .insert((vendor_id, device_id), CodecEntry::Unsupported(products));
    }

    /// Measurement class for a pair, if it has a decoder
    pub fn class_of(&self, vendor_id: u32, device_id: u32) -> Option<SensorClass> {
        match self.entries.get(&(vendor_id, device_id)) {
            Some(CodecEntry::Supported(codec)) => Some(codec.class),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode raw process data for a sensor
    pub fn decode(
        &self,
        vendor_id: u32,
        device_id: u32,
        raw: &str,
    ) -> Result<DecodedFields, DecodeError> {
        let codec = match self.entries.get(&(vendor_id, device_id)) {
            Some(CodecEntry::Supported(codec)) => codec,
            Some(CodecEntry::Unsupported(products)) => {
                return Err(DecodeError::Unsupported {
                    vendor_id,
                    device_id,
                    products,
                })
            }
            None => return Err(DecodeError::Unknown { vendor_id, device_id }),
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DecodeError::NoData);
        }

        let bytes = parse_hex(raw)?;
        if !codec.widths.contains(&bytes.len()) {
            return Err(DecodeError::Malformed {
                raw: raw.to_string(),
                reason: "unexpected payload width",
            });
        }

        Ok(DecodedFields {
            class: codec.class,
            values: (codec.decode)(&bytes),
        })
    }
}

impl Default for CodecRegistry {
    /// Built-in ifm codecs plus the unsupported catalog
    fn default() -> Self {
        let mut registry = Self::empty();
        for entry in UNSUPPORTED_TYPES {
            registry.mark_unsupported(entry.vendor_id, entry.device_id, entry.products);
        }
        registry.register(IFM_VENDOR_ID, 416, VIBRATION);
        registry.register(IFM_VENDOR_ID, 417, VIBRATION);
        registry.register(IFM_VENDOR_ID, 446, TEMPERATURE);
        registry
    }
}
