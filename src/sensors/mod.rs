//! Sensor module - port snapshots and process-data codecs

mod catalog;
mod codec;
mod snapshot;

pub use catalog::{UnsupportedType, IFM_VENDOR_ID, UNSUPPORTED_TYPES};
pub use codec::{
    Codec, CodecRegistry, DecodeError, DecodedFields, DecodedValue, SensorClass, ValueKind,
    TEMPERATURE, VIBRATION,
};
pub use snapshot::{
    MasterSnapshot, PortState, PortStatus, SensorIdentity, SensorSnapshot, SupervisionStatus,
    Topology,
};
