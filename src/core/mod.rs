//! Core module - device poll cycles and their supervision

mod engine;
mod scheduler;

pub use engine::{
    CycleReport, DevicePoller, HttpConnector, MasterConnector, PollContext, PollMode, PollSchedule,
};
pub use scheduler::{DeviceHealth, HealthMap, HealthState, Supervisor};

use thiserror::Error;

use crate::config::ConfigError;
use crate::master::FieldError;

/// A device that could not be brought up; it is not polled
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot determine port count: {0}")]
    PortCount(#[source] FieldError),

    #[error("cannot build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
