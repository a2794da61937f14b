// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! sensorcap - IO-Link master polling engine
//!
//! Polls a fleet of IO-Link masters over their HTTP API, decodes sensor
//! process data, tracks which sensor sits on which port and raises alerts
//! when decoded values cross configured limits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Supervisor                           │
//! │      one task per master, restart with backoff on panic      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐  │
//! │  │ Master │ → │  Codec   │ → │ Topology │ → │  Threshold  │  │
//! │  │  HTTP  │   │ Registry │   │  Differ  │   │  Evaluator  │  │
//! │  └────────┘   └──────────┘   └──────────┘   └─────────────┘  │
//! │                      ↓                           ↓           │
//! │            ┌───────────────────┐      ┌─────────────────┐    │
//! │            │ Storage (Influx,  │      │  Audit stamping │    │
//! │            │ SQLite)           │      │                 │    │
//! │            └───────────────────┘      └─────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod master;
pub mod sensors;

// Re-exports for convenience
pub use audit::{AuditSink, EventStamp, EventStampCommand};
pub use config::Config;
pub use core::{CycleReport, DevicePoller, PollContext, StartupError, Supervisor};
pub use db::{Point, PointSink};
pub use detection::{diff, evaluate, AlertEvent, ChangeEvent, ThresholdTable};
pub use master::{Master, MasterApi};
pub use sensors::{CodecRegistry, Topology};

/// sensorcap version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// sensorcap name
pub const NAME: &str = "sensorcap";
