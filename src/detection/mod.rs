//! Detection module - topology changes and threshold alerts

mod threshold;
mod topology;

pub use threshold::{evaluate, AlertEvent, AlertKind, Metric, ThresholdTable, UnknownMetric};
pub use topology::{diff, ChangeEvent};

use serde::Serialize;

/// Severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// An event that is forwarded to the audit collaborator
pub trait AuditEvent: Send + Sync {
    /// Audit category (`CONFIGURATION`, `SENSOR`)
    fn event_type(&self) -> &'static str;

    /// Short event code within the category
    fn code(&self) -> &'static str;

    fn severity(&self) -> Severity;

    /// Human readable description
    fn message(&self) -> String;
}
