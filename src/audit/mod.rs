// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Audit/trust collaborator
//!
//! Topology changes and threshold alerts are handed to an external stamping
//! service which answers with an agent UUID and an opaque event stamp.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::detection::AuditEvent;

/// Reply from the stamping service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStamp {
    pub uuid: Uuid,
    pub eventstamp: String,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit submission disabled")]
    Disabled,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stamping timed out after {0:?}")]
    Timeout(Duration),

    #[error("stamping exited with {status}: {stderr}")]
    Exit { status: i32, stderr: String },

    #[error("unparsable stamp output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn submit(&self, event_type: &str, payload: &Value) -> Result<EventStamp, AuditError>;
}

/// JSON payload sent for one event
pub fn payload(address: &str, event: &dyn AuditEvent) -> Value {
    json!({
        "ipaddress": address,
        "event": event.code(),
        "mesg": event.message(),
    })
}

/// Runs `<program> [args] --etype <type> --data <json>` and parses stdout
#[derive(Debug, Clone)]
pub struct EventStampCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl EventStampCommand {
    pub fn new(program: &str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl AuditSink for EventStampCommand {
    async fn submit(&self, event_type: &str, payload: &Value) -> Result<EventStamp, AuditError> {
        let data = payload.to_string();
        debug!("Submitting {} event: {}", event_type, data);

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("--etype")
            .arg(event_type)
            .arg("--data")
            .arg(&data)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| AuditError::Timeout(self.timeout))?
            .map_err(|source| AuditError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AuditError::Exit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Sink used when auditing is turned off
pub struct DisabledAudit;

#[async_trait]
impl AuditSink for DisabledAudit {
    async fn submit(&self, _event_type: &str, _payload: &Value) -> Result<EventStamp, AuditError> {
        Err(AuditError::Disabled)
    }
}
