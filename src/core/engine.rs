// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Device poll cycle
//!
//! One [`DevicePoller`] owns everything it knows about a single master: the
//! port count, the identity cache filled by full polls and the topology of
//! the previous cycle. Cycles are strictly sequential; every HTTP call is
//! awaited before the next one is issued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::StartupError;
use crate::audit::{self, AuditError, AuditSink, EventStamp};
use crate::config::{resolve_address, DeviceConfig};
use crate::db::{master_point, sensor_point, stamp_point, Point, PointSink};
use crate::detection::{
    diff, evaluate, AlertEvent, AuditEvent, ChangeEvent, Severity, ThresholdTable,
};
use crate::master::{available, HttpMaster, Master};
use crate::sensors::{
    CodecRegistry, DecodeError, MasterSnapshot, PortState, SensorIdentity, SensorSnapshot,
    Topology,
};

/// Shared, read-only collaborators of every device loop
#[derive(Clone)]
pub struct PollContext {
    pub codecs: Arc<CodecRegistry>,
    pub thresholds: Arc<ThresholdTable>,
    pub storage: Arc<dyn PointSink>,
    pub audit: Arc<dyn AuditSink>,
}

/// Opens the transport to a configured master
#[async_trait]
pub trait MasterConnector: Send + Sync {
    async fn connect(&self, device: &DeviceConfig) -> Result<Master, StartupError>;
}

/// Resolves the device address once and talks plain HTTP to it
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MasterConnector for HttpConnector {
    async fn connect(&self, device: &DeviceConfig) -> Result<Master, StartupError> {
        let ip = resolve_address(&device.address).await?;
        let api = HttpMaster::new(&ip.to_string(), device.port, self.timeout)?;
        Ok(Master::new(Arc::new(api)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollMode {
    /// Master identity, health and every port's full sensor identity
    Full,
    /// Presence and process data only, identity from the cache
    Partial,
}

/// Full poll first, then `iterations` partial polls, then full again
#[derive(Debug, Clone)]
pub struct PollSchedule {
    iterations: u32,
    partials_done: Option<u32>,
}

impl PollSchedule {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations,
            partials_done: None,
        }
    }

    pub fn next_mode(&mut self) -> PollMode {
        match self.partials_done {
            Some(done) if done < self.iterations => {
                self.partials_done = Some(done + 1);
                PollMode::Partial
            }
            _ => {
                self.partials_done = Some(0);
                PollMode::Full
            }
        }
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub mode: PollMode,
    pub started_at: DateTime<Utc>,
    /// Only taken on full polls
    pub master: Option<MasterSnapshot>,
    pub topology: Topology,
    pub changes: Vec<ChangeEvent>,
    pub alerts: Vec<AlertEvent>,
    pub points_written: usize,
    pub stamps: Vec<EventStamp>,
}

/// Poll loop state for one master
pub struct DevicePoller {
    name: String,
    master: Master,
    ctx: PollContext,
    schedule: PollSchedule,
    port_count: u16,
    identities: Vec<Option<SensorIdentity>>,
    previous: Option<Topology>,
    cycles: u64,
}

impl DevicePoller {
    /// Read the port count and get ready to poll
    ///
    /// A master whose port count cannot be read is not polled at all.
    pub async fn start(
        name: &str,
        master: Master,
        iterations: u32,
        ctx: PollContext,
    ) -> Result<Self, StartupError> {
        let port_count = master.port_count().await.map_err(StartupError::PortCount)?;
        info!("{} at {} has {} IO-Link ports", name, master.address(), port_count);

        Ok(Self {
            name: name.to_string(),
            master,
            ctx,
            schedule: PollSchedule::new(iterations),
            port_count,
            identities: vec![None; usize::from(port_count)],
            previous: None,
            cycles: 0,
        })
    }

    /// Connect to a configured device and start polling it
    pub async fn connect(
        device: &DeviceConfig,
        connector: &dyn MasterConnector,
        ctx: PollContext,
    ) -> Result<Self, StartupError> {
        let master = connector.connect(device).await?;
        Self::start(&device.name, master, device.cadence().iterations, ctx).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_count(&self) -> u16 {
        self.port_count
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one poll cycle
    ///
    /// Never fails: unreadable fields, undecodable data and collaborator
    /// errors are logged and reflected in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mode = self.schedule.next_mode();
        let started_at = Utc::now();
        debug!("{} cycle {} ({:?})", self.name, self.cycles + 1, mode);

        let master = match mode {
            PollMode::Full => Some(self.full_poll().await),
            PollMode::Partial => None,
        };
        let mut topology = self.read_ports(mode).await;
        self.decode(&mut topology);

        let changes = diff(self.previous.as_ref(), &topology);
        for change in &changes {
            log_event(&self.name, change);
        }

        let alerts: Vec<AlertEvent> = topology
            .sensors()
            .filter_map(|sensor| {
                let decoded = sensor.decoded.as_ref()?;
                Some(evaluate(
                    sensor.port,
                    decoded,
                    &self.ctx.thresholds,
                    &sensor.identity,
                ))
            })
            .flatten()
            .collect();
        for alert in &alerts {
            log_event(&self.name, alert);
        }

        // Sensor and audit records are keyed by the address we poll, not the
        // one the master reports
        let address = self.master.address().to_string();

        let mut points = Vec::new();
        if let Some(snapshot) = &master {
            points.push(master_point(snapshot));
        }
        for sensor in topology.sensors() {
            if let Some(decoded) = &sensor.decoded {
                points.push(sensor_point(&address, sensor, decoded, started_at));
            }
        }

        let events = changes
            .iter()
            .map(|change| change as &dyn AuditEvent)
            .chain(alerts.iter().map(|alert| alert as &dyn AuditEvent));
        let mut stamps = Vec::new();
        for event in events {
            if let Some((stamp, point)) = self.stamp(&address, event).await {
                stamps.push(stamp);
                points.push(point);
            }
        }

        let points_written = self.store(&points).await;

        self.previous = Some(topology.clone().settle(self.previous.as_ref()));
        self.cycles += 1;

        CycleReport {
            mode,
            started_at,
            master,
            topology,
            changes,
            alerts,
            points_written,
            stamps,
        }
    }

    /// Port count refresh and master identity/health
    async fn full_poll(&mut self) -> MasterSnapshot {
        match self.master.port_count().await {
            Ok(count) if count != self.port_count => {
                info!("{} port count changed from {} to {}", self.name, self.port_count, count);
                self.port_count = count;
            }
            Ok(_) => {}
            Err(e) => warn!("{} keeping {} ports: {}", self.name, self.port_count, e),
        }
        self.identities.resize(usize::from(self.port_count), None);

        self.master.snapshot(self.port_count).await
    }

    async fn read_ports(&mut self, mode: PollMode) -> Topology {
        let mut ports = Vec::with_capacity(usize::from(self.port_count));
        for port in 1..=self.port_count {
            ports.push(self.read_port(port, mode).await);
        }
        Topology::new(ports)
    }

    /// Presence, identity and process data of one port
    ///
    /// Full polls always re-read the identity. Partial polls reuse the
    /// cached one and only fetch it for a sensor that arrived since.
    async fn read_port(&mut self, port: u16, mode: PollMode) -> PortState {
        let index = usize::from(port - 1);

        let status = match self.master.port_status(port).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Port {} status unavailable: {}", port, e);
                return PortState::Unknown;
            }
        };

        if !status.is_present() {
            debug!("Port {} empty ({:?})", port, status);
            self.identities[index] = None;
            return PortState::Absent;
        }

        let cached = match mode {
            PollMode::Full => None,
            PollMode::Partial => self.identities[index].clone(),
        };
        let identity = match cached {
            Some(identity) => identity,
            None => match self.master.sensor_identity(port).await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Port {} sensor identity unavailable: {}", port, e);
                    return PortState::Unknown;
                }
            },
        };
        self.identities[index] = Some(identity.clone());

        let process_data = available(self.master.process_data(port).await, "process data");
        PortState::Present(SensorSnapshot::new(port, identity, process_data))
    }

    fn decode(&self, topology: &mut Topology) {
        for sensor in topology.sensors_mut() {
            let Some(raw) = sensor.process_data.as_deref() else {
                continue;
            };
            let identity = &sensor.identity;
            match self.ctx.codecs.decode(identity.vendor_id, identity.device_id, raw) {
                Ok(fields) => sensor.decoded = Some(fields),
                Err(e @ DecodeError::NoData) => {
                    debug!("Port {} ({}): {}", sensor.port, identity.label(), e)
                }
                Err(e @ DecodeError::Unsupported { .. }) => {
                    info!("Port {} ({}): {}", sensor.port, identity.label(), e)
                }
                Err(e) => warn!("Port {} ({}): {}", sensor.port, identity.label(), e),
            }
        }
    }

    async fn stamp(&self, address: &str, event: &dyn AuditEvent) -> Option<(EventStamp, Point)> {
        let payload = audit::payload(address, event);
        match self.ctx.audit.submit(event.event_type(), &payload).await {
            Ok(stamp) => {
                debug!("{} stamped as {}", event.code(), stamp.eventstamp);
                let point = stamp_point(address, &stamp, event.code(), &payload.to_string());
                Some((stamp, point))
            }
            Err(AuditError::Disabled) => None,
            Err(e) => {
                warn!("Audit of {} dropped: {}", event.code(), e);
                None
            }
        }
    }

    async fn store(&self, points: &[Point]) -> usize {
        if points.is_empty() {
            return 0;
        }
        match self.ctx.storage.write_points(points).await {
            Ok(()) => points.len(),
            Err(e) => {
                error!("Storing {} points failed: {}", points.len(), e);
                0
            }
        }
    }
}

fn log_event(device: &str, event: &dyn AuditEvent) {
    match event.severity() {
        Severity::Low => info!("{}: {}", device, event.message()),
        Severity::Medium => warn!("{}: {}", device, event.message()),
        Severity::High => error!("{}: {}", device, event.message()),
    }
}
