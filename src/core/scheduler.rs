// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Per-device task supervision

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, info_span, warn, Instrument};

use super::engine::{CycleReport, DevicePoller, MasterConnector, PollContext};
use crate::config::{Cadence, DeviceConfig, SupervisorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    Starting,
    Running,
    /// Restarted repeatedly without completing a cycle
    Degraded,
    /// Could not be started; not retried
    Failed,
    Stopped,
}

/// Health of one device loop
#[derive(Debug, Clone, Serialize)]
pub struct DeviceHealth {
    pub state: HealthState,
    pub cycles: u64,
    pub restarts: u32,
    pub last_cycle: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for DeviceHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Starting,
            cycles: 0,
            restarts: 0,
            last_cycle: None,
            last_error: None,
        }
    }
}

pub type HealthMap = Arc<RwLock<HashMap<String, DeviceHealth>>>;

async fn update(health: &HealthMap, name: &str, f: impl FnOnce(&mut DeviceHealth)) {
    let mut map = health.write().await;
    f(map.entry(name.to_string()).or_default());
}

/// Runs one independent poll loop per configured device
pub struct Supervisor {
    devices: Vec<DeviceConfig>,
    policy: SupervisorConfig,
    ctx: PollContext,
    connector: Arc<dyn MasterConnector>,
    health: HealthMap,
    shutdown: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new(
        devices: Vec<DeviceConfig>,
        policy: SupervisorConfig,
        ctx: PollContext,
        connector: Arc<dyn MasterConnector>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            devices,
            policy,
            ctx,
            connector,
            health: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
        }
    }

    pub fn health(&self) -> HealthMap {
        Arc::clone(&self.health)
    }

    pub async fn device_health(&self, name: &str) -> Option<DeviceHealth> {
        self.health.read().await.get(name).cloned()
    }

    /// Stop every loop between cycles
    ///
    /// The request sticks: loops that have not started yet stop as soon as
    /// they do.
    pub fn shutdown(&self) {
        info!("Stopping {} device loops", self.devices.len());
        self.shutdown.send_replace(true);
    }

    /// Run every device until shutdown or until all have failed
    pub async fn run(&self) {
        {
            let mut map = self.health.write().await;
            for device in &self.devices {
                map.insert(device.name.clone(), DeviceHealth::default());
            }
        }

        let tasks = self.devices.iter().map(|device| {
            let span = info_span!("device", name = %device.name, address = %device.address);
            let task = DeviceTask {
                device: device.clone(),
                cadence: device.cadence(),
                policy: self.policy.clone(),
                ctx: self.ctx.clone(),
                connector: Arc::clone(&self.connector),
                health: Arc::clone(&self.health),
                shutdown: self.shutdown.subscribe(),
            };
            tokio::spawn(task.supervise().instrument(span))
        });

        for result in join_all(tasks).await {
            if let Err(e) = result {
                error!("Supervisor task ended abnormally: {}", e);
            }
        }
        info!("All device loops finished");
    }
}

struct DeviceTask {
    device: DeviceConfig,
    cadence: Cadence,
    policy: SupervisorConfig,
    ctx: PollContext,
    connector: Arc<dyn MasterConnector>,
    health: HealthMap,
    shutdown: watch::Receiver<bool>,
}

impl DeviceTask {
    fn name(&self) -> &str {
        &self.device.name
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn stopped(&self) {
        update(&self.health, self.name(), |h| h.state = HealthState::Stopped).await;
    }

    /// Start the poll loop and restart it whenever it panics
    ///
    /// Consecutive restarts without a completed cycle double the backoff
    /// up to the configured maximum and mark the device degraded once
    /// `degraded_after` is reached.
    async fn supervise(self) {
        let mut backoff = self.policy.initial_backoff();
        let mut consecutive = 0u32;
        let mut started = false;

        loop {
            if self.shutdown_requested() {
                self.stopped().await;
                return;
            }

            let connected =
                DevicePoller::connect(&self.device, self.connector.as_ref(), self.ctx.clone())
                    .await;
            let poller = match connected {
                Ok(poller) => poller,
                Err(e) if !started => {
                    error!("{} failed to start: {}", self.name(), e);
                    update(&self.health, self.name(), |h| {
                        h.state = HealthState::Failed;
                        h.last_error = Some(e.to_string());
                    })
                    .await;
                    return;
                }
                Err(e) => {
                    warn!("{} failed to restart: {}", self.name(), e);
                    update(&self.health, self.name(), |h| {
                        h.last_error = Some(e.to_string())
                    })
                    .await;
                    consecutive += 1;
                    if !self.back_off(&mut backoff, consecutive).await {
                        return;
                    }
                    continue;
                }
            };
            started = true;

            if self.shutdown_requested() {
                self.stopped().await;
                return;
            }

            let degraded = consecutive >= self.policy.degraded_after;
            update(&self.health, self.name(), |h| {
                if !degraded {
                    h.state = HealthState::Running;
                }
            })
            .await;

            let cycles_before = self.cycles().await;
            let handle = tokio::spawn(
                poll_loop(
                    poller,
                    self.cadence,
                    Arc::clone(&self.health),
                    self.shutdown.clone(),
                )
                .in_current_span(),
            );

            match handle.await {
                Ok(()) => {
                    self.stopped().await;
                    return;
                }
                Err(e) if e.is_panic() => {
                    let cycles_after = self.cycles().await;
                    if cycles_after > cycles_before {
                        consecutive = 0;
                        backoff = self.policy.initial_backoff();
                    }
                    consecutive += 1;
                    error!("{} poll loop panicked (restart {})", self.name(), consecutive);
                    update(&self.health, self.name(), |h| {
                        h.restarts += 1;
                        h.last_error = Some("poll loop panicked".to_string());
                    })
                    .await;
                    if !self.back_off(&mut backoff, consecutive).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!("{} poll loop cancelled: {}", self.name(), e);
                    self.stopped().await;
                    return;
                }
            }
        }
    }

    async fn cycles(&self) -> u64 {
        self.health
            .read()
            .await
            .get(self.name())
            .map_or(0, |h| h.cycles)
    }

    /// Wait before the next restart; false if shutdown arrived meanwhile
    async fn back_off(&self, backoff: &mut std::time::Duration, consecutive: u32) -> bool {
        if consecutive >= self.policy.degraded_after {
            warn!("{} degraded after {} restarts", self.name(), consecutive);
            update(&self.health, self.name(), |h| h.state = HealthState::Degraded).await;
        }

        let wait = *backoff;
        *backoff = (*backoff * 2).min(self.policy.max_backoff());

        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = shutdown_signal(self.shutdown.clone()) => {
                self.stopped().await;
                false
            }
        }
    }
}

/// Resolves once shutdown has been requested, including before the call
async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn record(health: &mut DeviceHealth, report: &CycleReport) {
    health.cycles += 1;
    health.last_cycle = Some(report.started_at);
    health.state = HealthState::Running;
}

/// Cycle, sleep, repeat; only returns on shutdown
async fn poll_loop(
    mut poller: DevicePoller,
    cadence: Cadence,
    health: HealthMap,
    shutdown: watch::Receiver<bool>,
) {
    info!(
        "Polling {} every {:?}, full poll every {} cycles",
        poller.name(),
        cadence.delay,
        cadence.iterations + 1
    );

    loop {
        let report = poller.run_cycle().await;
        update(&health, poller.name(), |h| record(h, &report)).await;

        tokio::select! {
            _ = tokio::time::sleep(cadence.delay) => {}
            _ = shutdown_signal(shutdown.clone()) => {
                info!("{} stopping after {} cycles", poller.name(), poller.cycles());
                break;
            }
        }
    }
}
