//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use sensorcap::audit::{AuditError, AuditSink, EventStamp};
use sensorcap::config::DeviceConfig;
use sensorcap::core::{MasterConnector, PollContext, StartupError};
use sensorcap::db::{Point, PointSink, SinkError};
use sensorcap::master::{paths, FieldError, Master, MasterApi};
use sensorcap::sensors::CodecRegistry;
use sensorcap::ThresholdTable;

/// Master answering from a path -> value map
pub struct FakeMaster {
    address: String,
    values: Mutex<HashMap<String, Value>>,
    ports: Mutex<Option<usize>>,
    panic_on_ports: AtomicBool,
    requests: AtomicUsize,
}

impl FakeMaster {
    pub fn new(address: &str, ports: usize) -> Arc<Self> {
        let master = Arc::new(Self {
            address: address.to_string(),
            values: Mutex::new(HashMap::new()),
            ports: Mutex::new(Some(ports)),
            panic_on_ports: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        });
        master.set(paths::IP_ADDRESS, json!(address));
        master.set(paths::SERIAL, json!("000174210147"));
        master.set(paths::VENDOR, json!("ifm electronic gmbh"));
        master.set(paths::FAMILY, json!("AL13xx"));
        master.set(paths::PRODUCT_CODE, json!("AL1350"));
        master.set(paths::TEMPERATURE, json!(41));
        master.set(paths::SUPERVISION, json!(0));
        master.set(paths::CURRENT, json!(120));
        master.set(paths::VOLTAGE, json!(23.9));
        for port in 1..=ports as u16 {
            master.empty_port(port);
        }
        master
    }

    pub fn set(&self, path: &str, value: Value) {
        self.values.lock().insert(path.to_string(), value);
    }

    pub fn remove(&self, path: &str) {
        self.values.lock().remove(path);
    }

    pub fn set_port_count(&self, ports: Option<usize>) {
        *self.ports.lock() = ports;
    }

    pub fn panic_on_ports(&self, enabled: bool) {
        self.panic_on_ports.store(enabled, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn empty_port(&self, port: u16) {
        self.set(&paths::port(port, paths::PORT_STATUS), json!(0));
    }

    pub fn sensor(&self, port: u16, vendor_id: u32, device_id: u32, serial: &str, pdin: &str) {
        self.set(&paths::port(port, paths::PORT_STATUS), json!(2));
        self.set(&paths::port(port, paths::PORT_VENDOR_ID), json!(vendor_id));
        self.set(&paths::port(port, paths::PORT_DEVICE_ID), json!(device_id));
        self.set(&paths::port(port, paths::PORT_SERIAL), json!(serial));
        self.set(&paths::port(port, paths::PORT_PRODUCT_NAME), json!("ifm sensor"));
        self.set(&paths::port(port, paths::PORT_LOCAL_NAME), json!(format!("port-{}", port)));
        self.set(&paths::port(port, paths::PORT_PROCESS_DATA), json!(pdin));
    }
}

#[async_trait]
impl MasterApi for FakeMaster {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get_raw(&self, path: &str) -> Result<String, FieldError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if path == paths::TREE {
            let ports = self.ports.lock().ok_or_else(|| FieldError::Timeout {
                path: path.to_string(),
            })?;
            let subs: Vec<Value> = (1..=ports)
                .map(|n| json!({"identifier": format!("port[{}]", n)}))
                .collect();
            let tree = json!({
                "data": {
                    "identifier": "root",
                    "subs": [
                        {"identifier": "deviceinfo", "subs": []},
                        {"identifier": "iolinkmaster", "subs": subs}
                    ]
                }
            });
            return Ok(tree.to_string());
        }

        if path.starts_with("/iolinkmaster/") && self.panic_on_ports.load(Ordering::SeqCst) {
            panic!("simulated fault reading {}", path);
        }

        match self.values.lock().get(path) {
            Some(value) => Ok(json!({"cid": 1, "data": {"value": value}, "code": 200}).to_string()),
            None => Err(FieldError::Status {
                path: path.to_string(),
                status: 404,
            }),
        }
    }
}

/// Storage that keeps every point
#[derive(Default)]
pub struct RecordingSink {
    pub points: Mutex<Vec<Point>>,
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub fn measurement(&self, name: &str) -> Vec<Point> {
        self.points
            .lock()
            .iter()
            .filter(|p| p.measurement == name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PointSink for RecordingSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Task("storage offline".to_string()));
        }
        self.points.lock().extend_from_slice(points);
        Ok(())
    }
}

/// Audit collaborator that stamps everything unless told to fail
#[derive(Default)]
pub struct RecordingAudit {
    pub submitted: Mutex<Vec<(String, Value)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn submit(&self, event_type: &str, payload: &Value) -> Result<EventStamp, AuditError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuditError::Timeout(Duration::from_secs(10)));
        }
        let mut submitted = self.submitted.lock();
        submitted.push((event_type.to_string(), payload.clone()));
        Ok(EventStamp {
            uuid: Uuid::new_v4(),
            eventstamp: format!("stamp-{}", submitted.len()),
        })
    }
}

pub struct Harness {
    pub storage: Arc<RecordingSink>,
    pub audit: Arc<RecordingAudit>,
    pub ctx: PollContext,
}

pub fn harness(thresholds: ThresholdTable) -> Harness {
    let storage = Arc::new(RecordingSink::default());
    let audit = Arc::new(RecordingAudit::default());
    let ctx = PollContext {
        codecs: Arc::new(CodecRegistry::default()),
        thresholds: Arc::new(thresholds),
        storage: storage.clone(),
        audit: audit.clone(),
    };
    Harness { storage, audit, ctx }
}

/// Hands each device its own fake master on every (re)start
///
/// Devices without a master fail to start, as if `/gettree` timed out.
#[derive(Default)]
pub struct FakeConnector {
    masters: HashMap<String, Arc<FakeMaster>>,
}

impl FakeConnector {
    pub fn with(mut self, name: &str, master: Arc<FakeMaster>) -> Self {
        self.masters.insert(name.to_string(), master);
        self
    }
}

#[async_trait]
impl MasterConnector for FakeConnector {
    async fn connect(&self, device: &DeviceConfig) -> Result<Master, StartupError> {
        match self.masters.get(&device.name) {
            Some(master) => Ok(Master::new(master.clone())),
            None => Err(StartupError::PortCount(FieldError::Timeout {
                path: paths::TREE.to_string(),
            })),
        }
    }
}

pub fn device(name: &str) -> DeviceConfig {
    DeviceConfig {
        name: name.to_string(),
        address: "10.0.0.5".to_string(),
        port: 80,
        delay_secs: 5,
        iterations: 6,
    }
}
