mod common;

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use common::{harness, FakeMaster};
use sensorcap::core::{DevicePoller, PollMode, StartupError};
use sensorcap::db::FieldValue;
use sensorcap::detection::{AlertKind, ChangeEvent, Metric, ThresholdTable};
use sensorcap::master::{paths, Master};
use sensorcap::sensors::PortState;

fn acceleration_limit(serial: &str, limit: f64) -> ThresholdTable {
    let mut table = ThresholdTable::new();
    table.insert(310, serial, Metric::AccelerationMax, limit);
    table
}

#[tokio::test]
async fn test_new_sensor_between_polls() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.sensor(2, 310, 446, "T1", "0000012C");
    let h = harness(acceleration_limit("V1", 10.0));

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    assert_eq!(poller.port_count(), 2);

    let first = poller.run_cycle().await;
    assert_eq!(first.mode, PollMode::Full);
    assert!(first.changes.is_empty());
    assert!(first.alerts.is_empty());
    assert_eq!(first.topology.port(1), Some(&PortState::Absent));

    let temperatures = h.storage.measurement("temperatureEvents");
    assert_eq!(temperatures.len(), 1);
    assert_eq!(temperatures[0].get_field("temperature"), Some(&FieldValue::Float(30.0)));
    assert_eq!(temperatures[0].get_tag("sensorserial"), Some("T1"));
    assert_eq!(h.storage.measurement("iolmEvents").len(), 1);

    fake.sensor(1, 310, 416, "V1", "04B000000000");
    let second = poller.run_cycle().await;
    assert_eq!(second.mode, PollMode::Partial);
    assert!(second.master.is_none());
    assert_eq!(
        second.changes,
        vec![ChangeEvent::SensorAdded {
            port: 1,
            device_id: 416,
            serial: "V1".to_string()
        }]
    );
    assert_eq!(second.alerts.len(), 1);
    assert_eq!(second.alerts[0].kind, AlertKind::AccelerationExceeded);
    assert_eq!(second.alerts[0].value, 12.0);
    assert_eq!(second.alerts[0].limit, 10.0);

    let submitted = h.audit.submitted.lock().clone();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].0, "CONFIGURATION");
    assert_eq!(submitted[0].1["event"], json!("NEWSENSORFOUND"));
    assert_eq!(submitted[1].0, "SENSOR");
    assert_eq!(submitted[1].1["event"], json!("ACCELERATION"));
    assert_eq!(second.stamps.len(), 2);
    assert_eq!(h.storage.measurement("saasResults").len(), 2);

    let vibration = h.storage.measurement("vibrationEvents");
    assert_eq!(vibration.len(), 1);
    assert_eq!(vibration[0].get_field("acceleration"), Some(&FieldValue::Float(12.0)));
    // the cycle-one temperature is still there, plus the cycle-two one
    assert_eq!(h.storage.measurement("temperatureEvents").len(), 2);
    // master health only on full polls
    assert_eq!(h.storage.measurement("iolmEvents").len(), 1);
}

#[tokio::test]
async fn test_partial_polls_reuse_cached_identity() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.sensor(2, 310, 446, "T1", "0000012C");
    let h = harness(ThresholdTable::new());

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 1, h.ctx.clone())
        .await
        .unwrap();
    poller.run_cycle().await;

    // Swap the sensor serial; a partial poll does not re-read it
    fake.set(&paths::port(2, paths::PORT_SERIAL), json!("T2"));
    let partial = poller.run_cycle().await;
    assert_eq!(partial.mode, PollMode::Partial);
    assert!(partial.changes.is_empty());

    let full = poller.run_cycle().await;
    assert_eq!(full.mode, PollMode::Full);
    assert_eq!(
        full.changes,
        vec![ChangeEvent::SensorSerialChanged {
            port: 2,
            device_id: 446,
            old_serial: "T1".to_string(),
            new_serial: "T2".to_string()
        }]
    );
}

#[tokio::test]
async fn test_sensor_removed_and_type_changed() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.sensor(1, 310, 416, "V1", "04B000000000");
    fake.sensor(2, 310, 446, "T1", "0000012C");
    let h = harness(ThresholdTable::new());

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    poller.run_cycle().await;

    fake.empty_port(1);
    let removed = poller.run_cycle().await;
    assert_eq!(
        removed.changes,
        vec![ChangeEvent::SensorRemoved {
            port: 1,
            device_id: 416,
            serial: "V1".to_string()
        }]
    );

    // The port was emptied, so the new sensor's identity is read fresh
    fake.sensor(1, 310, 417, "V1", "04B000000000");
    let returned = poller.run_cycle().await;
    assert_eq!(
        returned.changes,
        vec![ChangeEvent::SensorAdded {
            port: 1,
            device_id: 417,
            serial: "V1".to_string()
        }]
    );
}

#[tokio::test]
async fn test_unreadable_fields_degrade_gracefully() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.sensor(1, 310, 416, "V1", "04B000000000");
    fake.sensor(2, 310, 446, "T1", "0000012C");
    fake.remove(paths::VOLTAGE);
    fake.remove(paths::SERIAL);
    let h = harness(ThresholdTable::new());

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    let first = poller.run_cycle().await;
    let snapshot = first.master.unwrap();
    assert_eq!(snapshot.voltage, None);
    assert_eq!(snapshot.serial, None);
    assert_eq!(snapshot.temperature, Some(41.0));
    assert_eq!(first.topology.sensors().count(), 2);

    // Port 2 status vanishes for a cycle: no removal, no re-add afterwards
    fake.remove(&paths::port(2, paths::PORT_STATUS));
    let blind = poller.run_cycle().await;
    assert_eq!(blind.topology.port(2), Some(&PortState::Unknown));
    assert!(blind.changes.is_empty());

    fake.set(&paths::port(2, paths::PORT_STATUS), json!(2));
    let back = poller.run_cycle().await;
    assert!(back.changes.is_empty());
    assert_eq!(back.topology.sensors().count(), 2);
}

#[tokio::test]
async fn test_undecodable_process_data() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.sensor(1, 310, 416, "V1", "04B0");
    fake.sensor(2, 310, 400, "P1", "0000");
    let h = harness(acceleration_limit("V1", 1.0));

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    let report = poller.run_cycle().await;

    assert_eq!(report.topology.sensors().count(), 2);
    assert!(report.topology.sensors().all(|s| s.decoded.is_none()));
    assert!(report.alerts.is_empty());
    assert!(h.storage.measurement("vibrationEvents").is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_not_fatal() {
    let fake = FakeMaster::new("10.0.0.5", 1);
    fake.sensor(1, 310, 446, "T1", "0000012C");
    let h = harness(ThresholdTable::new());
    h.storage.fail.store(true, Ordering::SeqCst);

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    let report = poller.run_cycle().await;
    assert_eq!(report.points_written, 0);

    h.storage.fail.store(false, Ordering::SeqCst);
    let report = poller.run_cycle().await;
    assert_eq!(report.points_written, 1);
    assert_eq!(poller.cycles(), 2);
}

#[tokio::test]
async fn test_port_count_required_at_startup() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.set_port_count(None);
    let h = harness(ThresholdTable::new());

    let result = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone()).await;
    assert!(matches!(result, Err(StartupError::PortCount(_))));
}

#[tokio::test]
async fn test_port_count_change_on_full_poll() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    let h = harness(ThresholdTable::new());

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 1, h.ctx.clone())
        .await
        .unwrap();
    poller.run_cycle().await;

    fake.set_port_count(Some(4));
    fake.empty_port(3);
    fake.sensor(4, 310, 446, "T4", "00fa");
    poller.run_cycle().await;
    assert_eq!(poller.port_count(), 2);

    let full = poller.run_cycle().await;
    assert_eq!(full.mode, PollMode::Full);
    assert_eq!(poller.port_count(), 4);
    assert_eq!(full.topology.port_count(), 4);
    assert_eq!(
        full.changes,
        vec![ChangeEvent::SensorAdded {
            port: 4,
            device_id: 446,
            serial: "T4".to_string()
        }]
    );
}

#[tokio::test]
async fn test_sensor_records_keep_polled_address() {
    let fake = FakeMaster::new("10.0.0.5", 2);
    fake.set(paths::IP_ADDRESS, json!("192.168.0.99"));
    fake.sensor(2, 310, 446, "T1", "0000012C");
    let h = harness(ThresholdTable::new());

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    let full = poller.run_cycle().await;
    assert_eq!(full.master.unwrap().address, "192.168.0.99");

    fake.sensor(1, 310, 416, "V1", "04B000000000");
    poller.run_cycle().await;

    let tags: Vec<String> = h
        .storage
        .measurement("temperatureEvents")
        .iter()
        .filter_map(|p| p.get_tag("iolmip").map(str::to_string))
        .collect();
    assert_eq!(tags, vec!["10.0.0.5", "10.0.0.5"]);

    // The master's own record carries what it reports about itself
    let master = h.storage.measurement("iolmEvents");
    assert_eq!(master[0].get_tag("iolmip"), Some("192.168.0.99"));

    let submitted = h.audit.submitted.lock().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].1["ipaddress"], json!("10.0.0.5"));
    let stamps = h.storage.measurement("saasResults");
    assert_eq!(stamps[0].get_tag("iolmip"), Some("10.0.0.5"));
}

#[tokio::test]
async fn test_audit_failure_drops_event_only() {
    let fake = FakeMaster::new("10.0.0.5", 1);
    fake.sensor(1, 310, 416, "V1", "04B000000000");
    let h = harness(acceleration_limit("V1", 10.0));
    h.audit.fail.store(true, Ordering::SeqCst);

    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    let report = poller.run_cycle().await;

    assert_eq!(report.alerts.len(), 1);
    assert!(report.stamps.is_empty());
    assert!(h.storage.measurement("saasResults").is_empty());
    assert_eq!(h.storage.measurement("vibrationEvents").len(), 1);
    assert_eq!(h.storage.measurement("iolmEvents").len(), 1);
    assert_eq!(report.points_written, 2);

    // Stamping comes back on the next cycle
    h.audit.fail.store(false, Ordering::SeqCst);
    let report = poller.run_cycle().await;
    assert_eq!(report.stamps.len(), 1);
    assert_eq!(h.storage.measurement("saasResults").len(), 1);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_unsupported_type_visible_at_info() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let fake = FakeMaster::new("10.0.0.5", 1);
    fake.sensor(1, 310, 400, "P1", "0000");
    let h = harness(ThresholdTable::new());
    let mut poller = DevicePoller::start("press", Master::new(fake.clone()), 6, h.ctx.clone())
        .await
        .unwrap();
    poller.run_cycle().await;

    let output = String::from_utf8(logs.0.lock().clone()).unwrap();
    assert!(output.contains("unhandled sensor type 400"), "{}", output);
    assert!(output.contains("PN7571"));
}
