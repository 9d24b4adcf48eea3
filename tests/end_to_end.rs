//! Simulator and runner talking to each other over an in-memory link.

use std::time::Duration;

use lt_sim::config::{Scalar, TestCase, TesterConfig};
use lt_sim::device::{ButtonStatus, DeviceState, SharedDevice};
use lt_sim::runner::{TestRunner, Timing};
use lt_sim::simulator::ReaderHandle;
use lt_sim::validator::Verdict;
use lt_sim::{MemoryPort, Simulator};

fn fast() -> Timing {
    Timing {
        settle: Duration::from_millis(5),
        timeout: Duration::from_secs(2),
        between_cases: Duration::ZERO,
    }
}

fn start() -> (SharedDevice, ReaderHandle, TestRunner<MemoryPort>) {
    let (dut, pc) = MemoryPort::pair();
    let device = SharedDevice::new(DeviceState::default());
    let reader = Simulator::new(device.clone(), Box::new(dut))
        .unwrap()
        .with_poll_interval(Duration::from_millis(5))
        .spawn()
        .unwrap();
    (device, reader, TestRunner::new(pc, fast()))
}

const CONFIG: &str = r#"{
    "test_cases": [
        {"id": 1, "name": "Firmware", "cmd_hex": "0x00", "param_hex": "0x00",
         "expect_type": "exact", "criteria": "v1.0.5"},
        {"id": 2, "name": "BT address", "cmd_hex": "0x01", "param_hex": "0x00",
         "expect_type": "length", "criteria": 17},
        {"id": 3, "name": "Buttons", "cmd_hex": "0x02", "param_hex": "0x00",
         "expect_type": "exact", "criteria": "None"},
        {"id": 4, "name": "Magic LED", "cmd_hex": "0x04", "param_hex": "0x00",
         "expect_type": "exact", "criteria": "OK"},
        {"id": 5, "name": "Volume 9", "cmd_hex": "0x0C", "param_hex": "0x09",
         "expect_type": "contains", "criteria": "Vol:9"},
        {"id": 6, "name": "Volume 16", "cmd_hex": "0x0C", "param_hex": "0x10",
         "expect_type": "exact", "criteria": "Error: Range 0-15"},
        {"id": 7, "name": "Test mode", "cmd_hex": "0x99", "param_hex": "0x01",
         "expect_type": "exact", "criteria": "Test Mode ON"},
        {"id": 8, "name": "Unknown", "cmd_hex": "0x55", "param_hex": "0x00",
         "expect_type": "exact", "criteria": "Unknown CMD"},
        {"id": 9, "name": "Any reply", "cmd_hex": "0x04", "param_hex": "0x00"}
    ]
}"#;

#[test]
fn full_run_passes_against_simulator() {
    let config: TesterConfig = serde_json::from_str(CONFIG).unwrap();
    let (device, reader, mut runner) = start();

    let report = runner.run_all(&config.test_cases, |_| {}).unwrap();
    let ids: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    for r in &report.results {
        assert!(r.passed(), "case {} failed: {:?}", r.id, r.verdict);
    }

    let state = device.snapshot().state;
    assert_eq!(state.volume, 9);
    assert!(state.test_mode_enabled);

    reader.stop();
    let stats = reader.join().unwrap();
    assert_eq!(stats.frames, 9);
}

#[test]
fn volume_persists_until_changed() {
    let (device, reader, mut runner) = start();

    let ex = runner.exchange(0x0C, 0x09).unwrap();
    assert_eq!(ex.reply.as_deref(), Some("ACK: OK (Vol:9)"));
    runner.exchange(0x00, 0x00).unwrap();
    assert_eq!(device.snapshot().state.volume, 9);

    let ex = runner.exchange(0x0C, 0x20).unwrap();
    assert_eq!(ex.reply.as_deref(), Some("ACK: Error: Range 0-15"));
    assert_eq!(device.snapshot().state.volume, 9);

    runner.exchange(0x0C, 0x00).unwrap();
    assert_eq!(device.snapshot().state.volume, 0);

    reader.stop();
    reader.join().unwrap();
}

#[test]
fn operator_override_reaches_tester_once() {
    let (device, reader, mut runner) = start();
    device.set_override("Error: Busy");

    let case = TestCase {
        id: Scalar::Int(1),
        name: "Firmware".into(),
        cmd_hex: "0x00".into(),
        param_hex: "0x00".into(),
        expect_type: Some("exact".into()),
        criteria: Some(Scalar::Text("v1.0.5".into())),
    };

    let first = runner.run_case(&case).unwrap();
    assert_eq!(
        first.verdict,
        Verdict::Mismatch {
            expected: "== \"v1.0.5\"".into(),
            actual: "Error: Busy".into(),
        }
    );
    assert!(runner.run_case(&case).unwrap().passed());

    reader.stop();
    reader.join().unwrap();
}

#[test]
fn button_injection_is_reported() {
    let (device, reader, mut runner) = start();
    device.set_button(ButtonStatus::PowerPressed);
    let ex = runner.exchange(0x02, 0x00).unwrap();
    assert_eq!(ex.reply.as_deref(), Some("ACK: PowerPressed"));

    reader.stop();
    reader.join().unwrap();
}
