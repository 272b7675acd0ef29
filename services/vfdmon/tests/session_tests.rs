//! DriveSession: connect/disconnect lifecycle and background commands

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use vfd_modbus::{ConnectionConfig, DriveSimulator, ModbusError};
use vfdmon::registers;
use vfdmon::{event_channel, ControlCommand, DriveSession, Event, EventReceiver};

const POLL: Duration = Duration::from_millis(500);

fn drive() -> DriveSimulator {
    let sim = DriveSimulator::new();
    sim.set_register(registers::FREQUENCY, 5000);
    sim.set_registers(registers::BUS_VOLTAGE, &[540, 380, 42, 1450]);
    sim
}

fn config() -> ConnectionConfig {
    ConnectionConfig {
        port: "/dev/ttySIM0".to_string(),
        timeout_ms: 200,
        ..Default::default()
    }
}

fn session(sim: &DriveSimulator) -> (DriveSession, EventReceiver) {
    let (tx, rx) = event_channel();
    (
        DriveSession::with_connector(tx, Arc::new(sim.connector())),
        rx,
    )
}

fn logs(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

fn faults(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Fault { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Connect / disconnect
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_starts_polling() {
    let sim = drive();
    let (session, mut rx) = session(&sim);

    assert!(session.connect(config(), POLL).await.unwrap());
    assert!(session.is_connected());
    assert!(session.is_polling());

    sleep(Duration::from_millis(100)).await;
    let events = rx.drain();
    assert_eq!(
        logs(&events),
        vec![
            "Connected to /dev/ttySIM0 @ 9600 parity=E".to_string(),
            "Started polling every 500 ms".to_string(),
        ]
    );
    match events.last() {
        Some(Event::Data(snapshot)) => assert_eq!(snapshot.frequency, Some(50.0)),
        other => panic!("expected a sample, got {other:?}"),
    }

    session.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_invalid_config_fails() {
    let sim = drive();
    let (session, mut rx) = session(&sim);
    let bad = ConnectionConfig {
        slave_id: 0,
        ..config()
    };

    let err = session.connect(bad, POLL).await.unwrap_err();
    assert!(matches!(err, ModbusError::Config(_)));
    assert!(!session.is_connected());
    assert!(rx.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connect_unopenable_port_reports_failure() {
    let sim = drive();
    sim.set_refuse_open(true);
    let (session, mut rx) = session(&sim);

    assert!(!session.connect(config(), POLL).await.unwrap());
    assert!(!session.is_connected());
    assert_eq!(logs(&rx.drain()), vec!["Failed to open serial port".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_polling_and_is_idempotent() {
    let sim = drive();
    let (session, mut rx) = session(&sim);

    session.connect(config(), POLL).await.unwrap();
    let transport = session.transport().unwrap();
    sleep(Duration::from_millis(700)).await;

    session.disconnect().await;
    session.disconnect().await;
    assert!(!session.is_connected());
    assert!(!transport.is_open().await);

    let seen = sim.requests().len();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(sim.requests().len(), seen);

    let disconnects = logs(&rx.drain())
        .into_iter()
        .filter(|m| m == "Disconnected")
        .count();
    assert_eq!(disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_tears_down_previous_connection() {
    let sim = drive();
    let (session, mut rx) = session(&sim);

    session.connect(config(), POLL).await.unwrap();
    let first = session.transport().unwrap();
    session.connect(config(), POLL).await.unwrap();

    assert!(!first.is_open().await);
    assert!(session.transport().unwrap().is_open().await);

    let messages = logs(&rx.drain());
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.starts_with("Connected to"))
            .count(),
        2
    );
    assert!(messages.contains(&"Disconnected".to_string()));
    session.disconnect().await;
}

// ============================================================================
// Fire-and-forget commands
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_commands_when_disconnected() {
    let sim = drive();
    let (session, mut rx) = session(&sim);

    assert!(session.send_control(ControlCommand::Stop).is_none());
    assert!(session.set_target_frequency(5000).is_none());
    assert_eq!(
        logs(&rx.drain()),
        vec!["Not connected".to_string(), "Not connected".to_string()]
    );
    assert!(sim.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_control_reports_success() {
    let sim = drive();
    let (session, mut rx) = session(&sim);
    session.connect(config(), POLL).await.unwrap();

    session
        .send_control(ControlCommand::Stop)
        .unwrap()
        .await
        .unwrap();
    session.set_target_frequency(2500).unwrap().await.unwrap();

    assert_eq!(
        sim.writes(),
        vec![(registers::CONTROL_WORD, 0x0005), (registers::TARGET_FREQUENCY, 2500)]
    );
    let messages = logs(&rx.drain());
    assert!(messages.contains(&"Control 0x0005 sent".to_string()));
    assert!(messages.contains(&"Freq set to 2500".to_string()));
    session.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_commands_report_fault_once() {
    let sim = drive();
    sim.fail_address(registers::CONTROL_WORD, 0x04);
    sim.fail_address(registers::TARGET_FREQUENCY, 0x08);
    let (session, mut rx) = session(&sim);
    session.connect(config(), POLL).await.unwrap();

    session
        .send_control(ControlCommand::Forward)
        .unwrap()
        .await
        .unwrap();
    session.set_target_frequency(9000).unwrap().await.unwrap();

    let faults = faults(&rx.drain());
    assert_eq!(
        faults,
        vec![
            "Control failed: VFD Exception: Operation failed".to_string(),
            format!(
                "Set freq failed: VFD Exception: {}",
                vfd_modbus::decode_exception_code(0x08)
            ),
        ]
    );
    session.disconnect().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commands_and_polling_share_the_bus() {
    let sim = drive();
    sim.set_latency(Duration::from_millis(2));
    let (tx, mut rx) = event_channel();
    let session = DriveSession::with_connector(tx, Arc::new(sim.connector()))
        .with_settle_delay(Duration::from_millis(1));

    session
        .connect(config(), Duration::from_millis(5))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..10u16 {
        handles.push(session.send_control(ControlCommand::Forward).unwrap());
        handles.push(session.set_target_frequency(1000 + i).unwrap());
    }
    for handle in handles {
        handle.await.unwrap();
    }
    session.disconnect().await;

    assert_eq!(sim.writes().len(), 20);
    assert_eq!(sim.max_in_flight(), 1);
    assert!(faults(&rx.drain()).is_empty());
}
