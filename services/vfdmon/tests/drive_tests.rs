//! DriveController against the simulated drive

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use vfd_modbus::{ConnectionConfig, DriveSimulator, ModbusClient, ModbusError, Transport};
use vfdmon::registers;
use vfdmon::{ControlCommand, DriveController};

fn drive_with_telemetry() -> DriveSimulator {
    let sim = DriveSimulator::new();
    sim.set_register(registers::FREQUENCY, 5000);
    sim.set_registers(registers::BUS_VOLTAGE, &[540, 380, 42, 1450]);
    sim
}

async fn controller(sim: &DriveSimulator) -> DriveController {
    let config = ConnectionConfig {
        port: "/dev/ttySIM0".to_string(),
        timeout_ms: 200,
        ..Default::default()
    };
    let transport = Arc::new(Transport::new(config, Arc::new(sim.connector())));
    assert!(transport.open().await.unwrap());
    DriveController::new(ModbusClient::new(transport))
}

// ============================================================================
// Snapshots
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_snapshot_scenario() {
    let sim = drive_with_telemetry();
    let drive = controller(&sim).await;

    let snapshot = drive.read_snapshot().await.unwrap();
    assert_eq!(snapshot.frequency, Some(50.0));
    assert_eq!(snapshot.bus_voltage, 540);
    assert_eq!(snapshot.output_voltage, 380);
    assert_eq!(snapshot.output_current, 42);
    assert_eq!(snapshot.speed, 1450);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reads_block_then_frequency() {
    let sim = drive_with_telemetry();
    let drive = controller(&sim).await;

    drive.read_snapshot().await.unwrap();
    let addresses: Vec<u16> = sim.requests().iter().map(|r| r.address).collect();
    assert_eq!(addresses, vec![registers::BUS_VOLTAGE, registers::FREQUENCY]);
}

#[tokio::test(start_paused = true)]
async fn test_frequency_failure_keeps_other_fields() {
    let sim = drive_with_telemetry();
    sim.fail_address(registers::FREQUENCY, 0x04);
    let drive = controller(&sim).await;

    let snapshot = drive.read_snapshot().await.unwrap();
    assert_eq!(snapshot.frequency, None);
    assert!(snapshot.frequency_or_nan().is_nan());
    assert_eq!(
        (
            snapshot.bus_voltage,
            snapshot.output_voltage,
            snapshot.output_current,
            snapshot.speed
        ),
        (540, 380, 42, 1450)
    );
}

#[tokio::test(start_paused = true)]
async fn test_frequency_not_carried_over() {
    let sim = drive_with_telemetry();
    let drive = controller(&sim).await;

    assert_eq!(drive.read_snapshot().await.unwrap().frequency, Some(50.0));
    sim.fail_address(registers::FREQUENCY, 0x02);
    assert_eq!(drive.read_snapshot().await.unwrap().frequency, None);
}

#[tokio::test(start_paused = true)]
async fn test_block_failure_fails_snapshot() {
    let sim = drive_with_telemetry();
    sim.fail_address(registers::OUTPUT_CURRENT, 0x06);
    let drive = controller(&sim).await;

    let err = drive.read_snapshot().await.unwrap_err();
    assert_eq!(err.exception_code(), Some(0x06));
    assert_eq!(sim.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_silent_drive_is_comm_error() {
    let sim = drive_with_telemetry();
    sim.set_silent(true);
    let drive = controller(&sim).await;

    assert!(drive.read_snapshot().await.unwrap_err().is_comm());
}

// ============================================================================
// Control writes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_writes_control_word() {
    let sim = drive_with_telemetry();
    let drive = controller(&sim).await;

    drive.send_control(ControlCommand::Stop).await.unwrap();
    assert_eq!(sim.writes(), vec![(0x2000, 0x0005)]);
}

#[tokio::test(start_paused = true)]
async fn test_every_command_maps_to_its_word() {
    let sim = drive_with_telemetry();
    let drive = controller(&sim).await;

    for command in ControlCommand::ALL {
        drive.send_control(command).await.unwrap();
    }
    let words: Vec<u16> = sim.writes().iter().map(|(_, v)| *v).collect();
    assert_eq!(words, vec![0x0001, 0x0002, 0x0005, 0x0006, 0x0007]);
}

#[tokio::test(start_paused = true)]
async fn test_set_target_frequency_writes_raw_value() {
    let sim = drive_with_telemetry();
    let drive = controller(&sim).await;

    drive.set_target_frequency(5000).await.unwrap();
    assert_eq!(sim.writes(), vec![(registers::TARGET_FREQUENCY, 5000)]);
}

#[tokio::test(start_paused = true)]
async fn test_write_exception_is_protocol_error() {
    let sim = drive_with_telemetry();
    sim.fail_address(registers::CONTROL_WORD, 0x04);
    let drive = controller(&sim).await;

    let err = drive.send_control(ControlCommand::Forward).await.unwrap_err();
    assert_eq!(
        err,
        ModbusError::Protocol {
            code: 0x04,
            message: "Operation failed".to_string()
        }
    );
}
