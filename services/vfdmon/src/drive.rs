//! Drive-facing operations on top of the Modbus client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use vfd_modbus::{ModbusClient, ModbusError, Result};

use crate::registers::{self, ControlCommand};

/// One telemetry sample
///
/// All fields except `frequency` are raw register values. `frequency` is
/// `None` when its read failed in this cycle; a previous value is never
/// carried over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    /// Output frequency in Hz
    pub frequency: Option<f64>,
    pub bus_voltage: u16,
    pub output_voltage: u16,
    pub output_current: u16,
    pub speed: u16,
}

impl Snapshot {
    /// Frequency for plotting, NaN when absent
    pub fn frequency_or_nan(&self) -> f64 {
        self.frequency.unwrap_or(f64::NAN)
    }
}

/// Source of telemetry samples for the poller
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn read_snapshot(&self) -> Result<Snapshot>;
}

/// Register-level drive API
#[derive(Debug, Clone)]
pub struct DriveController {
    client: ModbusClient,
}

impl DriveController {
    pub fn new(client: ModbusClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ModbusClient {
        &self.client
    }

    /// Read the telemetry block, then the frequency register.
    ///
    /// A failed block read fails the call. A failed frequency read only
    /// leaves `frequency` empty.
    pub async fn read_snapshot(&self) -> Result<Snapshot> {
        let block = self
            .client
            .read_registers(
                registers::TELEMETRY_BLOCK_START,
                registers::TELEMETRY_BLOCK_LEN,
            )
            .await?;
        let [bus_voltage, output_voltage, output_current, speed] = block[..] else {
            return Err(ModbusError::comm(format!(
                "Telemetry block returned {} registers",
                block.len()
            )));
        };

        let frequency = match self.client.read_registers(registers::FREQUENCY, 1).await {
            Ok(values) => values.first().copied().map(registers::scale_frequency),
            Err(e) => {
                warn!("Frequency read failed: {}", e);
                None
            },
        };

        let snapshot = Snapshot {
            timestamp: Utc::now(),
            frequency,
            bus_voltage,
            output_voltage,
            output_current,
            speed,
        };
        debug!("Snapshot: {:?}", snapshot);
        Ok(snapshot)
    }

    pub async fn send_control(&self, command: ControlCommand) -> Result<()> {
        self.client
            .write_register(registers::CONTROL_WORD, command.control_word())
            .await
    }

    /// `value` is the raw register value, e.g. 5000 for 50.00 Hz
    pub async fn set_target_frequency(&self, value: u16) -> Result<()> {
        self.client
            .write_register(registers::TARGET_FREQUENCY, value)
            .await
    }
}

#[async_trait]
impl SnapshotSource for DriveController {
    async fn read_snapshot(&self) -> Result<Snapshot> {
        DriveController::read_snapshot(self).await
    }
}
