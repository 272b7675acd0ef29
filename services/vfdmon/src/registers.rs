//! Drive register map
//!
//! Fixed contract with the drive firmware. Telemetry registers are read-only,
//! control registers are written with FC06.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use vfd_modbus::ModbusError;

/// Output frequency, raw/100 = Hz
pub const FREQUENCY: u16 = 0x3001;
/// DC bus voltage
pub const BUS_VOLTAGE: u16 = 0x3002;
/// Output voltage
pub const OUTPUT_VOLTAGE: u16 = 0x3003;
/// Output current
pub const OUTPUT_CURRENT: u16 = 0x3004;
/// Motor speed
pub const SPEED: u16 = 0x3005;

/// Control word register
pub const CONTROL_WORD: u16 = 0x2000;
/// Target frequency register, Hz x100
pub const TARGET_FREQUENCY: u16 = 0x2001;

/// Bus voltage, output voltage, output current and speed in one FC03 read
pub const TELEMETRY_BLOCK_START: u16 = BUS_VOLTAGE;
pub const TELEMETRY_BLOCK_LEN: u16 = 4;

/// Scale for the frequency registers
pub const FREQUENCY_SCALE: f64 = 100.0;

/// Raw frequency register to Hz
pub fn scale_frequency(raw: u16) -> f64 {
    f64::from(raw) / FREQUENCY_SCALE
}

/// Control word values accepted by the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum ControlCommand {
    Forward = 0x0001,
    Reverse = 0x0002,
    Stop = 0x0005,
    #[serde(rename = "estop")]
    EStop = 0x0006,
    Reset = 0x0007,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 5] = [
        ControlCommand::Forward,
        ControlCommand::Reverse,
        ControlCommand::Stop,
        ControlCommand::EStop,
        ControlCommand::Reset,
    ];

    /// Value written to [`CONTROL_WORD`]
    pub fn control_word(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlCommand::Forward => "forward",
            ControlCommand::Reverse => "reverse",
            ControlCommand::Stop => "stop",
            ControlCommand::EStop => "estop",
            ControlCommand::Reset => "reset",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControlCommand {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        ControlCommand::ALL
            .into_iter()
            .find(|cmd| cmd.name() == wanted)
            .ok_or_else(|| {
                ModbusError::invalid_request(format!(
                    "Unknown command '{s}', expected forward, reverse, stop, estop or reset"
                ))
            })
    }
}
