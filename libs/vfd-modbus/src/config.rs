//! Serial connection parameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{MAX_SLAVE_ID, SUPPORTED_BAUD_RATES};
use crate::error::{ModbusError, Result};

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Parity {
    None,
    #[default]
    Even,
    Odd,
}

impl Parity {
    /// Single-letter form used on the wire settings line (N/E/O)
    pub fn as_letter(self) -> &'static str {
        match self {
            Parity::None => "N",
            Parity::Even => "E",
            Parity::Odd => "O",
        }
    }
}

impl FromStr for Parity {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NONE" => Ok(Parity::None),
            "E" | "EVEN" => Ok(Parity::Even),
            "O" | "ODD" => Ok(Parity::Odd),
            other => Err(ModbusError::config(format!(
                "Invalid parity '{other}', expected N, E or O"
            ))),
        }
    }
}

impl TryFrom<String> for Parity {
    type Error = ModbusError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Parity> for String {
    fn from(value: Parity) -> Self {
        value.as_letter().to_string()
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_letter())
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(value: Parity) -> Self {
        match value {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        }
    }
}

/// Connection parameters, fixed for the life of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial device, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: u8,
    pub data_bits: u8,
    /// Slave/unit id of the drive
    pub slave_id: u8,
    /// Per-transaction response timeout
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            parity: Parity::Even,
            stop_bits: 1,
            data_bits: 8,
            slave_id: 1,
            timeout_ms: 1000,
        }
    }
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check every parameter before the port is touched
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(ModbusError::config("Serial port not specified"));
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ModbusError::config(format!(
                "Unsupported baud rate {}, expected one of {:?}",
                self.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(ModbusError::config(format!(
                "Invalid stop bits {}, expected 1 or 2",
                self.stop_bits
            )));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(ModbusError::config(format!(
                "Invalid byte size {}, expected 5..=8",
                self.data_bits
            )));
        }
        if self.slave_id == 0 || self.slave_id > MAX_SLAVE_ID {
            return Err(ModbusError::config(format!(
                "Invalid slave id {}, expected 1..={}",
                self.slave_id, MAX_SLAVE_ID
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ModbusError::config("Timeout must be greater than zero"));
        }
        Ok(())
    }

    pub(crate) fn serial_data_bits(&self) -> tokio_serial::DataBits {
        match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    pub(crate) fn serial_stop_bits(&self) -> tokio_serial::StopBits {
        match self.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} {}{}{} slave={}",
            self.port, self.baud_rate, self.data_bits, self.parity, self.stop_bits, self.slave_id
        )
    }
}
