//! Link Error Types
//!
//! Every failure that leaves this crate is one of these variants. Transport
//! faults of any origin (serial driver, timeout, framing) are normalized into
//! [`ModbusError::Comm`] so callers never see an opaque error type.

use thiserror::Error;

use crate::exception::decode_exception_code;

/// Result type for link operations
pub type Result<T> = std::result::Result<T, ModbusError>;

/// Modbus link errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Transport/I/O failure: port not open, timeout, malformed frame
    #[error("Comm error: {0}")]
    Comm(String),

    /// Well-formed exception response from the drive
    #[error("VFD Exception: {message}")]
    Protocol { code: u8, message: String },

    /// Invalid connection parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request arguments outside protocol limits
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::Comm(err.to_string())
    }
}

impl From<tokio_serial::Error> for ModbusError {
    fn from(err: tokio_serial::Error) -> Self {
        ModbusError::Comm(err.to_string())
    }
}

impl ModbusError {
    pub fn comm(msg: impl Into<String>) -> Self {
        ModbusError::Comm(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ModbusError::Config(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ModbusError::InvalidRequest(msg.into())
    }

    /// Build a protocol error from a raw exception byte
    pub fn protocol(code: u8) -> Self {
        ModbusError::Protocol {
            code,
            message: decode_exception_code(code).into_owned(),
        }
    }

    /// Exception code carried by a protocol error
    pub fn exception_code(&self) -> Option<u8> {
        match self {
            ModbusError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for transport-level failures
    pub fn is_comm(&self) -> bool {
        matches!(self, ModbusError::Comm(_))
    }
}
