//! Modbus RTU link layer for variable-frequency drives
//!
//! This library provides the bus side of drive communication:
//!
//! ```text
//! vfd-modbus
//!     ├── ConnectionConfig (serial parameters + slave id, validated at open)
//!     ├── Transport (link ownership, exclusive bus section, settling delay)
//!     ├── ModbusClient (FC03/FC06 framing, exception decoding)
//!     ├── frame (RTU ADU + CRC-16/MODBUS)
//!     ├── exception (vendor exception table)
//!     └── DriveSimulator (in-process slave behind the BusLink seam)
//! ```
//!
//! All failures surface as [`ModbusError`]: `Comm` for transport faults,
//! `Protocol` for exception responses, `Config` for bad parameters.

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod exception;
pub mod frame;
pub mod simulator;
pub mod transport;

pub use client::ModbusClient;
pub use config::{ConnectionConfig, Parity};
pub use error::{ModbusError, Result};
pub use exception::{decode_exception_code, ExceptionCode};
pub use simulator::{DriveSimulator, SimulatorConnector};
pub use transport::{BusLink, Connector, SerialConnector, SerialLink, Transport};
