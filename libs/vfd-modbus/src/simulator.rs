//! In-process Modbus RTU slave for testing
//!
//! A register bank behind the [`BusLink`] seam. Requests are decoded from real
//! RTU frames and answered with real RTU frames, so everything above the link
//! runs exactly as it would against a drive. Exceptions, latency and a mute
//! slave can be injected; the simulator also records what it saw.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::constants::{FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER, MAX_READ_REGISTERS};
use crate::error::{ModbusError, Result};
use crate::exception::ExceptionCode;
use crate::frame;
use crate::transport::{BusLink, Connector};

/// One request as seen by the simulated slave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRecord {
    pub at: Instant,
    pub function_code: u8,
    pub address: u16,
}

#[derive(Debug)]
struct SimState {
    slave_id: AtomicU8,
    registers: Mutex<HashMap<u16, u16>>,
    exceptions: Mutex<HashMap<u16, u8>>,
    latency: Mutex<Duration>,
    silent: AtomicBool,
    refuse_open: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    writes: Mutex<Vec<(u16, u16)>>,
    requests: Mutex<Vec<RequestRecord>>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            slave_id: AtomicU8::new(1),
            registers: Mutex::new(HashMap::new()),
            exceptions: Mutex::new(HashMap::new()),
            latency: Mutex::new(Duration::ZERO),
            silent: AtomicBool::new(false),
            refuse_open: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

/// Simulated drive; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct DriveSimulator {
    state: Arc<SimState>,
}

impl DriveSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slave_id(self, slave_id: u8) -> Self {
        self.state.slave_id.store(slave_id, Ordering::SeqCst);
        self
    }

    pub fn slave_id(&self) -> u8 {
        self.state.slave_id.load(Ordering::SeqCst)
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.state.registers.lock().insert(address, value);
    }

    /// Fill consecutive registers starting at `start`
    pub fn set_registers(&self, start: u16, values: &[u16]) {
        let mut registers = self.state.registers.lock();
        for (offset, value) in values.iter().enumerate() {
            registers.insert(start.wrapping_add(offset as u16), *value);
        }
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.state.registers.lock().get(&address).copied()
    }

    /// Answer every request touching `address` with exception `code`
    pub fn fail_address(&self, address: u16, code: u8) {
        self.state.exceptions.lock().insert(address, code);
    }

    pub fn clear_failure(&self, address: u16) {
        self.state.exceptions.lock().remove(&address);
    }

    /// Delay between request and response
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = latency;
    }

    /// A silent slave never answers
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    /// Make the next open attempts fail as if the device were missing
    pub fn set_refuse_open(&self, refuse: bool) {
        self.state.refuse_open.store(refuse, Ordering::SeqCst);
    }

    /// Register writes accepted so far, in order
    pub fn writes(&self) -> Vec<(u16, u16)> {
        self.state.writes.lock().clone()
    }

    pub fn requests(&self) -> Vec<RequestRecord> {
        self.state.requests.lock().clone()
    }

    /// Highest number of exchanges observed on the wire at the same time
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn connector(&self) -> SimulatorConnector {
        SimulatorConnector { sim: self.clone() }
    }

    pub fn link(&self) -> SimLink {
        SimLink {
            sim: self.clone(),
            pending: None,
        }
    }

    /// Build the slave's reply to one request frame; `None` means no reply
    pub fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        let (slave_id, pdu) = match frame::decode_adu(request) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Sim dropped frame: {}", e);
                return None;
            },
        };
        if slave_id != self.slave_id() {
            return None;
        }

        let function_code = *pdu.first()?;
        if pdu.len() < 5 {
            return Some(self.reply(frame::exception_pdu(
                function_code,
                ExceptionCode::FrameError.code(),
            )));
        }
        let address = u16::from_be_bytes([pdu[1], pdu[2]]);
        let operand = u16::from_be_bytes([pdu[3], pdu[4]]);

        self.state.requests.lock().push(RequestRecord {
            at: Instant::now(),
            function_code,
            address,
        });

        let response = match function_code {
            FC_READ_HOLDING_REGISTERS => self.read(address, operand),
            FC_WRITE_SINGLE_REGISTER => self.write(address, operand),
            _ => Err(ExceptionCode::IllegalCommand.code()),
        };

        Some(self.reply(match response {
            Ok(pdu) => pdu,
            Err(code) => frame::exception_pdu(function_code, code),
        }))
    }

    fn reply(&self, pdu: Vec<u8>) -> Vec<u8> {
        frame::encode_adu(self.slave_id(), &pdu)
    }

    fn read(&self, address: u16, count: u16) -> std::result::Result<Vec<u8>, u8> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ExceptionCode::IllegalValue.code());
        }

        let exceptions = self.state.exceptions.lock();
        let registers = self.state.registers.lock();
        let mut values = Vec::with_capacity(count as usize);
        for offset in 0..count {
            let addr = address.wrapping_add(offset);
            if let Some(code) = exceptions.get(&addr) {
                return Err(*code);
            }
            match registers.get(&addr) {
                Some(value) => values.push(*value),
                None => return Err(ExceptionCode::IllegalAddress.code()),
            }
        }

        Ok(frame::read_holding_registers_response_pdu(&values))
    }

    fn write(&self, address: u16, value: u16) -> std::result::Result<Vec<u8>, u8> {
        if let Some(code) = self.state.exceptions.lock().get(&address) {
            return Err(*code);
        }

        self.state.registers.lock().insert(address, value);
        self.state.writes.lock().push((address, value));
        Ok(frame::write_single_register_pdu(address, value))
    }

    fn enter_exchange(&self) {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave_exchange(&self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`Connector`] handing out links to a [`DriveSimulator`]
#[derive(Debug, Clone)]
pub struct SimulatorConnector {
    sim: DriveSimulator,
}

impl Connector for SimulatorConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BusLink>> {
        if self.sim.state.refuse_open.load(Ordering::SeqCst) {
            return Err(ModbusError::comm(format!(
                "Failed to open serial port {}: no such device",
                config.port
            )));
        }
        Ok(Box::new(self.sim.link()))
    }
}

/// Link end attached to a [`DriveSimulator`]
#[derive(Debug)]
pub struct SimLink {
    sim: DriveSimulator,
    pending: Option<Vec<u8>>,
}

#[async_trait]
impl BusLink for SimLink {
    async fn discard_input(&mut self) -> Result<()> {
        self.pending = None;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sim.enter_exchange();
        self.pending = if self.sim.state.silent.load(Ordering::SeqCst) {
            None
        } else {
            self.sim.respond(data)
        };
        Ok(())
    }

    async fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        let latency = *self.sim.state.latency.lock();
        let result = match self.pending.take() {
            Some(response) if latency <= timeout => {
                sleep(latency).await;
                let len = response.len().min(buffer.len());
                buffer[..len].copy_from_slice(&response[..len]);
                Ok(len)
            },
            _ => {
                sleep(timeout).await;
                Err(ModbusError::comm(
                    "Timeout waiting for response (0 bytes received)",
                ))
            },
        };
        self.sim.leave_exchange();
        result
    }
}
