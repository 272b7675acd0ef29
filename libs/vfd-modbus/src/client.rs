//! Modbus RTU client
//!
//! Frames FC03/FC06 requests for one fixed slave id, runs them through the
//! transport's exclusive section and turns the response into register values,
//! a [`ModbusError::Protocol`] for exception frames, or a
//! [`ModbusError::Comm`] for anything malformed.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::constants::{EXCEPTION_FLAG, MAX_READ_REGISTERS};
use crate::error::{ModbusError, Result};
use crate::frame;
use crate::transport::Transport;

/// Client for a single slave on a shared transport
#[derive(Debug, Clone)]
pub struct ModbusClient {
    transport: Arc<Transport>,
    slave_id: u8,
}

impl ModbusClient {
    /// The slave id is taken from the transport's connection config
    pub fn new(transport: Arc<Transport>) -> Self {
        let slave_id = transport.slave_id();
        Self {
            transport,
            slave_id,
        }
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// FC03: read `count` holding registers starting at `address`
    pub async fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_request(format!(
                "Register count {count} out of range 1..={MAX_READ_REGISTERS}"
            )));
        }

        let request = frame::read_holding_registers_pdu(address, count);
        let response = self.transact(&request).await?;
        let values = frame::parse_read_response(&response, count)?;

        debug!("Read 0x{:04X}+{}: {:?}", address, count, values);
        Ok(values)
    }

    /// FC06: write `value` to `address`
    pub async fn write_register(&self, address: u16, value: u16) -> Result<()> {
        let request = frame::write_single_register_pdu(address, value);
        let response = self.transact(&request).await?;

        // FC06 acknowledges by echoing the request
        if response != request {
            return Err(ModbusError::comm(format!(
                "Write echo mismatch: sent {}, got {}",
                hex::encode_upper(&request),
                hex::encode_upper(&response)
            )));
        }

        debug!("Wrote 0x{:04X} = 0x{:04X}", address, value);
        Ok(())
    }

    /// One request/response exchange under the bus lock, returning the
    /// response PDU once it is known to answer `request`
    async fn transact(&self, request: &[u8]) -> Result<Vec<u8>> {
        let function_code = request[0];
        let adu = frame::encode_adu(self.slave_id, request);

        let mut session = self.transport.acquire().await?;
        let raw = session.exchange(&adu).await?;

        let (slave_id, pdu) = frame::decode_adu(&raw)?;
        if slave_id != self.slave_id {
            return Err(ModbusError::comm(format!(
                "Unexpected response from slave {slave_id} (expected {})",
                self.slave_id
            )));
        }

        let response_fc = pdu
            .first()
            .copied()
            .ok_or_else(|| ModbusError::comm("Empty response PDU"))?;

        if response_fc == function_code | EXCEPTION_FLAG {
            let code = pdu
                .get(1)
                .copied()
                .ok_or_else(|| ModbusError::comm("Exception response without code"))?;
            let err = ModbusError::protocol(code);
            warn!("FC{:02X} exception 0x{:02X}: {}", function_code, code, err);
            return Err(err);
        }

        if response_fc != function_code {
            return Err(ModbusError::comm(format!(
                "Unexpected function in response: 0x{response_fc:02X} (expected 0x{function_code:02X})"
            )));
        }

        Ok(pdu.to_vec())
    }
}
