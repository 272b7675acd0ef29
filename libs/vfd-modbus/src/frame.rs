//! Modbus RTU framing
//!
//! ```text
//! ADU: [Slave(1)][PDU(N)][CRC lo][CRC hi]
//! FC03 request:   [03][addr hi][addr lo][count hi][count lo]
//! FC03 response:  [03][byte count][data ...]
//! FC06 request:   [06][addr hi][addr lo][value hi][value lo]   (response echoes)
//! Exception:      [FC | 0x80][code]
//! ```

use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_16_MODBUS};

use crate::constants::{
    EXCEPTION_FLAG, EXCEPTION_RESPONSE_LEN, FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER,
    MAX_ADU_SIZE, WRITE_SINGLE_RESPONSE_LEN,
};
use crate::error::{ModbusError, Result};

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16/MODBUS over `data`
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// FC03 request PDU
pub fn read_holding_registers_pdu(address: u16, count: u16) -> Vec<u8> {
    let mut pdu = BytesMut::with_capacity(5);
    pdu.put_u8(FC_READ_HOLDING_REGISTERS);
    pdu.put_u16(address);
    pdu.put_u16(count);
    pdu.to_vec()
}

/// FC06 request PDU
pub fn write_single_register_pdu(address: u16, value: u16) -> Vec<u8> {
    let mut pdu = BytesMut::with_capacity(5);
    pdu.put_u8(FC_WRITE_SINGLE_REGISTER);
    pdu.put_u16(address);
    pdu.put_u16(value);
    pdu.to_vec()
}

/// FC03 response PDU carrying `values`
pub fn read_holding_registers_response_pdu(values: &[u16]) -> Vec<u8> {
    let mut pdu = BytesMut::with_capacity(2 + values.len() * 2);
    pdu.put_u8(FC_READ_HOLDING_REGISTERS);
    pdu.put_u8((values.len() * 2) as u8);
    for value in values {
        pdu.put_u16(*value);
    }
    pdu.to_vec()
}

/// Exception response PDU
pub fn exception_pdu(function_code: u8, code: u8) -> Vec<u8> {
    vec![function_code | EXCEPTION_FLAG, code]
}

/// Wrap a PDU into an RTU ADU (slave id + PDU + CRC, CRC low byte first)
pub fn encode_adu(slave_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(1 + pdu.len() + 2);
    frame.put_u8(slave_id);
    frame.put_slice(pdu);
    let crc = crc16(&frame);
    frame.put_u16_le(crc);
    frame.to_vec()
}

/// Split an RTU ADU into slave id and PDU after checking length and CRC
pub fn decode_adu(frame: &[u8]) -> Result<(u8, &[u8])> {
    if frame.len() < 4 {
        return Err(ModbusError::comm(format!(
            "Response too short: {} bytes",
            frame.len()
        )));
    }
    if frame.len() > MAX_ADU_SIZE {
        return Err(ModbusError::comm(format!(
            "Frame exceeds maximum size: {} bytes",
            frame.len()
        )));
    }

    let crc_pos = frame.len() - 2;
    let received = u16::from_le_bytes([frame[crc_pos], frame[crc_pos + 1]]);
    let calculated = crc16(&frame[..crc_pos]);
    if received != calculated {
        return Err(ModbusError::comm(format!(
            "CRC mismatch: expected 0x{calculated:04X}, got 0x{received:04X}"
        )));
    }

    Ok((frame[0], &frame[1..crc_pos]))
}

/// Full response length once enough of the frame has arrived to know it
pub fn expected_response_len(partial: &[u8]) -> Option<usize> {
    let function_code = *partial.get(1)?;
    if function_code & EXCEPTION_FLAG != 0 {
        return Some(EXCEPTION_RESPONSE_LEN);
    }
    match function_code {
        FC_READ_HOLDING_REGISTERS => partial.get(2).map(|count| 3 + *count as usize + 2),
        FC_WRITE_SINGLE_REGISTER => Some(WRITE_SINGLE_RESPONSE_LEN),
        _ => None,
    }
}

/// Register values from an FC03 response PDU
pub fn parse_read_response(pdu: &[u8], expected_count: u16) -> Result<Vec<u16>> {
    if pdu.len() < 2 {
        return Err(ModbusError::comm("Read response PDU too short"));
    }
    let byte_count = pdu[1] as usize;
    let expected_bytes = expected_count as usize * 2;
    if byte_count != expected_bytes {
        return Err(ModbusError::comm(format!(
            "Unexpected byte count: {byte_count} expected {expected_bytes}"
        )));
    }
    let data = &pdu[2..];
    if data.len() != byte_count {
        return Err(ModbusError::comm(format!(
            "Register data truncated: {} of {} bytes",
            data.len(),
            byte_count
        )));
    }

    Ok(data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}
