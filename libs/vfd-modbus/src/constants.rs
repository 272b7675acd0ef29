//! Modbus RTU constants

use std::time::Duration;

// ============================================================================
// Function codes
// ============================================================================

/// FC03 Read Holding Registers
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// FC06 Write Single Register
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum PDU size on a serial line
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum RTU ADU size: slave id + PDU + CRC
pub const MAX_ADU_SIZE: usize = 1 + MAX_PDU_SIZE + 2;

/// Shortest valid response: slave + function + one byte + CRC
pub const MIN_RESPONSE_LEN: usize = 5;

/// Exception response length: slave + function + code + CRC
pub const EXCEPTION_RESPONSE_LEN: usize = 5;

/// FC06 response mirrors the 8-byte request
pub const WRITE_SINGLE_RESPONSE_LEN: usize = 8;

/// Receive buffer size, leaves headroom over MAX_ADU_SIZE for line noise
pub const RESPONSE_BUFFER_SIZE: usize = 512;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03
/// 1 (FC) + 1 (byte count) + N * 2 <= 253  =>  N <= 125
pub const MAX_READ_REGISTERS: u16 = 125;

// ============================================================================
// Timing
// ============================================================================

/// Settling delay before every transaction, taken while the bus is held.
/// Low-cost USB/RS485 adapters need it for direction turnaround.
pub const SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Silence on the line that terminates a frame of unknown length
pub const INTER_BYTE_TIMEOUT: Duration = Duration::from_millis(50);

// ============================================================================
// Serial parameters
// ============================================================================

/// Baud rates accepted by the drive
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Highest assignable slave address
pub const MAX_SLAVE_ID: u8 = 247;
