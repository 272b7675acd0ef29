//! Drive exception codes
//!
//! The drive answers a rejected request with `function | 0x80` followed by a
//! one-byte reason. The vendor table below replaces the generic Modbus
//! meanings for codes 0x01..=0x09.

use std::borrow::Cow;
use std::fmt;

/// Vendor exception codes reported by the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalCommand = 0x01,
    IllegalAddress = 0x02,
    IllegalValue = 0x03,
    OperationFailed = 0x04,
    PasswordError = 0x05,
    FrameError = 0x06,
    WriteNotAllowed = 0x07,
    LockedWhileRunning = 0x08,
    PasswordProtected = 0x09,
}

impl ExceptionCode {
    pub const ALL: [ExceptionCode; 9] = [
        ExceptionCode::IllegalCommand,
        ExceptionCode::IllegalAddress,
        ExceptionCode::IllegalValue,
        ExceptionCode::OperationFailed,
        ExceptionCode::PasswordError,
        ExceptionCode::FrameError,
        ExceptionCode::WriteNotAllowed,
        ExceptionCode::LockedWhileRunning,
        ExceptionCode::PasswordProtected,
    ];

    pub fn from_u8(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| *c as u8 == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn message(self) -> &'static str {
        match self {
            ExceptionCode::IllegalCommand => "Illegal command",
            ExceptionCode::IllegalAddress => "Illegal data address",
            ExceptionCode::IllegalValue => "Illegal value (bad frame)",
            ExceptionCode::OperationFailed => "Operation failed",
            ExceptionCode::PasswordError => "Password error",
            ExceptionCode::FrameError => "Data frame error (CRC/format)",
            ExceptionCode::WriteNotAllowed => "Write not allowed",
            ExceptionCode::LockedWhileRunning => "Parameter cannot be changed during running",
            ExceptionCode::PasswordProtected => "Password protection active",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Decode a raw exception byte into its message
pub fn decode_exception_code(code: u8) -> Cow<'static, str> {
    match ExceptionCode::from_u8(code) {
        Some(known) => Cow::Borrowed(known.message()),
        None => Cow::Owned(format!("Unknown exception code 0x{code:02X}")),
    }
}
