//! IPMI management protocol definitions.
//!
//! This module holds the pieces of the IPMI command set the client speaks:
//! network functions, command numbers, completion codes, the raw I2C
//! master frame codec and the boot option sequence.
//!
//! ## Message Shape
//!
//! ```text
//! Request:  [NetFn] [Cmd] [Data:N]
//! Response: [CompletionCode:1] [Data:N]
//! ```
//!
//! Session handling, authentication and message framing on the wire are the
//! transport's business. Everything here operates on request data and
//! response bytes only.

pub mod boot;
pub mod master;

use std::fmt;

/// IPMI network functions used by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetFn {
    Chassis = 0x00,
    App = 0x06,
}

/// Command numbers within their network function
pub mod commands {
    /// Chassis Control (NetFn Chassis)
    pub const CHASSIS_CONTROL: u8 = 0x02;
    /// Set System Boot Options (NetFn Chassis)
    pub const SET_SYSTEM_BOOT_OPTIONS: u8 = 0x08;
    /// Master Write-Read (NetFn App)
    pub const MASTER_WRITE_READ: u8 = 0x52;
}

/// IPMI completion code
///
/// The first byte of every response. Zero is success, everything else is a
/// failure category. Codes outside the generic table are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionCode(pub u8);

impl CompletionCode {
    pub const OK: CompletionCode = CompletionCode(0x00);
    pub const NODE_BUSY: CompletionCode = CompletionCode(0xC0);
    pub const INVALID_COMMAND: CompletionCode = CompletionCode(0xC1);
    pub const TIMEOUT: CompletionCode = CompletionCode(0xC3);
    pub const PARAMETER_OUT_OF_RANGE: CompletionCode = CompletionCode(0xC9);
    pub const DESTINATION_UNAVAILABLE: CompletionCode = CompletionCode(0xD3);
    pub const NOT_SUPPORTED_IN_PRESENT_STATE: CompletionCode = CompletionCode(0xD5);
    pub const UNSPECIFIED: CompletionCode = CompletionCode(0xFF);

    pub fn is_success(self) -> bool {
        self.0 == 0x00
    }

    /// Human-readable description from the generic completion code table.
    pub fn description(self) -> &'static str {
        match self.0 {
            0x00 => "Command completed normally",
            0xC0 => "Node busy",
            0xC1 => "Invalid command",
            0xC2 => "Invalid command for given LUN",
            0xC3 => "Timeout while processing command",
            0xC4 => "Out of space",
            0xC5 => "Reservation cancelled or invalid reservation ID",
            0xC6 => "Request data truncated",
            0xC7 => "Request data length invalid",
            0xC8 => "Request data field length limit exceeded",
            0xC9 => "Parameter out of range",
            0xCA => "Cannot return number of requested data bytes",
            0xCB => "Requested sensor, data, or record not present",
            0xCC => "Invalid data field in request",
            0xCD => "Command illegal for specified sensor or record type",
            0xCE => "Command response could not be provided",
            0xCF => "Cannot execute duplicated request",
            0xD0 => "SDR repository in update mode",
            0xD1 => "Device in firmware update mode",
            0xD2 => "BMC initialization in progress",
            0xD3 => "Destination unavailable",
            0xD4 => "Insufficient privilege level",
            0xD5 => "Command not supported in present state",
            0xD6 => "Command sub-function disabled or unavailable",
            0xFF => "Unspecified error",
            _ => "Unknown completion code",
        }
    }
}

impl From<u8> for CompletionCode {
    fn from(value: u8) -> Self {
        CompletionCode(value)
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.0)
    }
}

/// Chassis power control actions
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum ChassisControl {
    PowerDown = 0x00,
    PowerUp = 0x01,
    PowerCycle = 0x02,
    HardReset = 0x03,
    PulseDiagnosticInterrupt = 0x04,
    SoftShutdown = 0x05,
}
