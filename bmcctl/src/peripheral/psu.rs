//! Power supply telemetry over the BMC's PMBus.
//!
//! Supermicro BMCs expose each power supply as a PMBus device on a private
//! I2C bus, reachable through Master Write-Read. Readings are a fixed
//! sequence of one- and two-byte register reads. The model number is read
//! first because it decides how the status byte and fan speeds decode, and
//! VOUT_MODE is read before READ_VOUT because it carries the exponent.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::pmbus::{self, LegacyLinear, Linear11, StatusDecoder};
use super::psu_model::{Classification, ModelTable, StatusTable};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Vendor register blocks, read one byte per register
pub mod vendor {
    /// Serial number, 15 registers
    pub const SERIAL_NUMBER: u8 = 0xD0;
    pub const SERIAL_NUMBER_LEN: usize = 15;
    /// Model number, 13 registers
    pub const MODEL_NUMBER: u8 = 0xE0;
    pub const MODEL_NUMBER_LEN: usize = 13;
    /// Hardware revision, 3 registers
    pub const REVISION: u8 = 0xF3;
    pub const REVISION_LEN: usize = 3;
    /// Current sharing control, one word
    pub const CURRENT_SHARING: u8 = 0xFC;
}

bitflags! {
    /// Status byte of the non-standard supply families
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VendorStatus: u8 {
        const OK = 0x01;
        const OVER_TEMPERATURE = 0x02;
        const UNDER_VOLTAGE = 0x04;
        const OVER_CURRENT = 0x08;
        const OVER_VOLTAGE = 0x10;
        const OFF = 0x40;
    }
}

const VENDOR_STATUS_LABELS: [(VendorStatus, &str); 6] = [
    (VendorStatus::OK, "OK"),
    (VendorStatus::OVER_TEMPERATURE, "Over Temperature Fault"),
    (VendorStatus::UNDER_VOLTAGE, "Under Voltage Fault"),
    (VendorStatus::OVER_CURRENT, "Over Current Fault"),
    (VendorStatus::OVER_VOLTAGE, "Over Voltage Fault"),
    (VendorStatus::OFF, "OFF"),
];

/// Decode the vendor status byte into labels, in bit order.
pub fn decode_vendor_status(status: u8) -> Vec<&'static str> {
    let flags = VendorStatus::from_bits_retain(status);
    VENDOR_STATUS_LABELS
        .iter()
        .filter(|(bit, _)| flags.contains(*bit))
        .map(|(_, label)| *label)
        .collect()
}

/// Decoded status of one supply.
///
/// Serialized as a list of labels. `Unsupported` serializes as an empty
/// list, so a stored reading reads back as `Flags(vec![])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum StatusReport {
    Flags(Vec<String>),
    /// The status layout for this supply is not implemented
    Unsupported { raw: u8 },
}

impl StatusReport {
    /// Decode `status` with the table chosen for this supply.
    pub fn decode(table: StatusTable, status: u8) -> Self {
        let labels = match table {
            StatusTable::NonStandard => decode_vendor_status(status),
            StatusTable::Standard => StatusDecoder::decode_status_byte(status),
            StatusTable::HighAddressGap => return StatusReport::Unsupported { raw: status },
        };
        StatusReport::Flags(labels.into_iter().map(String::from).collect())
    }

    pub fn labels(&self) -> &[String] {
        match self {
            StatusReport::Flags(labels) => labels,
            StatusReport::Unsupported { .. } => &[],
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, StatusReport::Flags(_))
    }

    /// Labels of a decoded status, or an error if it could not be decoded.
    pub fn flags(&self) -> Result<&[String]> {
        match self {
            StatusReport::Flags(labels) => Ok(labels),
            StatusReport::Unsupported { raw } => Err(Error::Unsupported(format!(
                "status byte {:#04x} has no known layout",
                raw
            ))),
        }
    }
}

impl From<Vec<String>> for StatusReport {
    fn from(labels: Vec<String>) -> Self {
        StatusReport::Flags(labels)
    }
}

impl From<StatusReport> for Vec<String> {
    fn from(report: StatusReport) -> Self {
        match report {
            StatusReport::Flags(labels) => labels,
            StatusReport::Unsupported { .. } => Vec::new(),
        }
    }
}

/// Current sharing mode of a redundant supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum CurrentSharing {
    #[serde(rename = "Active - Active")]
    #[strum(serialize = "Active - Active")]
    ActiveActive,
    #[serde(rename = "Active - Standby")]
    #[strum(serialize = "Active - Standby")]
    ActiveStandby,
    #[serde(rename = "Unknown")]
    #[strum(serialize = "Unknown")]
    Unknown,
    #[serde(rename = "Not supported")]
    #[strum(serialize = "Not supported")]
    NotSupported,
}

impl CurrentSharing {
    /// Interpret the current sharing control word.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        if bytes == [0x00, 0x00] || bytes == [0xFF, 0xFF] {
            return CurrentSharing::NotSupported;
        }
        match bytes[0] & 0x0F {
            0 => CurrentSharing::ActiveActive,
            1..=9 => CurrentSharing::Unknown,
            _ => CurrentSharing::ActiveStandby,
        }
    }
}

/// One complete power supply reading.
///
/// Field names are the persisted format, misspellings included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSupplyReading {
    #[serde(rename = "serial_numner")]
    pub serial_number: String,
    #[serde(rename = "module_numner")]
    pub model_number: String,
    pub revision: String,
    pub pmbus_revision: u8,
    #[serde(rename = "cur_sharing_control")]
    pub current_sharing: CurrentSharing,
    pub status: StatusReport,
    /// AC input voltage (V)
    pub input_voltage: f64,
    /// AC input current (A)
    pub input_current: f64,
    /// DC output voltage (V)
    pub output_voltage: f64,
    /// DC output current (A)
    pub output_current: f64,
    /// Temperatures (°C)
    pub temperature1: f64,
    pub temperature2: f64,
    /// Fan speeds (RPM)
    pub fan1: f64,
    pub fan2: f64,
    /// Input and output power (W)
    pub input_power: f64,
    pub output_power: f64,
}

/// Power supply at one address behind the BMC.
pub struct PowerSupply<'a, T> {
    client: &'a mut Client<T>,
    bus: u8,
    addr: u8,
    models: ModelTable,
}

impl<'a, T: Transport> PowerSupply<'a, T> {
    pub fn new(client: &'a mut Client<T>, bus: u8, addr: u8, models: ModelTable) -> Self {
        Self {
            client,
            bus,
            addr,
            models,
        }
    }

    /// Read every field of the supply, in dependency order.
    ///
    /// The first failed read aborts the whole reading.
    pub fn read(&mut self) -> Result<PowerSupplyReading> {
        debug!(bus = self.bus, addr = %format!("{:#04x}", self.addr), "Reading power supply");

        let serial_number =
            self.read_string(vendor::SERIAL_NUMBER, vendor::SERIAL_NUMBER_LEN)?;
        let model_number = self.read_string(vendor::MODEL_NUMBER, vendor::MODEL_NUMBER_LEN)?;
        let revision = self.read_string(vendor::REVISION, vendor::REVISION_LEN)?;
        let pmbus_revision = self.read_byte(pmbus::commands::PMBUS_REVISION)?;
        let current_sharing =
            CurrentSharing::from_bytes(self.read_word(vendor::CURRENT_SHARING)?);
        let vout_mode = self.read_byte(pmbus::commands::VOUT_MODE)?;
        let status_byte = self.read_byte(pmbus::commands::STATUS_BYTE)?;

        let classification = self.models.classify(&model_number, self.addr);
        debug!(
            model = %model_number,
            table = ?classification.status_table,
            legacy_fan = classification.legacy_fan,
            "Classified power supply"
        );

        let status = StatusReport::decode(classification.status_table, status_byte);
        if !status.is_supported() {
            warn!(
                addr = %format!("{:#04x}", self.addr),
                status = %format!("{:#04x}", status_byte),
                "Status layout not implemented for this address"
            );
        }

        let input_voltage = self.read_linear(pmbus::commands::READ_VIN)?;
        let input_current = self.read_linear(pmbus::commands::READ_IIN)?;
        let output_voltage =
            pmbus::decode_vout(self.read_word(pmbus::commands::READ_VOUT)?, vout_mode);
        let output_current = self.read_linear(pmbus::commands::READ_IOUT)?;
        let temperature1 = self.read_linear(pmbus::commands::READ_TEMPERATURE_1)?;
        let temperature2 = self.read_linear(pmbus::commands::READ_TEMPERATURE_2)?;
        let fan1 = self.read_fan(pmbus::commands::READ_FAN_SPEED_1, &classification)?;
        let fan2 = self.read_fan(pmbus::commands::READ_FAN_SPEED_2, &classification)?;
        let input_power = self.read_linear(pmbus::commands::READ_PIN)?;
        let output_power = self.read_linear(pmbus::commands::READ_POUT)?;

        Ok(PowerSupplyReading {
            serial_number,
            model_number,
            revision,
            pmbus_revision,
            current_sharing,
            status,
            input_voltage,
            input_current,
            output_voltage,
            output_current,
            temperature1,
            temperature2,
            fan1,
            fan2,
            input_power,
            output_power,
        })
    }

    // Helper methods for register access

    fn read_byte(&mut self, command: u8) -> Result<u8> {
        self.client
            .send_raw(self.bus, self.addr, 1, &[command])?
            .byte(0)
    }

    fn read_word(&mut self, command: u8) -> Result<[u8; 2]> {
        self.client
            .send_raw(self.bus, self.addr, 2, &[command])?
            .word_bytes()
    }

    fn read_linear(&mut self, command: u8) -> Result<f64> {
        Ok(Linear11::from_bytes(self.read_word(command)?))
    }

    fn read_fan(&mut self, command: u8, classification: &Classification) -> Result<f64> {
        let bytes = self.read_word(command)?;
        if classification.legacy_fan {
            Ok(LegacyLinear::from_bytes(bytes))
        } else {
            Ok(Linear11::from_bytes(bytes))
        }
    }

    /// Read a string stored one character per register, stopping at the
    /// first byte outside the printable range.
    fn read_string(&mut self, start: u8, len: usize) -> Result<String> {
        let mut text = String::with_capacity(len);
        for offset in 0..len {
            let byte = self.read_byte(start + offset as u8)?;
            if !(0x1F..=0x7E).contains(&byte) {
                break;
            }
            text.push(byte as char);
        }
        Ok(text)
    }
}
