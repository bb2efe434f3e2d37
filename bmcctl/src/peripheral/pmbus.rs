//! PMBus Protocol Support
//!
//! This module provides the PMBus command codes, data format conversions and
//! status decoding used when reading power supplies through a BMC.
//!
//! PMBus is a variant of SMBus with extensions for power management.
//! Specification: <https://pmbus.org/specification-documents/>

use bitflags::bitflags;

/// PMBus standard command codes
pub mod commands {
    pub const VOUT_MODE: u8 = 0x20;
    pub const STATUS_BYTE: u8 = 0x78;
    pub const READ_VIN: u8 = 0x88;
    pub const READ_IIN: u8 = 0x89;
    pub const READ_VOUT: u8 = 0x8B;
    pub const READ_IOUT: u8 = 0x8C;
    pub const READ_TEMPERATURE_1: u8 = 0x8D;
    pub const READ_TEMPERATURE_2: u8 = 0x8E;
    pub const READ_FAN_SPEED_1: u8 = 0x90;
    pub const READ_FAN_SPEED_2: u8 = 0x91;
    pub const READ_POUT: u8 = 0x96;
    pub const READ_PIN: u8 = 0x97;
    pub const PMBUS_REVISION: u8 = 0x98;
}

bitflags! {
    /// STATUS_BYTE bits (PMBus specification section 17.1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusByte: u8 {
        const NONE_OF_THE_ABOVE = 0x01; // Bit 0: No faults
        const CML = 0x02;               // Bit 1: Communication/Logic/Memory fault
        const TEMPERATURE = 0x04;       // Bit 2: Temperature fault/warning
        const VIN_UV = 0x08;            // Bit 3: Input undervoltage fault
        const IOUT_OC = 0x10;           // Bit 4: Output overcurrent fault
        const VOUT_OV = 0x20;           // Bit 5: Output overvoltage fault
        const OFF = 0x40;               // Bit 6: Unit is off
        const BUSY = 0x80;              // Bit 7: Busy - unable to respond
    }
}

/// Sign-extend a 5-bit two's complement field.
fn sign_extend_5(raw: u8) -> i32 {
    let raw = raw & 0x1F;
    if raw & 0x10 != 0 {
        (raw | 0xE0) as i8 as i32
    } else {
        raw as i32
    }
}

/// LINEAR11 data format conversion
///
/// Format: [5-bit two's complement exponent][11-bit two's complement mantissa]
/// Value = mantissa × 2^exponent
pub struct Linear11;

impl Linear11 {
    /// Convert a LINEAR11 word to floating point
    pub fn to_float(value: u16) -> f64 {
        let exponent = sign_extend_5((value >> 11) as u8);

        let mut mantissa = (value & 0x7FF) as i32;
        if mantissa > 1023 {
            mantissa -= 2048;
        }

        mantissa as f64 * 2.0_f64.powi(exponent)
    }

    /// Convert two bytes in wire order (low byte first)
    pub fn from_bytes(bytes: [u8; 2]) -> f64 {
        Self::to_float(u16::from_le_bytes(bytes))
    }
}

/// Legacy linear scale used by older supply generations for fan speed.
///
/// No exponent or sign: the word is scaled by 30, masked to 14 bits and
/// divided by 0.262.
pub struct LegacyLinear;

impl LegacyLinear {
    const SCALE: u32 = 30;
    const MASK: u32 = 0x3FFF;
    const DIVISOR: f64 = 0.262;

    pub fn to_float(value: u16) -> f64 {
        let scaled = (value as u32 * Self::SCALE) & Self::MASK;
        scaled as f64 / Self::DIVISOR
    }

    pub fn from_bytes(bytes: [u8; 2]) -> f64 {
        Self::to_float(u16::from_le_bytes(bytes))
    }
}

/// ULINEAR16 data format conversion
///
/// Format: 16-bit unsigned mantissa, exponent from VOUT_MODE
/// Value = mantissa × 2^exponent
pub struct Linear16;

impl Linear16 {
    /// Exponent carried in the low 5 bits of VOUT_MODE
    pub fn exponent(vout_mode: u8) -> i32 {
        sign_extend_5(vout_mode)
    }

    /// Convert ULINEAR16 format to floating point
    pub fn to_float(value: u16, vout_mode: u8) -> f64 {
        value as f64 * 2.0_f64.powi(Self::exponent(vout_mode))
    }
}

/// Decode a READ_VOUT reading.
///
/// A zero VOUT_MODE means the supply did not report one, in which case the
/// reading is taken as LINEAR11.
pub fn decode_vout(bytes: [u8; 2], vout_mode: u8) -> f64 {
    if vout_mode > 0 {
        Linear16::to_float(u16::from_le_bytes(bytes), vout_mode)
    } else {
        Linear11::from_bytes(bytes)
    }
}

/// Helper functions for decoding status registers
pub struct StatusDecoder;

impl StatusDecoder {
    /// Decode STATUS_BYTE into labels, in bit order.
    ///
    /// "OK" is reported for an all-clear byte, for NONE_OF_THE_ABOVE, and
    /// for a CML-only condition while the unit is still on.
    pub fn decode_status_byte(status: u8) -> Vec<&'static str> {
        let flags = StatusByte::from_bits_retain(status);
        let mut desc = Vec::new();

        if flags.is_empty()
            || flags.contains(StatusByte::NONE_OF_THE_ABOVE)
            || (flags.contains(StatusByte::CML) && !flags.contains(StatusByte::OFF))
        {
            desc.push("OK");
        }
        if flags.contains(StatusByte::TEMPERATURE) { desc.push("Over Temperature Fault"); }
        if flags.contains(StatusByte::VIN_UV) { desc.push("Under Voltage Fault"); }
        if flags.contains(StatusByte::IOUT_OC) { desc.push("Over Current Fault"); }
        if flags.contains(StatusByte::VOUT_OV) { desc.push("Over Voltage Fault"); }
        if flags.contains(StatusByte::OFF) { desc.push("OFF"); }
        if flags.contains(StatusByte::BUSY) { desc.push("Busy"); }
        desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case([0x00, 0x00], 0.0; "zero")]
    #[test_case([0xFF, 0x07], -1.0; "mantissa_minus_one")]
    #[test_case([0xFF, 0x03], 1023.0; "largest_positive_mantissa")]
    #[test_case([0x00, 0x04], -1024.0; "mantissa_sign_boundary")]
    #[test_case([0x01, 0x00], 1.0; "one")]
    fn linear11_exponent_zero(bytes: [u8; 2], expected: f64) {
        assert_eq!(Linear11::from_bytes(bytes), expected);
    }

    #[test]
    fn test_linear11_negative_exponent() {
        // Exponent -2 (0b11110), mantissa 0x0E6 = 230 -> 57.5
        let word: u16 = (0b11110 << 11) | 0x0E6;
        assert_eq!(Linear11::to_float(word), 57.5);
        assert_eq!(Linear11::from_bytes(word.to_le_bytes()), 57.5);
    }

    #[test]
    fn test_linear11_positive_exponent() {
        // Exponent +3, mantissa 100 -> 800
        let word: u16 = (3 << 11) | 100;
        assert_eq!(Linear11::to_float(word), 800.0);
    }

    #[test]
    fn test_linear11_negative_mantissa_and_exponent() {
        // Exponent -1, mantissa -10 -> -5.0
        let word: u16 = (0b11111 << 11) | (2048 - 10);
        assert_eq!(Linear11::to_float(word), -5.0);
    }

    #[test]
    fn test_legacy_linear_fixture() {
        // 0x0123 = 291; 291 * 30 = 8730 (fits in 14 bits)
        assert_eq!(LegacyLinear::from_bytes([0x23, 0x01]), 8730.0 / 0.262);

        // 0x0300 = 768; 768 * 30 = 23040, masked to 14 bits = 6656
        assert_eq!(LegacyLinear::from_bytes([0x00, 0x03]), 6656.0 / 0.262);
    }

    #[test]
    fn test_legacy_and_current_formats_disagree() {
        let bytes = [0x23, 0x01];
        assert_ne!(LegacyLinear::from_bytes(bytes), Linear11::from_bytes(bytes));
    }

    #[test_case(0x17, -9; "minus_nine")]
    #[test_case(0x14, -12; "minus_twelve")]
    #[test_case(0x1F, -1; "minus_one")]
    #[test_case(0x05, 5; "plus_five")]
    fn vout_mode_exponent(mode: u8, exponent: i32) {
        assert_eq!(Linear16::exponent(mode), exponent);
    }

    #[test]
    fn test_decode_vout_uses_mode() {
        // 12.0V at 2^-9 resolution is 6144 = 0x1800
        assert_eq!(decode_vout([0x00, 0x18], 0x17), 12.0);
    }

    #[test]
    fn test_decode_vout_without_mode_falls_back_to_linear11() {
        // Exponent -2, mantissa 48 -> 12.0
        let word: u16 = (0b11110 << 11) | 48;
        assert_eq!(decode_vout(word.to_le_bytes(), 0x00), 12.0);
    }

    #[test_case(0x00, &["OK"]; "all_clear")]
    #[test_case(0x01, &["OK"]; "none_of_the_above")]
    #[test_case(0x02, &["OK"]; "cml_while_on")]
    #[test_case(0x42, &["OFF"]; "cml_while_off")]
    #[test_case(0x04, &["Over Temperature Fault"]; "temperature")]
    #[test_case(0x18, &["Under Voltage Fault", "Over Current Fault"]; "two_faults")]
    #[test_case(0xA0, &["Over Voltage Fault", "Busy"]; "ov_busy")]
    #[test_case(0xFD, &["OK", "Over Temperature Fault", "Under Voltage Fault", "Over Current Fault", "Over Voltage Fault", "OFF", "Busy"]; "everything")]
    fn status_byte(status: u8, expected: &[&str]) {
        assert_eq!(StatusDecoder::decode_status_byte(status), expected);
    }
}
