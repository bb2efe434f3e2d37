//! Power-supply model classification.
//!
//! Some supply families report status and fan speed in their own way. The
//! model number read from the supply picks the status-bit table and the fan
//! decode once per reading; every field of that reading is then decoded
//! with the same choice.
//!
//! Supporting a new family means extending [`ModelTable`] data, not adding
//! logic.

/// Addresses at or above this use a status layout nobody has decoded yet.
pub const HIGH_ADDRESS_THRESHOLD: u8 = 0xB0;

/// Known supply families with non-standard reporting.
#[derive(Debug, Clone, Copy)]
pub struct ModelTable {
    /// Substrings that mark a non-standard status layout
    pub nonstandard: &'static [&'static str],
    /// Model numbers that are non-standard only on an exact match
    pub nonstandard_exact: &'static [&'static str],
    /// Substrings that mark the legacy fan speed encoding
    pub legacy_fan: &'static [&'static str],
}

/// Supermicro PWS families.
pub const SUPERMICRO_MODELS: ModelTable = ModelTable {
    nonstandard: &[
        "PWS-721P",
        "PWS-703P",
        "PWS-704P",
        "PWS-1K41P",
        "PWS-1K41F",
        "PWS-1K21P",
        "PWS-1K62P",
        "PWS-504P-RR",
        "PWS-920P-1R",
        "PWS-1K11P",
    ],
    nonstandard_exact: &["PWS-920P-1R2"],
    legacy_fan: &["721"],
};

/// How the status byte of a supply is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTable {
    /// Vendor layout: OK in bit 0, faults in bits 1 to 4, OFF in bit 6
    NonStandard,
    /// Standard-class supply at a high address; layout not implemented
    HighAddressGap,
    /// PMBus STATUS_BYTE layout
    Standard,
}

/// Decode rules chosen for one supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status_table: StatusTable,
    /// Fan speeds use the legacy linear scale
    pub legacy_fan: bool,
}

impl ModelTable {
    /// Non-standard status layout for this model?
    pub fn is_nonstandard(&self, model: &str) -> bool {
        self.nonstandard.iter().any(|prefix| model.contains(prefix))
            || self.nonstandard_exact.iter().any(|exact| model == *exact)
    }

    /// Legacy fan speed encoding for this model?
    pub fn uses_legacy_fan(&self, model: &str) -> bool {
        self.legacy_fan.iter().any(|marker| model.contains(marker))
    }

    /// Choose the decode rules for the supply with `model` at `addr`.
    pub fn classify(&self, model: &str, addr: u8) -> Classification {
        let status_table = if self.is_nonstandard(model) {
            StatusTable::NonStandard
        } else if addr >= HIGH_ADDRESS_THRESHOLD {
            StatusTable::HighAddressGap
        } else {
            StatusTable::Standard
        };

        Classification {
            status_table,
            legacy_fan: self.uses_legacy_fan(model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("PWS-721P"; "legacy_family")]
    #[test_case("PWS-920P-1R2"; "exact_exception")]
    #[test_case("PWS-1K62P-1R"; "prefix_with_suffix")]
    #[test_case("PWS-504P-RR"; "redundant_unit")]
    fn nonstandard_models(model: &str) {
        assert!(SUPERMICRO_MODELS.is_nonstandard(model));
    }

    #[test_case("PWS-2K04A-1R"; "newer_supermicro")]
    #[test_case("DPS-750AB-1"; "other_vendor")]
    #[test_case(""; "empty")]
    fn standard_models(model: &str) {
        assert!(!SUPERMICRO_MODELS.is_nonstandard(model));
    }

    #[test]
    fn test_legacy_fan_marker() {
        assert!(SUPERMICRO_MODELS.uses_legacy_fan("PWS-721P-1R"));
        assert!(!SUPERMICRO_MODELS.uses_legacy_fan("PWS-920P-1R2"));
    }

    #[test]
    fn test_nonstandard_wins_over_high_address() {
        let c = SUPERMICRO_MODELS.classify("PWS-721P", 0xB2);
        assert_eq!(c.status_table, StatusTable::NonStandard);
        assert!(c.legacy_fan);
    }

    #[test_case(0x78, StatusTable::Standard; "low_address")]
    #[test_case(0xAF, StatusTable::Standard; "just_below_threshold")]
    #[test_case(0xB0, StatusTable::HighAddressGap; "at_threshold")]
    #[test_case(0xB2, StatusTable::HighAddressGap; "above_threshold")]
    fn standard_model_by_address(addr: u8, expected: StatusTable) {
        let c = SUPERMICRO_MODELS.classify("PWS-2K04A-1R", addr);
        assert_eq!(c.status_table, expected);
        assert!(!c.legacy_fan);
    }

    #[test]
    fn test_custom_table() {
        let table = ModelTable {
            nonstandard: &["ACME-9"],
            nonstandard_exact: &[],
            legacy_fan: &["OLD"],
        };
        assert!(table.is_nonstandard("ACME-900"));
        assert!(!table.is_nonstandard("PWS-721P"));
        assert!(table.classify("ACME-9-OLD", 0x10).legacy_fan);
    }
}
