//! Definitions and data types related to PDOs

use crate::messages::CanId;

/// Bit 30 of a PDO COB-ID parameter: remote requests are not allowed
pub const COB_ID_NO_RTR: u32 = 1 << 30;
/// Bit 31 of a PDO COB-ID parameter: the PDO is disabled
pub const COB_ID_INVALID: u32 = 1 << 31;

/// PDO transmission types used by the sled configuration
pub mod transmission {
    /// Synchronous, transmitted on every SYNC
    pub const SYNC_EVERY: u8 = 0x01;
    /// Event driven, manufacturer specific trigger
    pub const EVENT_MANUFACTURER: u8 = 0xFE;
    /// Event driven, device profile trigger
    pub const EVENT_PROFILE: u8 = 0xFF;
}

/// Represents a PDO mapping
///
/// Each mapping specifies one sub-object to be included in the PDO data bytes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PdoMapping {
    /// The object index
    pub index: u16,
    /// The object sub index
    pub sub: u8,
    /// The size of the object to map, in **bits**
    pub size: u8,
}

impl PdoMapping {
    /// Create a mapping entry
    pub const fn new(index: u16, sub: u8, size: u8) -> Self {
        Self { index, sub, size }
    }

    /// Convert a PdoMapping object to the u32 representation stored in the mapping parameter
    pub fn to_object_value(&self) -> u32 {
        ((self.index as u32) << 16) | ((self.sub as u32) << 8) | (self.size as u32)
    }

    /// Create a PdoMapping object from the raw u32 representation stored in the mapping parameter
    pub fn from_object_value(value: u32) -> Self {
        let index = (value >> 16) as u16;
        let sub = ((value >> 8) & 0xff) as u8;
        let size = (value & 0xff) as u8;
        Self { index, sub, size }
    }
}

/// Build the value written to a PDO communication parameter COB-ID sub-object
///
/// RTR is always disallowed; `enabled = false` sets the invalid bit.
pub fn cob_id_value(cob_id: CanId, enabled: bool) -> u32 {
    let mut value = cob_id.raw() | COB_ID_NO_RTR;
    if !enabled {
        value |= COB_ID_INVALID;
    }
    value
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mapping_values() {
        assert_eq!(0x60410010, PdoMapping::new(0x6041, 0, 16).to_object_value());
        assert_eq!(0x60C10120, PdoMapping::new(0x60C1, 1, 32).to_object_value());
        assert_eq!(
            PdoMapping::new(0x606C, 0, 32),
            PdoMapping::from_object_value(0x606C0020)
        );
    }

    #[test]
    fn test_cob_id_value() {
        assert_eq!(0x40000181, cob_id_value(CanId::std(0x181), true));
        assert_eq!(0xC0000381, cob_id_value(CanId::std(0x381), false));
    }
}
