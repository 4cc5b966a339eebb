//! CAN frame types and frame classification
//!
//! The control stack only deals with standard 11-bit identifiers, but extended identifiers are
//! representable so that drivers can pass through whatever arrives on the bus.

use snafu::Snafu;

/// Number of bits the CANopen function code is shifted by within an 11-bit COB-ID
pub const FUNCTION_CODE_SHIFT: u16 = 7;

/// A CAN identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanId {
    /// A standard 11-bit identifier
    Std(u16),
    /// An extended 29-bit identifier
    Extended(u32),
}

impl CanId {
    /// Create a standard ID
    pub const fn std(id: u16) -> Self {
        Self::Std(id)
    }

    /// Create an extended ID
    pub const fn extended(id: u32) -> Self {
        Self::Extended(id)
    }

    /// Get the raw identifier value
    pub fn raw(&self) -> u32 {
        match self {
            CanId::Std(id) => *id as u32,
            CanId::Extended(id) => *id,
        }
    }

    /// True if this is an extended identifier
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }

    /// The CANopen function code (upper four bits of a standard ID)
    ///
    /// Returns None for extended IDs, which CANopen does not use.
    pub fn function_code(&self) -> Option<u8> {
        match self {
            CanId::Std(id) => Some((id >> FUNCTION_CODE_SHIFT) as u8),
            CanId::Extended(_) => None,
        }
    }

    /// The node ID portion (lower seven bits) of a standard ID
    pub fn node_bits(&self) -> Option<u8> {
        match self {
            CanId::Std(id) => Some((id & 0x7F) as u8),
            CanId::Extended(_) => None,
        }
    }
}

impl core::fmt::Display for CanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CanId::Std(id) => write!(f, "{id:03X}"),
            CanId::Extended(id) => write!(f, "{id:08X}"),
        }
    }
}

/// A classic CAN frame with up to 8 data bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanMessage {
    id: CanId,
    rtr: bool,
    dlc: u8,
    /// Unused bytes are always zero
    data: [u8; 8],
}

impl CanMessage {
    /// Create a data frame
    ///
    /// Only the first 8 bytes of `data` are used
    pub fn new(id: CanId, data: &[u8]) -> Self {
        let dlc = data.len().min(8);
        let mut buf = [0; 8];
        buf[..dlc].copy_from_slice(&data[..dlc]);
        Self {
            id,
            rtr: false,
            dlc: dlc as u8,
            data: buf,
        }
    }

    /// Create a remote transmission request frame
    pub fn new_rtr(id: CanId) -> Self {
        Self {
            id,
            rtr: true,
            dlc: 0,
            data: [0; 8],
        }
    }

    /// The frame identifier
    pub fn id(&self) -> CanId {
        self.id
    }

    /// The valid data bytes of the frame
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// All eight data bytes, zero padded past the DLC
    pub fn padded_data(&self) -> [u8; 8] {
        self.data
    }

    /// True if this is a remote frame
    pub fn is_rtr(&self) -> bool {
        self.rtr
    }
}

/// A CAN adapter error condition, as reported in an error frame
///
/// Error frames can carry several bits at once; [`CanError::from_raw`] reports the most severe
/// one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum CanError {
    /// The controller went bus-off
    #[snafu(display("bus off"))]
    BusOff,
    /// Controller problem: buffer overrun or error-passive/warning level reached
    #[snafu(display("controller problem (buffer overrun or error counter warning)"))]
    Controller,
    /// Transmission was not acknowledged by any node
    #[snafu(display("no acknowledge on transmission"))]
    NoAck,
    /// The transceiver reported a fault
    #[snafu(display("transceiver fault"))]
    Transceiver,
    /// A protocol violation was detected on the bus
    #[snafu(display("protocol violation"))]
    ProtocolViolation,
    /// Transmission timed out
    #[snafu(display("transmit timeout"))]
    TxTimeout,
    /// Arbitration was lost
    #[snafu(display("lost arbitration"))]
    LostArbitration,
    /// A generic bus error
    #[snafu(display("bus error"))]
    BusError,
    /// Unrecognized error bits
    #[snafu(display("unknown adapter status 0x{bits:02X}"))]
    Other {
        /// The raw error class bits
        bits: u8,
    },
}

impl CanError {
    /// Interpret the error class bits of a socketcan style error frame
    pub fn from_raw(bits: u8) -> Self {
        if bits & 0x40 != 0 {
            CanError::BusOff
        } else if bits & 0x04 != 0 {
            CanError::Controller
        } else if bits & 0x20 != 0 {
            CanError::NoAck
        } else if bits & 0x10 != 0 {
            CanError::Transceiver
        } else if bits & 0x08 != 0 {
            CanError::ProtocolViolation
        } else if bits & 0x01 != 0 {
            CanError::TxTimeout
        } else if bits & 0x02 != 0 {
            CanError::LostArbitration
        } else if bits & 0x80 != 0 {
            CanError::BusError
        } else {
            CanError::Other { bits }
        }
    }

    /// True if the adapter cannot continue communicating without being reopened
    pub fn is_fatal(&self) -> bool {
        matches!(self, CanError::BusOff)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_function_code() {
        let id = CanId::std(0x581);
        assert_eq!(Some(0x0B), id.function_code());
        assert_eq!(Some(1), id.node_bits());
        assert_eq!(None, CanId::extended(0x581).function_code());
    }

    #[test]
    fn test_short_message_is_padded() {
        let msg = CanMessage::new(CanId::std(0), &[0x80, 0x01]);
        assert_eq!(&[0x80, 0x01], msg.data());
        assert_eq!([0x80, 0x01, 0, 0, 0, 0, 0, 0], msg.padded_data());
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(CanError::BusOff, CanError::from_raw(0x44));
        assert_eq!(CanError::Controller, CanError::from_raw(0x04));
        assert_eq!(CanError::Other { bits: 0 }, CanError::from_raw(0));
        assert!(CanError::from_raw(0x40).is_fatal());
    }
}
