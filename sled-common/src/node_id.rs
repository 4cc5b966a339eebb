//! The node ID of the drive, and the COB-IDs derived from it
//!

use serde::Deserialize;

use crate::messages::CanId;

/// Function code bases of the predefined connection set
pub mod function {
    /// Emergency messages
    pub const EMCY: u16 = 0x080;
    /// First transmit PDO. Each further TPDO is 0x100 higher.
    pub const TPDO1: u16 = 0x180;
    /// First receive PDO. Each further RPDO is 0x100 higher.
    pub const RPDO1: u16 = 0x200;
    /// SDO responses from server to client
    pub const SDO_TX: u16 = 0x580;
    /// SDO requests from client to server
    pub const SDO_RX: u16 = 0x600;
    /// Heartbeat and node guard
    pub const HEARTBEAT: u16 = 0x700;
}

/// A newtype on u8 to enforce a valid, configured node ID (1-127)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub struct NodeId(u8);

impl NodeId {
    /// Try to create a new NodeId
    ///
    /// It will fail if value is invalid (i.e. <1 or >127)
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value > 0 && value < 128 {
            Ok(NodeId(value))
        } else {
            Err(InvalidNodeIdError(value))
        }
    }

    /// Get the raw node ID as a u8
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// COB-ID on which the node sends emergency messages
    pub fn emcy_cob_id(&self) -> CanId {
        CanId::std(function::EMCY + self.0 as u16)
    }

    /// COB-ID of transmit PDO `n` (1 to 4)
    pub fn tpdo_cob_id(&self, n: u8) -> CanId {
        CanId::std(function::TPDO1 + 0x100 * (n.saturating_sub(1) as u16) + self.0 as u16)
    }

    /// COB-ID of receive PDO `n` (1 to 4)
    pub fn rpdo_cob_id(&self, n: u8) -> CanId {
        CanId::std(function::RPDO1 + 0x100 * (n.saturating_sub(1) as u16) + self.0 as u16)
    }

    /// COB-ID on which the node's SDO server responds
    pub fn sdo_tx_cob_id(&self) -> CanId {
        CanId::std(function::SDO_TX + self.0 as u16)
    }

    /// COB-ID on which the node's SDO server receives requests
    pub fn sdo_rx_cob_id(&self) -> CanId {
        CanId::std(function::SDO_RX + self.0 as u16)
    }

    /// COB-ID on which the node publishes its heartbeat
    pub fn heartbeat_cob_id(&self) -> CanId {
        CanId::std(function::HEARTBEAT + self.0 as u16)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId(1)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value)
    }
}

/// Error for converting u8 to a NodeId
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNodeIdError(pub u8);

impl core::fmt::Display for InvalidNodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid node ID {}", self.0)
    }
}
impl core::error::Error for InvalidNodeIdError {}

#[cfg(test)]
mod test {
    use assertables::*;

    use super::*;

    #[test]
    fn test_node_id_range() {
        assert_err!(NodeId::new(0));
        assert_err!(NodeId::new(128));
        assert_ok!(NodeId::new(127));
    }

    #[test]
    fn test_cob_ids() {
        let id = NodeId::new(1).unwrap();
        assert_eq!(CanId::std(0x181), id.tpdo_cob_id(1));
        assert_eq!(CanId::std(0x281), id.tpdo_cob_id(2));
        assert_eq!(CanId::std(0x481), id.tpdo_cob_id(4));
        assert_eq!(CanId::std(0x301), id.rpdo_cob_id(2));
        assert_eq!(CanId::std(0x601), id.sdo_rx_cob_id());
        assert_eq!(CanId::std(0x581), id.sdo_tx_cob_id());
        assert_eq!(CanId::std(0x701), id.heartbeat_cob_id());
    }
}
