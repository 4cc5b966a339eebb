//! Definitions for the NMT protocol, from the point of view of an NMT master

use crate::messages::{CanId, CanMessage};
use crate::node_id::NodeId;

/// Possible NMT states reported by a node in its heartbeat
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtState {
    /// Bootup
    ///
    /// A node only reports this once, before moving into PreOperational on its own
    Bootup = 0,
    /// Node has been stopped
    Stopped = 4,
    /// Normal operational state
    Operational = 5,
    /// Node is awaiting command to enter operation
    PreOperational = 127,
}

impl core::fmt::Display for NmtState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NmtState::Bootup => write!(f, "Bootup"),
            NmtState::Stopped => write!(f, "Stopped"),
            NmtState::Operational => write!(f, "Operational"),
            NmtState::PreOperational => write!(f, "PreOperational"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// An error for [`NmtState::try_from()`]
pub struct InvalidNmtStateError(pub u8);

impl TryFrom<u8> for NmtState {
    type Error = InvalidNmtStateError;

    /// Attempt to convert a u8 to an NmtState enum
    ///
    /// Fails with InvalidNmtStateError if value is not a valid state
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use NmtState::*;
        match value {
            x if x == Bootup as u8 => Ok(Bootup),
            x if x == Stopped as u8 => Ok(Stopped),
            x if x == Operational as u8 => Ok(Operational),
            x if x == PreOperational as u8 => Ok(PreOperational),
            _ => Err(InvalidNmtStateError(value)),
        }
    }
}

/// NMT node control commands sent by the master
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NmtCommand {
    /// Start remote node (enter Operational)
    Start = 0x01,
    /// Stop remote node
    Stop = 0x02,
    /// Enter PreOperational
    EnterPreOperational = 0x80,
    /// Reset application
    ResetApp = 0x81,
    /// Reset communication
    ResetComm = 0x82,
}

impl NmtCommand {
    /// Build the NMT frame addressing `node`
    pub fn to_can_message(self, node: NodeId) -> CanMessage {
        CanMessage::new(CanId::std(0), &[self as u8, node.raw()])
    }
}

/// Decode the NMT state carried in a heartbeat or node guard response
///
/// The toggle bit (bit 7) is ignored. Returns None for an empty frame or an unrecognized state.
pub fn heartbeat_state(data: &[u8]) -> Option<NmtState> {
    let byte = *data.first()?;
    NmtState::try_from(byte & 0x7F).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_heartbeat_ignores_toggle() {
        assert_eq!(Some(NmtState::Operational), heartbeat_state(&[0x85]));
        assert_eq!(Some(NmtState::PreOperational), heartbeat_state(&[0x7F]));
        assert_eq!(None, heartbeat_state(&[0x33]));
        assert_eq!(None, heartbeat_state(&[]));
    }

    #[test]
    fn test_nmt_frame() {
        let msg = NmtCommand::EnterPreOperational.to_can_message(NodeId::new(1).unwrap());
        assert_eq!(CanId::std(0), msg.id());
        assert_eq!(&[0x80, 0x01], msg.data());
    }
}
