//! Register transfer requests and their completion routing
//!
//! A request is created by whoever needs a register written or read, queued in the
//! [SDO queue](crate::machines::sdo_queue), and completed exactly once: with the device's
//! response, with the device's abort, or with a synthetic failure when the queue is drained.

use sled_common::sdo::RawAbortCode;

use crate::profile::ProfileField;

/// The direction and payload of a transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdoKind {
    /// Expedited download of `size` (1, 2 or 4) bytes
    Write {
        /// Value to write, little endian on the wire
        value: u32,
        /// Number of significant bytes of `value`
        size: u8,
    },
    /// Expedited upload
    Read,
}

/// Who is told about the outcome of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    /// Fire and forget
    Ignore,
    /// A write of the network configuration upload
    NetworkConfig {
        /// True for the final write, whose success completes the upload
        last: bool,
    },
    /// A tracked field of a motion profile
    ProfileField {
        /// Slot of the profile in the store
        slot: usize,
        /// The field being written
        field: ProfileField,
    },
}

/// Reason a request did not succeed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdoFailure {
    /// The device aborted the transfer
    Aborted(RawAbortCode),
    /// The request was dropped before a response arrived, e.g. because the network went down
    Dropped,
}

impl core::fmt::Display for SdoFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SdoFailure::Aborted(code) => write!(f, "aborted with {code}"),
            SdoFailure::Dropped => write!(f, "dropped from queue"),
        }
    }
}

/// Result of a completed request. On success, holds the value read (0 for writes).
pub type SdoOutcome = Result<u32, SdoFailure>;

/// A single register transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdoRequest {
    /// Object index
    pub index: u16,
    /// Object sub index
    pub sub: u8,
    /// Read or write
    pub kind: SdoKind,
    /// Where the outcome is routed
    pub continuation: Continuation,
}

impl SdoRequest {
    /// A write whose outcome is not tracked
    pub const fn write(index: u16, sub: u8, value: u32, size: u8) -> Self {
        Self {
            index,
            sub,
            kind: SdoKind::Write { value, size },
            continuation: Continuation::Ignore,
        }
    }

    /// A read whose outcome is not tracked
    pub const fn read(index: u16, sub: u8) -> Self {
        Self {
            index,
            sub,
            kind: SdoKind::Read,
            continuation: Continuation::Ignore,
        }
    }

    /// Route the outcome of this request to `continuation`
    pub const fn with_continuation(mut self, continuation: Continuation) -> Self {
        self.continuation = continuation;
        self
    }

    /// True if this is a write
    pub fn is_write(&self) -> bool {
        matches!(self.kind, SdoKind::Write { .. })
    }
}

impl core::fmt::Display for SdoRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            SdoKind::Write { value, size } => write!(
                f,
                "write {:04X}:{:02X} = 0x{:X} ({} bytes)",
                self.index, self.sub, value, size
            ),
            SdoKind::Read => write!(f, "read {:04X}:{:02X}", self.index, self.sub),
        }
    }
}
