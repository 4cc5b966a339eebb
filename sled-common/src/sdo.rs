//! Expedited SDO frame codec and abort codes
//!
//! The sled only ever transfers values of up to four bytes, so only expedited transfers are
//! implemented.

use int_enum::IntEnum;
use snafu::Snafu;

/// Command specifier of an expedited upload (read) request
pub const CCS_INITIATE_UPLOAD: u8 = 0x40;
/// Command specifier of a download (write) confirmation
pub const SCS_DOWNLOAD_CONFIRM: u8 = 0x60;
/// Command specifier of an abort transfer message
pub const CS_ABORT: u8 = 0x80;

/// SDO abort codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[repr(u32)]
pub enum AbortCode {
    /// Toggle bit not alternated
    ToggleNotAlternated = 0x0503_0000,
    /// SDO protocol timed out
    SdoTimeout = 0x0504_0000,
    /// Client/server command specifier not valid or unknown
    InvalidCommandSpecifier = 0x0504_0001,
    /// Out of memory
    OutOfMemory = 0x0504_0005,
    /// Unsupported access to an object
    UnsupportedAccess = 0x0601_0000,
    /// Attempt to read a write only object
    WriteOnly = 0x0601_0001,
    /// Attempt to write a read only object
    ReadOnly = 0x0601_0002,
    /// Object does not exist in the dictionary
    NoSuchObject = 0x0602_0000,
    /// Object cannot be mapped to a PDO
    UnmappableObject = 0x0604_0041,
    /// The number and length of objects would exceed the PDO length
    PdoTooLong = 0x0604_0042,
    /// General parameter incompatibility
    IncompatibleParameter = 0x0604_0043,
    /// General internal incompatibility in device
    InternalIncompatibility = 0x0604_0047,
    /// Access failed due to hardware error
    HardwareError = 0x0606_0000,
    /// Data type does not match, length of service parameter does not match
    DataTypeMismatch = 0x0607_0010,
    /// Data type does not match, length of service parameter too high
    DataTypeMismatchLengthHigh = 0x0607_0012,
    /// Data type does not match, length of service parameter too low
    DataTypeMismatchLengthLow = 0x0607_0013,
    /// Sub-index does not exist
    NoSuchSubIndex = 0x0609_0011,
    /// Invalid value for parameter (download only)
    InvalidValue = 0x0609_0030,
    /// Value of parameter written too high
    ValueTooHigh = 0x0609_0031,
    /// Value of parameter written too low
    ValueTooLow = 0x0609_0032,
    /// General error
    GeneralError = 0x0800_0000,
    /// Data cannot be transferred or stored
    CantStore = 0x0800_0020,
    /// Data cannot be transferred or stored because of local control
    CantStoreLocalControl = 0x0800_0021,
    /// Data cannot be transferred or stored because of the present device state
    CantStoreDeviceState = 0x0800_0022,
}

impl AbortCode {
    /// A human readable reason for the abort
    pub fn description(&self) -> &'static str {
        use AbortCode::*;
        match self {
            ToggleNotAlternated => "Toggle bit not alternated.",
            SdoTimeout => "SDO protocol timed out.",
            InvalidCommandSpecifier => "Command specifier not valid or unknown.",
            OutOfMemory => "Out of memory.",
            UnsupportedAccess => "Unsupported access to this object.",
            WriteOnly => "Attempted read access to a write-only object.",
            ReadOnly => "Attempted write access to a read-only object.",
            NoSuchObject => "Object does not exist in the object dictionary.",
            UnmappableObject => "Object cannot be mapped to a PDO.",
            PdoTooLong => "Number and length of mapped objects exceed the PDO length.",
            IncompatibleParameter => "General parameter incompatibility.",
            InternalIncompatibility => "General internal incompatibility in the device.",
            HardwareError => "Access failed due to a hardware error.",
            DataTypeMismatch => "Data type or length of service parameter does not match.",
            DataTypeMismatchLengthHigh => "Length of service parameter too high.",
            DataTypeMismatchLengthLow => "Length of service parameter too low.",
            NoSuchSubIndex => "Sub-index does not exist.",
            InvalidValue => "Value out of range for the parameter.",
            ValueTooHigh => "Parameter value too high.",
            ValueTooLow => "Parameter value too low.",
            GeneralError => "General error.",
            CantStore => "Data cannot be transferred or stored.",
            CantStoreLocalControl => "Data cannot be transferred or stored because of local control.",
            CantStoreDeviceState => {
                "Data cannot be transferred or stored because of the device state."
            }
        }
    }
}

/// A wrapper around the AbortCode enum to allow for unknown values
///
/// Devices may send vendor specific codes, and this allows those to be captured and exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAbortCode {
    /// A recognized abort code
    Valid(AbortCode),
    /// An unrecognized abort code
    Unknown(u32),
}

impl RawAbortCode {
    /// The numeric code
    pub fn raw(&self) -> u32 {
        match self {
            RawAbortCode::Valid(code) => (*code).into(),
            RawAbortCode::Unknown(code) => *code,
        }
    }

    /// A human readable reason for the abort
    pub fn description(&self) -> &'static str {
        match self {
            RawAbortCode::Valid(code) => code.description(),
            RawAbortCode::Unknown(_) => "Unknown abort code.",
        }
    }
}

impl core::fmt::Display for RawAbortCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:08X} ({})", self.raw(), self.description())
    }
}

impl From<u32> for RawAbortCode {
    fn from(value: u32) -> Self {
        match AbortCode::try_from(value) {
            Ok(code) => Self::Valid(code),
            Err(_) => Self::Unknown(value),
        }
    }
}

impl From<AbortCode> for RawAbortCode {
    fn from(value: AbortCode) -> Self {
        Self::Valid(value)
    }
}

/// Build an expedited download (write) request
///
/// `size` is the number of significant bytes of `value` and must be 1 to 4.
pub fn expedited_download(index: u16, sub: u8, value: u32, size: u8) -> [u8; 8] {
    let size = size.clamp(1, 4);
    let mut data = [0; 8];
    // n = 4 - size unused bytes, e = 1, s = 1
    data[0] = 0x2F - ((size - 1) << 2);
    data[1..3].copy_from_slice(&index.to_le_bytes());
    data[3] = sub;
    data[4..8].copy_from_slice(&value.to_le_bytes());
    data
}

/// Build an initiate upload (read) request
pub fn initiate_upload(index: u16, sub: u8) -> [u8; 8] {
    let mut data = [0; 8];
    data[0] = CCS_INITIATE_UPLOAD;
    data[1..3].copy_from_slice(&index.to_le_bytes());
    data[3] = sub;
    data
}

/// Build an abort transfer message
pub fn abort(index: u16, sub: u8, code: AbortCode) -> [u8; 8] {
    let mut data = [0; 8];
    data[0] = CS_ABORT;
    data[1..3].copy_from_slice(&index.to_le_bytes());
    data[3] = sub;
    data[4..8].copy_from_slice(&u32::from(code).to_le_bytes());
    data
}

/// A response from the drive's SDO server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdoResponse {
    /// A download (write) was accepted
    ConfirmDownload {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
    },
    /// An expedited upload (read) completed
    ConfirmUpload {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// The value read, zero extended
        value: u32,
        /// Number of valid bytes in value
        size: u8,
    },
    /// The server aborted the transfer
    Abort {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// The reason for the abort
        abort_code: RawAbortCode,
    },
}

impl SdoResponse {
    /// The object index the response refers to
    pub fn index(&self) -> u16 {
        match self {
            SdoResponse::ConfirmDownload { index, .. }
            | SdoResponse::ConfirmUpload { index, .. }
            | SdoResponse::Abort { index, .. } => *index,
        }
    }

    /// The object sub index the response refers to
    pub fn sub(&self) -> u8 {
        match self {
            SdoResponse::ConfirmDownload { sub, .. }
            | SdoResponse::ConfirmUpload { sub, .. }
            | SdoResponse::Abort { sub, .. } => *sub,
        }
    }

    /// Serialize the response into frame data
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut data = [0; 8];
        data[1..3].copy_from_slice(&self.index().to_le_bytes());
        data[3] = self.sub();
        match self {
            SdoResponse::ConfirmDownload { .. } => data[0] = SCS_DOWNLOAD_CONFIRM,
            SdoResponse::ConfirmUpload { value, size, .. } => {
                let size = (*size).clamp(1, 4);
                data[0] = 0x4F - ((size - 1) << 2);
                data[4..8].copy_from_slice(&value.to_le_bytes());
            }
            SdoResponse::Abort { abort_code, .. } => {
                data[0] = CS_ABORT;
                data[4..8].copy_from_slice(&abort_code.raw().to_le_bytes());
            }
        }
        data
    }
}

/// Error returned when a frame cannot be interpreted as an expedited SDO response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum SdoFrameError {
    /// SDO frames must always carry 8 bytes
    #[snafu(display("SDO frame has {len} bytes, expected 8"))]
    WrongLength {
        /// The received length
        len: usize,
    },
    /// The command specifier is not one the client handles
    #[snafu(display("Unsupported SDO command specifier 0x{cs:02X}"))]
    UnsupportedCommand {
        /// The received command byte
        cs: u8,
    },
}

impl TryFrom<&[u8]> for SdoResponse {
    type Error = SdoFrameError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != 8 {
            return WrongLengthSnafu { len: data.len() }.fail();
        }
        let index = u16::from_le_bytes([data[1], data[2]]);
        let sub = data[3];
        let raw = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        match data[0] {
            SCS_DOWNLOAD_CONFIRM => Ok(SdoResponse::ConfirmDownload { index, sub }),
            0x43 | 0x47 | 0x4B | 0x4F => {
                let size = 4 - ((data[0] >> 2) & 0x3);
                let value = match size {
                    4 => raw,
                    _ => raw & ((1u32 << (8 * size as u32)) - 1),
                };
                Ok(SdoResponse::ConfirmUpload {
                    index,
                    sub,
                    value,
                    size,
                })
            }
            CS_ABORT => Ok(SdoResponse::Abort {
                index,
                sub,
                abort_code: raw.into(),
            }),
            cs => UnsupportedCommandSnafu { cs }.fail(),
        }
    }
}
