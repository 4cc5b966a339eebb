use snafu::{ResultExt, Snafu};
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame, Socket, SocketOptions};

use crate::{
    messages::{CanError, CanId, CanMessage},
    traits::CanDriver,
};

fn socketcan_id_to_sled_id(id: socketcan::CanId) -> CanId {
    match id {
        socketcan::CanId::Standard(id) => CanId::std(id.as_raw()),
        socketcan::CanId::Extended(id) => CanId::extended(id.as_raw()),
    }
}

fn sled_id_to_socketcan_id(id: CanId) -> Option<socketcan::CanId> {
    match id {
        CanId::Extended(id) => socketcan::ExtendedId::new(id).map(Into::into),
        CanId::Std(id) => socketcan::StandardId::new(id).map(Into::into),
    }
}

fn socketcan_frame_to_sled_message(frame: CanFrame) -> Result<CanMessage, CanError> {
    let id = socketcan_id_to_sled_id(frame.can_id());

    match frame {
        CanFrame::Data(frame) => Ok(CanMessage::new(id, frame.data())),
        CanFrame::Remote(_) => Ok(CanMessage::new_rtr(id)),
        CanFrame::Error(frame) => Err(CanError::from_raw(frame.error_bits() as u8)),
    }
}

fn sled_message_to_socket_frame(msg: CanMessage) -> Option<CanFrame> {
    let id = sled_id_to_socketcan_id(msg.id())?;

    if msg.is_rtr() {
        CanFrame::new_remote(id, 0)
    } else {
        CanFrame::new(id, msg.data())
    }
}

/// Errors returned by [`SocketCanDriver`]
#[derive(Debug, Snafu)]
pub enum SocketCanError {
    /// The device could not be opened or configured
    #[snafu(display("Failed to open {device}: {source}"))]
    Open {
        /// Name of the socketcan device
        device: String,
        /// Underlying IO error
        source: std::io::Error,
    },
    /// A read or write on the socket failed
    #[snafu(display("Socket IO error: {source}"))]
    Io {
        /// Underlying IO error
        source: std::io::Error,
    },
    /// The adapter reported an error frame
    #[snafu(display("CAN error: {source}"))]
    Can {
        /// The decoded error condition
        source: CanError,
    },
    /// The operation requires an open socket
    #[snafu(display("Socket is not open"))]
    NotOpen,
    /// The message cannot be represented as a socketcan frame
    #[snafu(display("Invalid frame for ID {id}"))]
    InvalidFrame {
        /// The identifier of the offending message
        id: CanId,
    },
}

/// A [`CanDriver`] backed by a linux socketcan device
///
/// The socket is operated in non-blocking mode.
#[derive(Debug)]
pub struct SocketCanDriver {
    device: String,
    socket: Option<CanSocket>,
}

impl SocketCanDriver {
    /// Create a driver for the named device, e.g. "can0" or "vcan0"
    ///
    /// The device is not opened until [`CanDriver::open`] is called.
    pub fn new<S: Into<String>>(device: S) -> Self {
        Self {
            device: device.into(),
            socket: None,
        }
    }

    /// The name of the device
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl CanDriver for SocketCanDriver {
    type Error = SocketCanError;

    fn open(&mut self) -> Result<(), Self::Error> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = CanSocket::open(&self.device).context(OpenSnafu {
            device: self.device.clone(),
        })?;
        socket.set_nonblocking(true).context(OpenSnafu {
            device: self.device.clone(),
        })?;
        socket
            .set_error_filter_accept_all()
            .context(OpenSnafu {
                device: self.device.clone(),
            })?;
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn send(&mut self, msg: CanMessage) -> Result<(), Self::Error> {
        let socket = self.socket.as_ref().ok_or(SocketCanError::NotOpen)?;
        let frame = sled_message_to_socket_frame(msg).ok_or(SocketCanError::InvalidFrame {
            id: msg.id(),
        })?;
        socket.write_frame(&frame).context(IoSnafu)
    }

    fn try_recv(&mut self) -> Result<Option<CanMessage>, Self::Error> {
        let socket = self.socket.as_ref().ok_or(SocketCanError::NotOpen)?;
        loop {
            match socket.read_frame() {
                Ok(frame) => match socketcan_frame_to_sled_message(frame) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) if e.is_fatal() => return Err(SocketCanError::Can { source: e }),
                    Err(e) => log::warn!("{}: {}", self.device, e),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SocketCanError::Io { source: e }),
            }
        }
    }
}
