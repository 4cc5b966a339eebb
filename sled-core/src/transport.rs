//! The CAN transport towards the drive
//!
//! [`Interface`] wraps a [`CanDriver`], builds the NMT and SDO frames addressed to the drive and
//! classifies incoming frames. It tracks the one SDO transfer which may be outstanding, but does
//! not queue: serializing transfers is the job of the
//! [SDO queue](crate::machines::sdo_queue).

use sled_common::{
    messages::{CanId, CanMessage},
    nmt::{heartbeat_state, NmtCommand, NmtState},
    sdo::{self, SdoResponse},
    traits::CanDriver,
    NodeId,
};
use snafu::Snafu;

/// CANopen function codes of the frames the transport listens to
mod function_code {
    pub const EMCY: u8 = 0x01;
    pub const TPDO1: u8 = 0x03;
    pub const TPDO2: u8 = 0x05;
    pub const TPDO3: u8 = 0x07;
    pub const TPDO4: u8 = 0x09;
    pub const SDO_TX: u8 = 0x0B;
    pub const HEARTBEAT: u8 = 0x0E;
}

/// Error returned by [`Interface`] operations
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum TransportError {
    /// The adapter is not open
    #[snafu(display("CAN interface is not open"))]
    NotOpen,
    /// An SDO transfer is already outstanding
    #[snafu(display("SDO transfer to {index:04X}:{sub:02X} is still outstanding"))]
    Busy {
        /// Index of the outstanding transfer
        index: u16,
        /// Sub index of the outstanding transfer
        sub: u8,
    },
    /// The driver reported an error
    #[snafu(display("CAN driver error: {message}"))]
    Driver {
        /// The driver's description of the error
        message: String,
    },
}

/// A classified frame received from the drive
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Dispatch {
    /// An emergency message. These are logged, not acted upon.
    Emergency([u8; 8]),
    /// Process data from one of the four transmit PDOs
    Tpdo {
        /// The TPDO number, 1 to 4
        channel: u8,
        /// The PDO payload, zero padded
        data: [u8; 8],
    },
    /// A heartbeat. `state` is None when the reported state is not recognized.
    Heartbeat {
        /// The reported NMT state
        state: Option<NmtState>,
    },
    /// The response to the outstanding SDO transfer
    Sdo(SdoResponse),
}

#[derive(Clone, Copy, Debug)]
struct PendingSdo {
    index: u16,
    sub: u8,
}

/// The CAN transport towards a single drive
#[derive(Debug)]
pub struct Interface<D: CanDriver> {
    driver: D,
    node_id: NodeId,
    pending: Option<PendingSdo>,
}

impl<D: CanDriver> Interface<D> {
    /// Create a transport talking to `node_id` over `driver`
    ///
    /// The driver is not opened.
    pub fn new(driver: D, node_id: NodeId) -> Self {
        Self {
            driver,
            node_id,
            pending: None,
        }
    }

    /// The node ID of the drive
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Access the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutably access the driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Open the adapter
    pub fn open(&mut self) -> Result<(), TransportError> {
        self.driver.open().map_err(|e| TransportError::Driver {
            message: e.to_string(),
        })?;
        log::info!("CAN interface opened");
        Ok(())
    }

    /// Close the adapter, forgetting any outstanding SDO transfer
    pub fn close(&mut self) {
        if self.driver.is_open() {
            log::info!("CAN interface closed");
        }
        self.driver.close();
        self.pending = None;
    }

    /// True if the adapter is open
    pub fn is_open(&self) -> bool {
        self.driver.is_open()
    }

    /// True if an SDO transfer is awaiting its response
    pub fn sdo_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget the outstanding SDO transfer, if any
    ///
    /// A response arriving for it afterwards is discarded.
    pub fn abandon_sdo(&mut self) {
        if let Some(pending) = self.pending.take() {
            log::debug!(
                "Abandoning SDO transfer to {:04X}:{:02X}",
                pending.index,
                pending.sub
            );
        }
    }

    fn write(&mut self, msg: CanMessage) -> Result<(), TransportError> {
        if !self.driver.is_open() {
            return Err(TransportError::NotOpen);
        }
        log::trace!("TX {} {:02X?}", msg.id(), msg.data());
        self.driver.send(msg).map_err(|e| TransportError::Driver {
            message: e.to_string(),
        })
    }

    /// Send an NMT node control command to the drive
    pub fn send_nmt(&mut self, command: NmtCommand) -> Result<(), TransportError> {
        log::debug!("NMT {:?} -> node {}", command, self.node_id);
        self.write(command.to_can_message(self.node_id))
    }

    fn start_sdo(&mut self, index: u16, sub: u8, data: [u8; 8]) -> Result<(), TransportError> {
        if let Some(pending) = self.pending {
            return Err(TransportError::Busy {
                index: pending.index,
                sub: pending.sub,
            });
        }
        self.write(CanMessage::new(self.node_id.sdo_rx_cob_id(), &data))?;
        self.pending = Some(PendingSdo { index, sub });
        Ok(())
    }

    /// Send an expedited write request
    pub fn send_write(
        &mut self,
        index: u16,
        sub: u8,
        value: u32,
        size: u8,
    ) -> Result<(), TransportError> {
        self.start_sdo(index, sub, sdo::expedited_download(index, sub, value, size))
    }

    /// Send an expedited read request
    pub fn send_read(&mut self, index: u16, sub: u8) -> Result<(), TransportError> {
        self.start_sdo(index, sub, sdo::initiate_upload(index, sub))
    }

    /// Read one frame from the adapter without blocking
    ///
    /// Returns `Ok(None)` when no frame is waiting. A driver error closes the adapter and is
    /// returned; the session is over.
    pub fn poll(&mut self) -> Result<Option<CanMessage>, TransportError> {
        if !self.driver.is_open() {
            return Err(TransportError::NotOpen);
        }
        match self.driver.try_recv() {
            Ok(msg) => Ok(msg),
            Err(e) => {
                log::error!("Error reading from CAN interface: {e}");
                self.close();
                Err(TransportError::Driver {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Classify a received frame
    pub fn dispatch(&mut self, msg: &CanMessage) -> Option<Dispatch> {
        if msg.is_rtr() {
            return None;
        }
        if msg.id().is_extended() {
            return None;
        }
        let id = msg.id();
        log::trace!("RX {} {:02X?}", id, msg.data());
        if id.node_bits() != Some(self.node_id.raw()) {
            return None;
        }

        match id.function_code()? {
            function_code::EMCY => {
                log::warn!("Emergency message from drive: {:02X?}", msg.data());
                Some(Dispatch::Emergency(msg.padded_data()))
            }
            fc @ (function_code::TPDO1
            | function_code::TPDO2
            | function_code::TPDO3
            | function_code::TPDO4) => Some(Dispatch::Tpdo {
                channel: (fc - 1) / 2,
                data: msg.padded_data(),
            }),
            function_code::HEARTBEAT => Some(Dispatch::Heartbeat {
                state: heartbeat_state(msg.data()),
            }),
            function_code::SDO_TX => self.dispatch_sdo(msg),
            _ => None,
        }
    }

    fn dispatch_sdo(&mut self, msg: &CanMessage) -> Option<Dispatch> {
        let response = match SdoResponse::try_from(msg.data()) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Ignoring SDO response: {e}");
                return None;
            }
        };
        match self.pending {
            Some(pending) if pending.index == response.index() && pending.sub == response.sub() => {
                self.pending = None;
                Some(Dispatch::Sdo(response))
            }
            Some(pending) => {
                log::warn!(
                    "SDO response for {:04X}:{:02X} while waiting for {:04X}:{:02X}",
                    response.index(),
                    response.sub(),
                    pending.index,
                    pending.sub
                );
                None
            }
            None => {
                log::warn!(
                    "Unsolicited SDO response for {:04X}:{:02X}",
                    response.index(),
                    response.sub()
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use sled_common::sdo::{AbortCode, RawAbortCode};

    use super::*;

    #[derive(Debug, Default)]
    struct LoopDriver {
        open: bool,
        fail_open: bool,
        sent: Vec<CanMessage>,
        rx: VecDeque<Result<CanMessage, &'static str>>,
    }

    impl CanDriver for LoopDriver {
        type Error = &'static str;

        fn open(&mut self) -> Result<(), Self::Error> {
            if self.fail_open {
                return Err("no such device");
            }
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn send(&mut self, msg: CanMessage) -> Result<(), Self::Error> {
            self.sent.push(msg);
            Ok(())
        }

        fn try_recv(&mut self) -> Result<Option<CanMessage>, Self::Error> {
            self.rx.pop_front().transpose()
        }
    }

    fn open_interface() -> Interface<LoopDriver> {
        let mut intf = Interface::new(LoopDriver::default(), NodeId::new(1).unwrap());
        intf.open().unwrap();
        intf
    }

    #[test]
    fn test_send_requires_open() {
        let mut intf = Interface::new(LoopDriver::default(), NodeId::new(1).unwrap());
        assert_eq!(
            Err(TransportError::NotOpen),
            intf.send_nmt(NmtCommand::Start)
        );

        intf.driver_mut().fail_open = true;
        assert!(matches!(intf.open(), Err(TransportError::Driver { .. })));
    }

    #[test]
    fn test_single_outstanding_sdo() {
        let mut intf = open_interface();
        intf.send_write(0x6040, 0, 0x06, 2).unwrap();
        assert_eq!(
            Err(TransportError::Busy {
                index: 0x6040,
                sub: 0
            }),
            intf.send_write(0x6060, 0, 1, 1)
        );

        let sent = intf.driver().sent[0];
        assert_eq!(CanId::std(0x601), sent.id());
        assert_eq!(&[0x2B, 0x40, 0x60, 0x00, 0x06, 0x00, 0x00, 0x00], sent.data());

        // A response to something else is not ours
        let other = CanMessage::new(CanId::std(0x581), &[0x60, 0x60, 0x60, 0, 0, 0, 0, 0]);
        assert_eq!(None, intf.dispatch(&other));
        assert!(intf.sdo_pending());

        let ack = CanMessage::new(CanId::std(0x581), &[0x60, 0x40, 0x60, 0, 0, 0, 0, 0]);
        assert_eq!(
            Some(Dispatch::Sdo(SdoResponse::ConfirmDownload {
                index: 0x6040,
                sub: 0
            })),
            intf.dispatch(&ack)
        );
        assert!(!intf.sdo_pending());
    }

    #[test]
    fn test_classification() {
        let mut intf = open_interface();

        let hb = CanMessage::new(CanId::std(0x701), &[0x7F]);
        assert_eq!(
            Some(Dispatch::Heartbeat {
                state: Some(NmtState::PreOperational)
            }),
            intf.dispatch(&hb)
        );

        let tpdo2 = CanMessage::new(CanId::std(0x281), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            Some(Dispatch::Tpdo {
                channel: 2,
                data: [1, 2, 3, 4, 5, 6, 7, 8]
            }),
            intf.dispatch(&tpdo2)
        );

        let tpdo4 = CanMessage::new(CanId::std(0x481), &[0xAA]);
        assert!(matches!(
            intf.dispatch(&tpdo4),
            Some(Dispatch::Tpdo { channel: 4, .. })
        ));

        let emcy = CanMessage::new(CanId::std(0x081), &[0x10, 0x23]);
        assert!(matches!(intf.dispatch(&emcy), Some(Dispatch::Emergency(_))));

        // Other nodes are ignored
        let foreign = CanMessage::new(CanId::std(0x702), &[0x05]);
        assert_eq!(None, intf.dispatch(&foreign));
    }

    #[test]
    fn test_abort_response() {
        let mut intf = open_interface();
        intf.send_write(0x35BE, 1, 100, 4).unwrap();
        let abort = CanMessage::new(
            CanId::std(0x581),
            &sdo::abort(0x35BE, 1, AbortCode::ValueTooHigh),
        );
        assert_eq!(
            Some(Dispatch::Sdo(SdoResponse::Abort {
                index: 0x35BE,
                sub: 1,
                abort_code: RawAbortCode::Valid(AbortCode::ValueTooHigh)
            })),
            intf.dispatch(&abort)
        );
    }

    #[test]
    fn test_read_error_closes() {
        let mut intf = open_interface();
        intf.send_read(0x6041, 0).unwrap();
        intf.driver_mut().rx.push_back(Err("bus off"));
        assert!(matches!(intf.poll(), Err(TransportError::Driver { .. })));
        assert!(!intf.is_open());
        assert!(!intf.sdo_pending());
        assert_eq!(Err(TransportError::NotOpen), intf.poll());
    }
}
