//! Common traits

use crate::messages::CanMessage;

/// A synchronous, non-blocking CAN adapter
///
/// The control stack is single threaded and polled: it calls [`CanDriver::try_recv`] whenever the
/// adapter may have frames waiting, and never blocks on the bus.
pub trait CanDriver {
    /// The error type returned by the driver
    type Error: core::fmt::Display + core::fmt::Debug;

    /// Open the adapter
    ///
    /// Opening an adapter which is already open should succeed without side effects.
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Close the adapter. Closing a closed adapter does nothing.
    fn close(&mut self);

    /// True if the adapter is currently open
    fn is_open(&self) -> bool;

    /// Send a message to the bus
    fn send(&mut self, msg: CanMessage) -> Result<(), Self::Error>;

    /// Attempt to read a message, and return `Ok(None)` immediately if none is available
    ///
    /// An error indicates that the adapter can no longer be used, e.g. because the controller
    /// went bus-off.
    fn try_recv(&mut self) -> Result<Option<CanMessage>, Self::Error>;
}
