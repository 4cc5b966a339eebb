//! Control stack for a CANopen driven linear actuator (the "sled")
//!
//! The stack is a set of layered state machines owned by a single coordinator, [`Sled`]:
//!
//! - The [interface machine](machines::interface) opens and closes the CAN adapter
//! - The [network machine](machines::network) brings the drive through NMT into operational,
//!   uploading the PDO configuration on the way
//! - The [SDO queue](machines::sdo_queue) serializes register transfers so that only one is ever
//!   in flight
//! - The [drive machine](machines::drive) walks the DS402 power state ladder up to operation
//!   enabled
//! - The [motion machine](machines::motion) homes the drive and manages the profile position set
//!   point handshake
//!
//! On top of these the [`ProfileStore`](profile::ProfileStore) keeps a table of motion profiles and
//! uploads only the registers which changed since they were last written.
//!
//! # Operation
//!
//! The core never blocks and never reads a clock. The application calls
//! [`Sled::process_frames`] when the CAN adapter may have frames waiting, and
//! [`Sled::check_watchdog`] periodically. Both take the current monotonic time in microseconds.
//! Every event generated while handling a call is processed before the call returns.
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod machines;
pub mod profile;
pub mod sdo_request;
mod sled;
pub mod transport;
pub mod watchdog;

pub use sled_common as common;

pub use config::SledConfig;
pub use error::SledError;
pub use profile::{BlendType, PositionType, ProfileId};
pub use sled::{PositionSample, Sled};

#[cfg(feature = "socketcan")]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
#[cfg(target_os = "linux")]
pub use sled_common::SocketCanDriver;
