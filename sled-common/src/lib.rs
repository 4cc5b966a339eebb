//! Common CANopen definitions shared by the sled control crates.
//!
//! This crate holds the pieces which are pure protocol: CAN frame types, NMT states and commands,
//! the expedited SDO frame codec and abort codes, PDO mapping encoding, and the object dictionary
//! addresses used by the sled drive. It also defines the [`CanDriver`](traits::CanDriver) trait
//! through which the control stack talks to a CAN adapter.
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod constants;
pub mod messages;
pub mod nmt;
pub mod node_id;
pub mod pdo;
pub mod sdo;
pub mod traits;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
mod socketcan;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(feature = "socketcan")))]
pub use socketcan::{SocketCanDriver, SocketCanError};

pub use messages::{CanError, CanId, CanMessage};
pub use node_id::NodeId;
