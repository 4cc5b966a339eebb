pub mod sim_bus;
pub mod sim_drive;
pub mod utils;

pub mod prelude {
    pub use super::sim_bus::{SimBus, SimBusReceiver, SimCan};
    pub use super::sim_drive::SimDrive;
    pub use super::utils::{BusLogger, Harness};
    pub use sled_core::{
        common::{
            nmt::NmtState,
            sdo::{AbortCode, RawAbortCode},
            NodeId,
        },
        machines::{
            drive::DriveState, interface::InterfaceState, motion::MotionState,
            network::NetworkState, sdo_queue::SdoQueueState,
        },
        profile::{FieldState, ProfileField},
        BlendType, PositionSample, PositionType, Sled, SledConfig, SledError,
    };
}
