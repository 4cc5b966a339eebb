//! Errors returned by the public motion API

use snafu::Snafu;

use crate::machines::motion::MotionState;
use crate::sled::PositionSample;

/// Error returned by the [`Sled`](crate::Sled) API
///
/// All of these are synchronous refusals: when one is returned, no state was changed and nothing
/// was sent on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Snafu)]
pub enum SledError {
    /// The profile id is out of range
    #[snafu(display("Profile {id} does not exist"))]
    InvalidProfile {
        /// The requested profile
        id: usize,
    },
    /// The profile exists but has not been created
    #[snafu(display("Profile {id} is not in use"))]
    ProfileNotInUse {
        /// The requested profile
        id: usize,
    },
    /// The profile given as next profile is not usable
    #[snafu(display("Profile {id} cannot be used as next profile"))]
    InvalidNextProfile {
        /// The requested next profile
        id: usize,
    },
    /// A position, duration or delay is not usable
    #[snafu(display("Invalid {name}: {value}"))]
    InvalidValue {
        /// The rejected argument
        name: &'static str,
        /// Its value
        value: f64,
    },
    /// All profile slots are in use
    #[snafu(display("No free profile slots"))]
    ProfilesExhausted,
    /// A motion command was issued while the drive is busy or not ready
    #[snafu(display("Unable to execute, motion machine is {state:?} instead of idle"))]
    MotionNotIdle {
        /// The motion machine state at the time of the request
        state: MotionState,
    },
    /// Register transfers are currently not possible
    #[snafu(display("SDO transfers are disabled"))]
    SdoDisabled,
    /// The network is not operational, so no live position is known
    #[snafu(display("Position unavailable, network is not operational"))]
    PositionUnavailable {
        /// A placeholder sample, with NaN position and the time of the request
        stale: PositionSample,
    },
}
