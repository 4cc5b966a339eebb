//! NMT state of the drive and the bootstrap into operational
//!
//! The machine follows the heartbeat of the drive. Before the drive is accepted as operational it
//! is always sent to pre-operational and its PDO configuration is uploaded, even if it already
//! reports operational: a drive which restarted on its own may be running stale PDO mappings.

use sled_common::{
    constants::{object_ids, pdo_comm_sub},
    nmt::{NmtCommand, NmtState},
    pdo::{cob_id_value, transmission, PdoMapping},
    NodeId,
};

use super::{Action, Notification, Outbox, StateMachine};
use crate::sdo_request::{Continuation, SdoRequest};

/// States of the [`NetworkMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkState {
    /// The CAN adapter is closed
    Disabled,
    /// The NMT state of the drive is not known
    Unknown,
    /// The drive is stopped
    Stopped,
    /// The drive reported pre-operational on its own, and the configuration is being uploaded
    PreOperational,
    /// Waiting for the drive to confirm pre-operational
    EnterPreOperational,
    /// The drive confirmed pre-operational, and the configuration is being uploaded
    UploadConfig,
    /// Waiting for the drive to confirm operational
    StartRemoteNode,
    /// The drive is configured and operational
    Operational,
}

/// Events of the [`NetworkMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The CAN adapter opened
    IntfOpened,
    /// The CAN adapter closed
    IntfClosed,
    /// Heartbeat reporting stopped
    Stopped,
    /// Heartbeat reporting pre-operational
    PreOperational,
    /// Heartbeat reporting operational
    Operational,
    /// The last configuration write succeeded
    UploadComplete,
    /// A configuration write failed
    UploadFailed,
    /// No heartbeat arrived in time
    WatchdogFailed,
}

impl NetworkEvent {
    /// The event corresponding to a heartbeat
    ///
    /// Bootup is not reported as an event; the drive moves to pre-operational by itself.
    pub fn from_heartbeat(state: NmtState) -> Option<Self> {
        match state {
            NmtState::Stopped => Some(NetworkEvent::Stopped),
            NmtState::PreOperational => Some(NetworkEvent::PreOperational),
            NmtState::Operational => Some(NetworkEvent::Operational),
            NmtState::Bootup => None,
        }
    }
}

/// Tracks the NMT state of the drive and configures it
#[derive(Debug)]
pub struct NetworkMachine {
    state: NetworkState,
    node_id: NodeId,
}

impl NetworkMachine {
    /// Create a machine in the `Disabled` state for the drive at `node_id`
    pub fn new(node_id: NodeId) -> Self {
        Self {
            state: NetworkState::Disabled,
            node_id,
        }
    }

    fn enqueue_config(&self, out: &mut Outbox) {
        let requests = config_upload(self.node_id);
        let count = requests.len();
        log::info!("Uploading PDO configuration ({count} writes)");
        for (i, req) in requests.into_iter().enumerate() {
            let last = i + 1 == count;
            out.push_back(Action::Enqueue(
                req.with_continuation(Continuation::NetworkConfig { last }),
            ));
        }
    }
}

fn map_write(index: u16, sub: u8, mapping: PdoMapping) -> SdoRequest {
    SdoRequest::write(index, sub, mapping.to_object_value(), 4)
}

/// The PDO configuration written to the drive before it is started
///
/// - TPDO1: status word and mode of operation display, on change
/// - TPDO2: actual position and velocity, on change
/// - RPDO2: interpolation data record, every SYNC
/// - TPDO3 and TPDO4: unmapped
pub fn config_upload(node_id: NodeId) -> Vec<SdoRequest> {
    use object_ids::*;
    use pdo_comm_sub::*;

    let tpdo_map = |n: u16| TPDO_MAP_BASE + n - 1;
    let tpdo_comm = |n: u16| TPDO_COMM_BASE + n - 1;

    let mut requests = Vec::new();

    // TPDO1
    requests.extend([
        SdoRequest::write(tpdo_map(1), 0, 0, 1),
        map_write(tpdo_map(1), 1, PdoMapping::new(STATUS_WORD, 0, 16)),
        map_write(tpdo_map(1), 2, PdoMapping::new(MODES_OF_OPERATION_DISPLAY, 0, 8)),
        SdoRequest::write(tpdo_map(1), 0, 2, 1),
        SdoRequest::write(tpdo_comm(1), COB_ID, cob_id_value(node_id.tpdo_cob_id(1), true), 4),
        SdoRequest::write(tpdo_comm(1), TRANSMISSION_TYPE, transmission::EVENT_PROFILE as u32, 1),
        SdoRequest::write(tpdo_comm(1), INHIBIT_TIME, 10, 2),
        SdoRequest::write(tpdo_comm(1), EVENT_TIMER, 10, 2),
    ]);

    // TPDO2
    requests.extend([
        SdoRequest::write(tpdo_map(2), 0, 0, 1),
        map_write(tpdo_map(2), 1, PdoMapping::new(POSITION_ACTUAL, 0, 32)),
        map_write(tpdo_map(2), 2, PdoMapping::new(VELOCITY_ACTUAL, 0, 32)),
        SdoRequest::write(tpdo_map(2), 0, 2, 1),
        SdoRequest::write(tpdo_comm(2), COB_ID, cob_id_value(node_id.tpdo_cob_id(2), true), 4),
        SdoRequest::write(tpdo_comm(2), TRANSMISSION_TYPE, transmission::EVENT_PROFILE as u32, 1),
        SdoRequest::write(tpdo_comm(2), INHIBIT_TIME, 10, 2),
        SdoRequest::write(tpdo_comm(2), EVENT_TIMER, 10, 2),
    ]);

    // RPDO2, for interpolated position mode
    requests.extend([
        SdoRequest::write(RPDO_MAP_BASE + 1, 0, 0, 1),
        map_write(RPDO_MAP_BASE + 1, 1, PdoMapping::new(INTERPOLATION_DATA, 1, 32)),
        SdoRequest::write(RPDO_MAP_BASE + 1, 0, 1, 1),
        SdoRequest::write(RPDO_COMM_BASE + 1, TRANSMISSION_TYPE, transmission::SYNC_EVERY as u32, 1),
    ]);

    // TPDO3 and TPDO4 carry nothing
    for n in 3..=4u8 {
        requests.extend([
            SdoRequest::write(tpdo_map(n as u16), 0, 0, 1),
            SdoRequest::write(
                tpdo_comm(n as u16),
                COB_ID,
                cob_id_value(node_id.tpdo_cob_id(n), true),
                4,
            ),
        ]);
    }

    requests
}

impl StateMachine for NetworkMachine {
    type State = NetworkState;
    type Event = NetworkEvent;
    const NAME: &'static str = "Network";

    fn state(&self) -> NetworkState {
        self.state
    }

    fn set_state(&mut self, state: NetworkState) {
        self.state = state;
    }

    fn next_state(&self, state: NetworkState, event: NetworkEvent) -> NetworkState {
        use NetworkEvent as E;
        use NetworkState as S;

        if state != S::Disabled && event == E::IntfClosed {
            return S::Disabled;
        }

        match (state, event) {
            (S::Disabled, E::IntfOpened) => S::Unknown,

            (S::Unknown, E::Stopped) => S::Stopped,
            (S::Unknown, E::PreOperational) => S::PreOperational,
            // Never trust an operational drive which was not configured by us
            (S::Unknown, E::Operational) => S::EnterPreOperational,

            // Started on our request, but still not configured
            (S::Stopped, E::Operational) => S::EnterPreOperational,
            (S::Stopped, E::PreOperational) => S::PreOperational,
            (S::Stopped, E::WatchdogFailed) => S::Unknown,

            (S::EnterPreOperational, E::PreOperational) => S::UploadConfig,
            (S::EnterPreOperational, E::Stopped | E::WatchdogFailed) => S::Unknown,

            (S::PreOperational | S::UploadConfig, E::UploadComplete) => S::StartRemoteNode,
            (
                S::PreOperational | S::UploadConfig,
                E::UploadFailed | E::Stopped | E::WatchdogFailed,
            ) => S::Unknown,

            (S::StartRemoteNode, E::Operational) => S::Operational,
            // The drive restarted before it was started
            (S::StartRemoteNode, E::Stopped | E::PreOperational | E::WatchdogFailed) => S::Unknown,

            (S::Operational, E::Stopped | E::PreOperational | E::WatchdogFailed) => S::Unknown,

            (state, _) => state,
        }
    }

    fn on_enter(&mut self, state: NetworkState, out: &mut Outbox) {
        match state {
            NetworkState::Disabled => {
                out.push_back(Action::Notify(Notification::SdosDisabled));
            }
            NetworkState::Unknown => {
                out.push_back(Action::Notify(Notification::SdosDisabled));
                out.push_back(Action::SendNmt(NmtCommand::EnterPreOperational));
            }
            NetworkState::Stopped => {
                out.push_back(Action::Notify(Notification::SdosDisabled));
                out.push_back(Action::SendNmt(NmtCommand::Start));
            }
            NetworkState::StartRemoteNode => {
                out.push_back(Action::SendNmt(NmtCommand::Start));
            }
            NetworkState::EnterPreOperational => {
                out.push_back(Action::SendNmt(NmtCommand::EnterPreOperational));
            }
            NetworkState::UploadConfig => {
                out.push_back(Action::Notify(Notification::SdosEnabled));
                self.enqueue_config(out);
            }
            NetworkState::Operational => {
                log::info!("Drive {} is operational", self.node_id);
                out.push_back(Action::Notify(Notification::SdosEnabled));
                out.push_back(Action::Notify(Notification::EnterOperational));
            }
            NetworkState::PreOperational => {
                out.push_back(Action::Notify(Notification::SdosEnabled));
                self.enqueue_config(out);
            }
        }
    }

    fn on_exit(&mut self, state: NetworkState, out: &mut Outbox) {
        if state == NetworkState::Operational {
            log::info!("Drive {} left operational", self.node_id);
            out.push_back(Action::Notify(Notification::LeaveOperational));
        }
    }
}
