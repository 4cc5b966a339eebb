//! Operating mode and set point handshake
//!
//! Once the drive is enabled, the machine homes it (unless it reports being homed already) and
//! switches it to profile position mode. In `Idle` a motion task may be started; the machine then
//! follows the set point acknowledge bit of the status word through the handshake.

use sled_common::constants::{
    object_ids::{CONTROL_WORD, MODES_OF_OPERATION},
    values,
};

use super::{Action, Outbox, StateMachine};
use crate::sdo_request::SdoRequest;

/// Control word which starts homing or a new set point
const CW_START: u16 =
    values::CW_ENABLE_OPERATION | values::CW_NEW_SETPOINT | values::CW_CHANGE_IMMEDIATELY;
/// Control word which clears the new set point bit again
const CW_RELEASE: u16 = values::CW_ENABLE_OPERATION | values::CW_CHANGE_IMMEDIATELY;

/// States of the [`MotionMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionState {
    /// The drive is not enabled
    Disabled,
    /// Homing mode requested
    SwitchModeHoming,
    /// In homing mode, homing status not yet reported
    HomingUnknown,
    /// Homing in progress
    Homing,
    /// Profile position mode requested
    SwitchModePP,
    /// Ready to start a motion task
    Idle,
    /// Motion task started, waiting for the drive to acknowledge
    SetpointPending,
    /// Motion task acknowledged, waiting for the acknowledge to clear
    SetpointAcked,
}

/// Events of the [`MotionMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionEvent {
    /// The drive reached operation enabled
    DsOperational,
    /// The drive left operation enabled
    DsInoperational,
    /// Mode display reports homing
    ModeHoming,
    /// Mode display reports profile position
    ModePP,
    /// In homing mode, the homing attained bit is set
    Homed,
    /// In homing mode, the homing attained bit is clear
    NotHomed,
    /// A motion task was started
    SetpointSet,
    /// In profile position mode, the set point acknowledge bit is set
    SetpointAck,
    /// In profile position mode, the set point acknowledge bit is clear
    SetpointNack,
    /// The target reached bit is set
    TargetReached,
}

impl MotionEvent {
    /// Decode the motion events carried by a status word and mode display
    pub fn from_status(status: u16, mode: i8) -> Vec<MotionEvent> {
        let mut events = Vec::with_capacity(3);
        if status & values::SW_TARGET_REACHED != 0 {
            events.push(MotionEvent::TargetReached);
        }
        let ack = status & values::SW_SETPOINT_ACK != 0;
        match mode {
            values::MODE_PROFILE_POSITION => {
                events.push(MotionEvent::ModePP);
                events.push(if ack {
                    MotionEvent::SetpointAck
                } else {
                    MotionEvent::SetpointNack
                });
            }
            values::MODE_HOMING => {
                events.push(MotionEvent::ModeHoming);
                events.push(if ack {
                    MotionEvent::Homed
                } else {
                    MotionEvent::NotHomed
                });
            }
            _ => (),
        }
        events
    }
}

/// Tracks the operating mode and the set point handshake
#[derive(Debug)]
pub struct MotionMachine {
    state: MotionState,
}

impl MotionMachine {
    /// Create a machine in the `Disabled` state
    pub fn new() -> Self {
        Self {
            state: MotionState::Disabled,
        }
    }
}

impl Default for MotionMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn mode_switch(mode: i8) -> Action {
    Action::Enqueue(SdoRequest::write(MODES_OF_OPERATION, 0, mode as u8 as u32, 1))
}

fn control_word(value: u16) -> Action {
    Action::Enqueue(SdoRequest::write(CONTROL_WORD, 0, value as u32, 2))
}

impl StateMachine for MotionMachine {
    type State = MotionState;
    type Event = MotionEvent;
    const NAME: &'static str = "Motion";

    fn state(&self) -> MotionState {
        self.state
    }

    fn set_state(&mut self, state: MotionState) {
        self.state = state;
    }

    fn next_state(&self, state: MotionState, event: MotionEvent) -> MotionState {
        use MotionEvent as E;
        use MotionState as S;

        if state != S::Disabled && event == E::DsInoperational {
            return S::Disabled;
        }

        match (state, event) {
            (S::Disabled, E::DsOperational) => S::SwitchModeHoming,
            (S::SwitchModeHoming, E::ModeHoming) => S::HomingUnknown,
            (S::HomingUnknown, E::NotHomed) => S::Homing,
            (S::HomingUnknown, E::Homed) => S::SwitchModePP,
            (S::Homing, E::Homed) => S::SwitchModePP,
            (S::SwitchModePP, E::ModePP) => S::Idle,
            (S::Idle, E::SetpointSet) => S::SetpointPending,
            (S::SetpointPending, E::SetpointAck) => S::SetpointAcked,
            (S::SetpointAcked, E::SetpointNack) => S::Idle,
            (state, _) => state,
        }
    }

    fn on_enter(&mut self, state: MotionState, out: &mut Outbox) {
        match state {
            MotionState::SwitchModeHoming => out.push_back(mode_switch(values::MODE_HOMING)),
            MotionState::SwitchModePP => {
                out.push_back(mode_switch(values::MODE_PROFILE_POSITION))
            }
            MotionState::Homing => {
                log::info!("Homing the drive");
                out.push_back(control_word(CW_START))
            }
            // The drive took the set point, release the new set point bit
            MotionState::SetpointAcked => out.push_back(control_word(CW_RELEASE)),
            _ => (),
        }
    }

    fn on_exit(&mut self, state: MotionState, out: &mut Outbox) {
        if state == MotionState::Homing {
            out.push_back(control_word(CW_RELEASE));
        }
    }
}
