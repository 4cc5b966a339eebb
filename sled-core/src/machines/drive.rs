//! DS402 power state of the drive
//!
//! The drive reports its power state in the status word, which arrives in TPDO1. The machine
//! answers each reported state with the control word which moves the drive one step further up
//! the ladder towards operation enabled.

use sled_common::constants::{object_ids::CONTROL_WORD, values};

use super::{Action, Notification, Outbox, StateMachine};
use crate::sdo_request::SdoRequest;

/// States of the [`DriveMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveState {
    /// The network is not operational
    Disabled,
    /// Power state not yet reported
    Unknown,
    /// Drive fault. Not entered at present.
    Fault,
    /// Clearing a drive fault. Not entered at present.
    ClearingFault,
    /// Switch on disabled, waiting for voltage
    SwitchOnDisabled,
    /// Shutdown sent, waiting for ready to switch on
    PrepareSwitchOn,
    /// Ready to switch on, waiting for voltage
    ReadyToSwitchOn,
    /// Switch on sent, waiting for switched on
    SwitchOn,
    /// Switched on
    SwitchedOn,
    /// Shutdown sent because voltage was lost
    Shutdown,
    /// Enable operation sent, waiting for operation enabled
    EnableOperation,
    /// Disable operation sent because voltage was lost
    DisableOperation,
    /// Operation enabled, the drive accepts motion commands
    OperationEnabled,
}

/// Events of the [`DriveMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveEvent {
    /// The network became operational
    NetOperational,
    /// The network left operational
    NetInoperational,
    /// Status word: not ready to switch on
    NotReadyToSwitchOn,
    /// Status word: ready to switch on
    ReadyToSwitchOn,
    /// Status word: switched on
    SwitchedOn,
    /// Status word: operation enabled
    OperationEnabled,
    /// Status word: fault
    Fault,
    /// Status word: fault reaction active
    FaultReactionActive,
    /// Status word: quick stop active
    QuickStopActive,
    /// Status word: voltage enabled bit set
    VoltageEnabled,
    /// Status word: voltage enabled bit clear
    VoltageDisabled,
}

impl DriveEvent {
    /// Decode the power state events carried by a status word
    ///
    /// The power state event (if any) comes first, followed by the voltage event.
    pub fn from_status_word(status: u16) -> Vec<DriveEvent> {
        let mut events = Vec::with_capacity(2);
        if status & 0x4F == 0x40 {
            events.push(DriveEvent::NotReadyToSwitchOn);
        }
        if status & 0x6F == 0x21 {
            events.push(DriveEvent::ReadyToSwitchOn);
        }
        if status & 0x6F == 0x23 {
            events.push(DriveEvent::SwitchedOn);
        }
        if status & 0x6F == 0x27 {
            events.push(DriveEvent::OperationEnabled);
        }
        if status & 0x4F == 0x08 {
            events.push(DriveEvent::Fault);
        }
        if status & 0x4F == 0x0F {
            events.push(DriveEvent::FaultReactionActive);
        }
        if status & 0x6F == 0x07 {
            events.push(DriveEvent::QuickStopActive);
        }
        if status & values::SW_VOLTAGE_ENABLED != 0 {
            events.push(DriveEvent::VoltageEnabled);
        } else {
            events.push(DriveEvent::VoltageDisabled);
        }
        events
    }
}

/// Tracks the DS402 power state and enables the drive
#[derive(Debug)]
pub struct DriveMachine {
    state: DriveState,
}

impl DriveMachine {
    /// Create a machine in the `Disabled` state
    pub fn new() -> Self {
        Self {
            state: DriveState::Disabled,
        }
    }
}

impl Default for DriveMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn control_word(value: u16) -> Action {
    Action::Enqueue(SdoRequest::write(CONTROL_WORD, 0, value as u32, 2))
}

impl StateMachine for DriveMachine {
    type State = DriveState;
    type Event = DriveEvent;
    const NAME: &'static str = "Drive";

    fn state(&self) -> DriveState {
        self.state
    }

    fn set_state(&mut self, state: DriveState) {
        self.state = state;
    }

    fn next_state(&self, state: DriveState, event: DriveEvent) -> DriveState {
        use DriveEvent as E;
        use DriveState as S;

        // Losing the network always wins
        if state != S::Disabled && event == E::NetInoperational {
            return S::Disabled;
        }

        match (state, event) {
            (S::Disabled, E::NetOperational) => S::Unknown,

            (S::Unknown, E::NotReadyToSwitchOn) => S::SwitchOnDisabled,
            (S::Unknown, E::ReadyToSwitchOn) => S::ReadyToSwitchOn,

            (S::SwitchOnDisabled, E::VoltageEnabled) => S::PrepareSwitchOn,
            (S::PrepareSwitchOn, E::ReadyToSwitchOn) => S::ReadyToSwitchOn,
            (S::ReadyToSwitchOn, E::VoltageEnabled) => S::SwitchOn,

            (S::SwitchOn, E::SwitchedOn) => S::SwitchedOn,
            (S::SwitchOn, E::VoltageDisabled) => S::Shutdown,

            (S::Shutdown, E::NotReadyToSwitchOn) => S::SwitchOnDisabled,
            (S::Shutdown, E::ReadyToSwitchOn) => S::ReadyToSwitchOn,

            (S::SwitchedOn, E::VoltageEnabled) => S::EnableOperation,
            (S::SwitchedOn, E::VoltageDisabled) => S::Shutdown,

            (S::DisableOperation, E::SwitchedOn) => S::SwitchedOn,
            (S::EnableOperation, E::OperationEnabled) => S::OperationEnabled,
            (S::OperationEnabled, E::VoltageDisabled) => S::DisableOperation,

            (state, _) => state,
        }
    }

    fn on_enter(&mut self, state: DriveState, out: &mut Outbox) {
        match state {
            DriveState::Unknown | DriveState::PrepareSwitchOn | DriveState::Shutdown => {
                out.push_back(control_word(values::CW_SHUTDOWN))
            }
            DriveState::SwitchOn => out.push_back(control_word(values::CW_SWITCH_ON)),
            DriveState::EnableOperation => {
                out.push_back(control_word(values::CW_ENABLE_OPERATION))
            }
            DriveState::DisableOperation => {
                out.push_back(control_word(values::CW_DISABLE_OPERATION))
            }
            DriveState::OperationEnabled => {
                log::info!("Drive operation enabled");
                out.push_back(Action::Notify(Notification::OperationEnabled))
            }
            _ => (),
        }
    }

    fn on_exit(&mut self, state: DriveState, out: &mut Outbox) {
        if state == DriveState::OperationEnabled {
            log::info!("Drive operation disabled");
            out.push_back(Action::Notify(Notification::OperationDisabled));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn feed_status(mch: &mut DriveMachine, status: u16, out: &mut Outbox) {
        for event in DriveEvent::from_status_word(status) {
            mch.handle_event(event, out);
        }
    }

    fn control_words(out: &mut Outbox) -> Vec<u32> {
        out.drain(..)
            .filter_map(|a| match a {
                Action::Enqueue(SdoRequest {
                    index: CONTROL_WORD,
                    kind: crate::sdo_request::SdoKind::Write { value, .. },
                    ..
                }) => Some(value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_status_decode() {
        use DriveEvent::*;
        assert_eq!(
            vec![NotReadyToSwitchOn, VoltageEnabled],
            DriveEvent::from_status_word(0x0250)
        );
        assert_eq!(vec![ReadyToSwitchOn, VoltageDisabled], DriveEvent::from_status_word(0x21));
        assert_eq!(
            vec![OperationEnabled, VoltageEnabled],
            DriveEvent::from_status_word(0x1637)
        );
        assert_eq!(vec![Fault, VoltageDisabled], DriveEvent::from_status_word(0x08));
    }

    #[test]
    fn test_ladder_to_operation_enabled() {
        let mut mch = DriveMachine::new();
        let mut out = Outbox::new();

        // Status words mean nothing until the network is up
        feed_status(&mut mch, 0x50, &mut out);
        assert_eq!(DriveState::Disabled, mch.state());

        mch.handle_event(DriveEvent::NetOperational, &mut out);
        assert_eq!(vec![0x06], control_words(&mut out));

        feed_status(&mut mch, 0x50, &mut out);
        assert_eq!(DriveState::PrepareSwitchOn, mch.state());
        assert_eq!(vec![0x06], control_words(&mut out));

        feed_status(&mut mch, 0x31, &mut out);
        assert_eq!(DriveState::SwitchOn, mch.state());
        assert_eq!(vec![0x07], control_words(&mut out));

        feed_status(&mut mch, 0x33, &mut out);
        assert_eq!(DriveState::EnableOperation, mch.state());
        assert_eq!(vec![0x0F], control_words(&mut out));

        feed_status(&mut mch, 0x37, &mut out);
        assert_eq!(DriveState::OperationEnabled, mch.state());
        assert_eq!(
            Some(Action::Notify(Notification::OperationEnabled)),
            out.pop_front()
        );

        // Repeated status words do nothing
        feed_status(&mut mch, 0x37, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_network_loss_wins() {
        let mut mch = DriveMachine::new();
        let mut out = Outbox::new();
        mch.handle_event(DriveEvent::NetOperational, &mut out);
        feed_status(&mut mch, 0x31, &mut out);
        feed_status(&mut mch, 0x33, &mut out);
        feed_status(&mut mch, 0x37, &mut out);
        out.clear();

        mch.handle_event(DriveEvent::NetInoperational, &mut out);
        assert_eq!(DriveState::Disabled, mch.state());
        assert_eq!(
            vec![Action::Notify(Notification::OperationDisabled)],
            out.drain(..).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_voltage_loss() {
        let mut mch = DriveMachine::new();
        let mut out = Outbox::new();
        mch.handle_event(DriveEvent::NetOperational, &mut out);
        feed_status(&mut mch, 0x31, &mut out);
        feed_status(&mut mch, 0x33, &mut out);
        feed_status(&mut mch, 0x37, &mut out);
        out.clear();

        // Operation enabled without voltage
        feed_status(&mut mch, 0x27, &mut out);
        assert_eq!(DriveState::DisableOperation, mch.state());
        assert_eq!(
            Some(Action::Notify(Notification::OperationDisabled)),
            out.pop_front()
        );
        assert_eq!(vec![0x07], control_words(&mut out));

        // Switched on without voltage
        feed_status(&mut mch, 0x23, &mut out);
        assert_eq!(DriveState::Shutdown, mch.state());
    }
}
