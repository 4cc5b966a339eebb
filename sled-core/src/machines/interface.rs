//! Open/close lifecycle of the CAN adapter

use super::{Action, Notification, Outbox, StateMachine};

/// States of the [`InterfaceMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceState {
    /// The adapter is closed
    Closed,
    /// The adapter is being opened
    Opening,
    /// The adapter is being closed
    Closing,
    /// The adapter is open
    Opened,
}

/// Events of the [`InterfaceMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceEvent {
    /// Request to open the adapter
    Open,
    /// Request to close the adapter
    Close,
    /// The adapter opened
    Opened,
    /// The adapter closed, or failed to open
    Closed,
}

/// Tracks whether the CAN adapter is usable
///
/// Opening the adapter is requested with [`InterfaceEvent::Open`]. A failed open returns the
/// machine to `Closed`; retrying is up to the application.
#[derive(Debug)]
pub struct InterfaceMachine {
    state: InterfaceState,
}

impl InterfaceMachine {
    /// Create a machine in the `Closed` state
    pub fn new() -> Self {
        Self {
            state: InterfaceState::Closed,
        }
    }
}

impl Default for InterfaceMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine for InterfaceMachine {
    type State = InterfaceState;
    type Event = InterfaceEvent;
    const NAME: &'static str = "Interface";

    fn state(&self) -> InterfaceState {
        self.state
    }

    fn set_state(&mut self, state: InterfaceState) {
        self.state = state;
    }

    fn next_state(&self, state: InterfaceState, event: InterfaceEvent) -> InterfaceState {
        use InterfaceEvent as E;
        use InterfaceState as S;
        match (state, event) {
            (S::Closed, E::Open) => S::Opening,
            (S::Opening, E::Opened) => S::Opened,
            (S::Opening, E::Closed) => S::Closed,
            (S::Opened, E::Close) => S::Closing,
            (S::Closing, E::Closed) => S::Closed,
            (state, _) => state,
        }
    }

    fn on_enter(&mut self, state: InterfaceState, out: &mut Outbox) {
        match state {
            InterfaceState::Opening => out.push_back(Action::OpenTransport),
            InterfaceState::Closing => out.push_back(Action::CloseTransport),
            InterfaceState::Opened => {
                out.push_back(Action::Notify(Notification::InterfaceOpened))
            }
            InterfaceState::Closed => {
                out.push_back(Action::Notify(Notification::InterfaceClosed))
            }
        }
    }
}
