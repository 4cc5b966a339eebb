//! The state machines of the sled stack
//!
//! Every machine implements [`StateMachine`]: a transition function plus entry and exit hooks.
//! Hooks never call into other machines or the transport. They push [`Action`]s into an
//! [`Outbox`], which the coordinator drains in order after each event, routing notifications to
//! the machines which depend on them.

use std::collections::VecDeque;

use sled_common::nmt::NmtCommand;

use crate::sdo_request::{Continuation, SdoOutcome, SdoRequest};

pub mod drive;
pub mod interface;
pub mod motion;
pub mod network;
pub mod sdo_queue;

/// Side effects requested by state machine hooks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Open the CAN adapter, then report `Opened` or `Closed` to the interface machine
    OpenTransport,
    /// Close the CAN adapter, then report `Closed` to the interface machine
    CloseTransport,
    /// Send an NMT command to the drive
    SendNmt(NmtCommand),
    /// Put a request in the SDO queue
    Enqueue(SdoRequest),
    /// Send a request on the bus. Only the SDO queue emits this.
    Transmit(SdoRequest),
    /// The in-flight request was dropped, so the transport should stop waiting for it
    AbandonTransfer,
    /// Deliver the outcome of a request to its continuation
    Complete {
        /// Where the outcome goes
        continuation: Continuation,
        /// The outcome
        outcome: SdoOutcome,
    },
    /// Re-examine the SDO queue for waiting requests
    SdoItemAvailable,
    /// Tell the dependent machines about a state change
    Notify(Notification),
}

/// Notifications exchanged between machines, routed by the coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The CAN adapter is open
    InterfaceOpened,
    /// The CAN adapter is closed
    InterfaceClosed,
    /// The drive's SDO server is reachable
    SdosEnabled,
    /// The drive's SDO server is not reachable
    SdosDisabled,
    /// The drive is NMT operational
    EnterOperational,
    /// The drive left NMT operational
    LeaveOperational,
    /// The drive reached DS402 operation enabled
    OperationEnabled,
    /// The drive left DS402 operation enabled
    OperationDisabled,
}

/// Queue of actions produced by machine hooks
pub type Outbox = VecDeque<Action>;

/// A finite state machine with entry and exit hooks
///
/// Implementors provide the transition table as [`StateMachine::next_state`]. A pair of state and
/// event which the table does not handle must return the current state; the event is then
/// absorbed without running any hook.
pub trait StateMachine {
    /// The state type
    type State: Copy + PartialEq + core::fmt::Debug;
    /// The event type
    type Event: Copy + core::fmt::Debug;

    /// Name used in log messages
    const NAME: &'static str;

    /// The current state
    fn state(&self) -> Self::State;

    /// Assign the current state. Only [`StateMachine::handle_event`] should call this.
    fn set_state(&mut self, state: Self::State);

    /// The transition table
    fn next_state(&self, state: Self::State, event: Self::Event) -> Self::State;

    /// Run when `state` is entered
    fn on_enter(&mut self, _state: Self::State, _out: &mut Outbox) {}

    /// Run when `state` is left
    fn on_exit(&mut self, _state: Self::State, _out: &mut Outbox) {}

    /// Feed an event to the machine
    ///
    /// On a transition, the exit hook of the old state runs, then the state is assigned, then the
    /// entry hook of the new state runs. Returns true if the state changed.
    fn handle_event(&mut self, event: Self::Event, out: &mut Outbox) -> bool {
        let current = self.state();
        let next = self.next_state(current, event);
        if next == current {
            return false;
        }
        log::debug!("{}: {:?} -> {:?} on {:?}", Self::NAME, current, next, event);
        self.on_exit(current, out);
        self.set_state(next);
        self.on_enter(next, out);
        true
    }
}
