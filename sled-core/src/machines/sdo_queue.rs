//! FIFO of register transfers with at most one in flight
//!
//! Every request put in the queue completes exactly once. Requests which are still queued when
//! the queue is drained complete with [`SdoFailure::Dropped`].

use std::collections::VecDeque;

use sled_common::sdo::SdoResponse;

use super::{Action, Outbox, StateMachine};
use crate::sdo_request::{SdoFailure, SdoRequest};

/// States of the [`SdoQueueMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdoQueueState {
    /// The drive's SDO server is not reachable
    Disabled,
    /// Idle, nothing in flight
    Waiting,
    /// A request is in flight
    Sending,
    /// The last request was aborted by the drive
    Error,
}

/// Events of the [`SdoQueueMachine`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdoQueueEvent {
    /// Transfers are possible
    Enabled,
    /// Transfers are not possible
    Disabled,
    /// A request was queued
    ItemAvailable,
    /// The in-flight write was confirmed
    WriteResponse,
    /// The in-flight read was answered
    ReadResponse,
    /// The in-flight request was aborted
    AbortResponse,
}

/// Serializes register transfers towards the drive
#[derive(Debug)]
pub struct SdoQueueMachine {
    state: SdoQueueState,
    queue: VecDeque<SdoRequest>,
    in_flight: Option<SdoRequest>,
}

impl SdoQueueMachine {
    /// Create an empty queue in the `Disabled` state
    pub fn new() -> Self {
        Self {
            state: SdoQueueState::Disabled,
            queue: VecDeque::new(),
            in_flight: None,
        }
    }

    /// Number of requests waiting to be sent, not counting the one in flight
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if nothing is waiting to be sent
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The request awaiting its response, if any
    pub fn in_flight(&self) -> Option<&SdoRequest> {
        self.in_flight.as_ref()
    }

    /// Add a request to the tail of the queue
    ///
    /// The request is queued in every state. While the queue is disabled it stays there until
    /// the queue is enabled again, at which point it is dropped.
    pub fn enqueue(&mut self, request: SdoRequest, out: &mut Outbox) {
        log::trace!("Queueing SDO {request}");
        if self.state == SdoQueueState::Error {
            log::warn!(
                "Queueing SDO {request} after an abort, it is dropped once the drive is renegotiated"
            );
        }
        self.queue.push_back(request);
        self.handle_event(SdoQueueEvent::ItemAvailable, out);
    }

    /// Complete the in-flight request with the drive's response
    ///
    /// A response which does not match the in-flight request is logged and ignored.
    pub fn handle_response(&mut self, response: SdoResponse, out: &mut Outbox) {
        let Some(request) = self.in_flight else {
            log::warn!(
                "SDO response for {:04X}:{:02X} with nothing in flight",
                response.index(),
                response.sub()
            );
            return;
        };
        if request.index != response.index() || request.sub != response.sub() {
            log::warn!(
                "SDO response for {:04X}:{:02X} does not match in-flight {request}",
                response.index(),
                response.sub()
            );
            return;
        }
        self.in_flight = None;

        let (outcome, event) = match response {
            SdoResponse::ConfirmDownload { .. } => (Ok(0), SdoQueueEvent::WriteResponse),
            SdoResponse::ConfirmUpload { value, .. } => (Ok(value), SdoQueueEvent::ReadResponse),
            SdoResponse::Abort { abort_code, .. } => {
                log::error!("SDO {request} was aborted: {abort_code}");
                (
                    Err(SdoFailure::Aborted(abort_code)),
                    SdoQueueEvent::AbortResponse,
                )
            }
        };
        if request.is_write() && event == SdoQueueEvent::ReadResponse {
            log::warn!("Upload confirmation for write {request}");
        }
        out.push_back(Action::Complete {
            continuation: request.continuation,
            outcome,
        });
        self.handle_event(event, out);
    }

    /// Abort the in-flight request because it never reached the bus
    pub fn transmit_failed(&mut self, failure: SdoFailure, out: &mut Outbox) {
        if let Some(request) = self.in_flight.take() {
            log::error!("SDO {request} could not be sent");
            out.push_back(Action::Complete {
                continuation: request.continuation,
                outcome: Err(failure),
            });
            self.handle_event(SdoQueueEvent::AbortResponse, out);
        }
    }

    fn drain(&mut self, out: &mut Outbox) {
        if !self.queue.is_empty() {
            log::debug!("Dropping {} queued SDO requests", self.queue.len());
        }
        while let Some(request) = self.queue.pop_front() {
            out.push_back(Action::Complete {
                continuation: request.continuation,
                outcome: Err(SdoFailure::Dropped),
            });
        }
    }
}

impl Default for SdoQueueMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine for SdoQueueMachine {
    type State = SdoQueueState;
    type Event = SdoQueueEvent;
    const NAME: &'static str = "SdoQueue";

    fn state(&self) -> SdoQueueState {
        self.state
    }

    fn set_state(&mut self, state: SdoQueueState) {
        self.state = state;
    }

    fn next_state(&self, state: SdoQueueState, event: SdoQueueEvent) -> SdoQueueState {
        use SdoQueueEvent as E;
        use SdoQueueState as S;
        match (state, event) {
            (S::Disabled | S::Error, E::Enabled) => S::Waiting,
            (S::Waiting | S::Error, E::Disabled) => S::Disabled,
            (S::Waiting, E::ItemAvailable) => S::Sending,
            (S::Sending, E::Disabled) => S::Disabled,
            (S::Sending, E::WriteResponse | E::ReadResponse) => S::Waiting,
            (S::Sending, E::AbortResponse) => S::Error,
            (state, _) => state,
        }
    }

    fn on_enter(&mut self, state: SdoQueueState, out: &mut Outbox) {
        match state {
            SdoQueueState::Sending => {
                // Entered only on ItemAvailable, so the queue is not empty
                if let Some(request) = self.queue.pop_front() {
                    log::debug!("Sending SDO {request}");
                    self.in_flight = Some(request);
                    out.push_back(Action::Transmit(request));
                }
            }
            SdoQueueState::Waiting => {
                if !self.queue.is_empty() {
                    out.push_back(Action::SdoItemAvailable);
                }
            }
            SdoQueueState::Disabled | SdoQueueState::Error => self.drain(out),
        }
    }

    fn on_exit(&mut self, state: SdoQueueState, out: &mut Outbox) {
        match state {
            SdoQueueState::Disabled | SdoQueueState::Error => self.drain(out),
            SdoQueueState::Sending => {
                // Leaving without a response: the request is given up
                if let Some(request) = self.in_flight.take() {
                    log::debug!("Dropping in-flight SDO {request}");
                    out.push_back(Action::AbandonTransfer);
                    out.push_back(Action::Complete {
                        continuation: request.continuation,
                        outcome: Err(SdoFailure::Dropped),
                    });
                }
            }
            SdoQueueState::Waiting => (),
        }
    }
}
