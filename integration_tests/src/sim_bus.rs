use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sled_common::{messages::CanMessage, traits::CanDriver};
use snafu::Snafu;

type Inboxes = Arc<Mutex<Vec<VecDeque<CanMessage>>>>;

/// An in-memory CAN bus
///
/// Every frame sent by one endpoint is delivered to the inbox of every other endpoint.
#[derive(Clone, Default)]
pub struct SimBus {
    inboxes: Inboxes,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_inbox(&mut self) -> usize {
        let mut inboxes = self.inboxes.lock().unwrap();
        inboxes.push(VecDeque::new());
        inboxes.len() - 1
    }

    /// Attach a new adapter to the bus. It starts out closed.
    pub fn new_endpoint(&mut self) -> SimCan {
        let index = self.add_inbox();
        SimCan {
            inboxes: self.inboxes.clone(),
            index,
            open: false,
            fail_open: false,
            fault: None,
        }
    }

    /// Attach a passive listener which sees every frame sent on the bus
    pub fn new_receiver(&mut self) -> SimBusReceiver {
        let index = self.add_inbox();
        SimBusReceiver {
            inboxes: self.inboxes.clone(),
            index,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum SimCanError {
    #[snafu(display("Adapter is not open"))]
    NotOpen,
    #[snafu(display("Adapter refused to open"))]
    OpenRefused,
    #[snafu(display("Injected fault: {message}"))]
    Injected { message: String },
}

/// A [`CanDriver`] attached to a [`SimBus`]
pub struct SimCan {
    inboxes: Inboxes,
    index: usize,
    open: bool,
    /// When set, `open` fails
    pub fail_open: bool,
    fault: Option<String>,
}

impl SimCan {
    /// Make the next receive fail, as a bus-off adapter would
    pub fn inject_fault(&mut self, message: &str) {
        self.fault = Some(message.to_string());
    }
}

impl CanDriver for SimCan {
    type Error = SimCanError;

    fn open(&mut self) -> Result<(), Self::Error> {
        if self.fail_open {
            return Err(SimCanError::OpenRefused);
        }
        if !self.open {
            // Frames sent while closed were never seen
            self.inboxes.lock().unwrap()[self.index].clear();
            self.open = true;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, msg: CanMessage) -> Result<(), Self::Error> {
        if !self.open {
            return Err(SimCanError::NotOpen);
        }
        for (i, inbox) in self.inboxes.lock().unwrap().iter_mut().enumerate() {
            // Deliver to all inboxes, except for the sender
            if i != self.index {
                inbox.push_back(msg);
            }
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<CanMessage>, Self::Error> {
        if !self.open {
            return Err(SimCanError::NotOpen);
        }
        if let Some(message) = self.fault.take() {
            return Err(SimCanError::Injected { message });
        }
        Ok(self.inboxes.lock().unwrap()[self.index].pop_front())
    }
}

pub struct SimBusReceiver {
    inboxes: Inboxes,
    index: usize,
}

impl SimBusReceiver {
    pub fn try_recv(&mut self) -> Option<CanMessage> {
        self.inboxes.lock().unwrap()[self.index].pop_front()
    }

    pub fn flush(&mut self) {
        self.inboxes.lock().unwrap()[self.index].clear();
    }
}
