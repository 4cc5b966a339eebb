//! The coordinator owning the whole stack

use sled_common::{
    constants::{motion_task, object_ids, values},
    sdo::{AbortCode, RawAbortCode},
    traits::CanDriver,
    CanMessage,
};

use crate::{
    config::SledConfig,
    error::SledError,
    machines::{
        drive::{DriveEvent, DriveMachine, DriveState},
        interface::{InterfaceEvent, InterfaceMachine, InterfaceState},
        motion::{MotionEvent, MotionMachine, MotionState},
        network::{NetworkEvent, NetworkMachine, NetworkState},
        sdo_queue::{SdoQueueEvent, SdoQueueMachine, SdoQueueState},
        Action, Notification, Outbox, StateMachine,
    },
    profile::{BlendType, PositionType, Profile, ProfileId, ProfileStore},
    sdo_request::{Continuation, SdoFailure, SdoKind, SdoOutcome, SdoRequest},
    transport::{Dispatch, Interface},
    watchdog::Watchdog,
};

/// Control word starting the motion task selected in the motion task register
const CW_START_TASK: u16 =
    values::CW_ENABLE_OPERATION | values::CW_NEW_SETPOINT | values::CW_CHANGE_IMMEDIATELY;

/// A position report from the drive
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSample {
    /// Actual position, in metres
    pub position: f64,
    /// Actual velocity, in metres per second
    pub velocity: f64,
    /// Time the report was received, in microseconds
    pub timestamp_us: u64,
}

/// Controls a single sled drive
///
/// `Sled` owns the transport and every state machine of the stack. Events are fed in through
/// [`Sled::process_frames`] and [`Sled::check_watchdog`]; the actions they trigger are carried out
/// before either call returns, including every transition they cause in dependent machines.
///
/// # Example
///
/// ```ignore
/// let mut sled = Sled::new(&config, driver)?;
/// sled.open();
/// loop {
///     let now_us = epoch.elapsed().as_micros() as u64;
///     sled.process_frames(now_us);
///     if watchdog_due {
///         sled.check_watchdog(now_us);
///     }
/// }
/// ```
pub struct Sled<D: CanDriver> {
    transport: Interface<D>,
    interface: InterfaceMachine,
    network: NetworkMachine,
    sdo: SdoQueueMachine,
    drive: DriveMachine,
    motion: MotionMachine,
    profiles: ProfileStore,
    watchdog: Watchdog,
    outbox: Outbox,
    position: PositionSample,
    sinusoid_there: ProfileId,
    sinusoid_back: ProfileId,
}

impl<D: CanDriver> core::fmt::Debug for Sled<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sled")
            .field("node_id", &self.transport.node_id())
            .field("interface", &self.interface.state())
            .field("network", &self.network.state())
            .field("sdo", &self.sdo.state())
            .field("drive", &self.drive.state())
            .field("motion", &self.motion.state())
            .finish()
    }
}

impl<D: CanDriver> Sled<D> {
    /// Create the stack for the drive described by `config`
    ///
    /// The adapter is not opened; call [`Sled::open`]. Two profiles are reserved for the
    /// sinusoid motion, so this fails if the profile table has fewer than two slots.
    pub fn new(config: &SledConfig, driver: D) -> Result<Self, SledError> {
        let mut profiles = ProfileStore::new(&config.profiles);
        let sinusoid_there = profiles.create()?;
        let sinusoid_back = profiles.create()?;
        profiles.set_table(sinusoid_there, 0)?;
        profiles.set_table(sinusoid_back, 0)?;
        profiles.set_next(sinusoid_there, Some(sinusoid_back), 0.0, BlendType::After)?;
        profiles.set_next(sinusoid_back, Some(sinusoid_there), 0.0, BlendType::After)?;

        Ok(Self {
            transport: Interface::new(driver, config.node_id),
            interface: InterfaceMachine::new(),
            network: NetworkMachine::new(config.node_id),
            sdo: SdoQueueMachine::new(),
            drive: DriveMachine::new(),
            motion: MotionMachine::new(),
            profiles,
            watchdog: Watchdog::new(&config.watchdog),
            outbox: Outbox::new(),
            position: PositionSample {
                position: 0.0,
                velocity: 0.0,
                timestamp_us: 0,
            },
            sinusoid_there,
            sinusoid_back,
        })
    }

    /// Open the CAN adapter and start negotiating with the drive
    ///
    /// Does nothing unless the adapter is closed. If opening fails, the interface stays closed
    /// and the call may be repeated.
    pub fn open(&mut self) {
        self.feed_interface(InterfaceEvent::Open);
    }

    /// Close the CAN adapter
    ///
    /// Every machine falls back to its disabled state and queued transfers are dropped.
    pub fn close(&mut self) {
        self.feed_interface(InterfaceEvent::Close);
    }

    /// Read and handle every frame waiting in the adapter
    ///
    /// Returns the number of frames read. A read error closes the adapter.
    pub fn process_frames(&mut self, now_us: u64) -> usize {
        let mut count = 0;
        while self.transport.is_open() {
            match self.transport.poll() {
                Ok(Some(msg)) => {
                    count += 1;
                    self.handle_message(&msg, now_us);
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("CAN interface failed: {e}");
                    self.feed_interface(InterfaceEvent::Close);
                    break;
                }
            }
        }
        count
    }

    /// Check the heartbeat watchdog
    ///
    /// Returns true if the heartbeat is overdue, in which case the network machine is told that
    /// the drive was lost.
    pub fn check_watchdog(&mut self, now_us: u64) -> bool {
        let expired = self.watchdog.check(now_us);
        if expired {
            self.feed_network(NetworkEvent::WatchdogFailed);
        }
        expired
    }

    /// The last position reported by the drive
    ///
    /// Fails unless the drive is operational. The error carries a sample with NaN position and
    /// velocity, stamped with `now_us`.
    pub fn get_position(&self, now_us: u64) -> Result<PositionSample, SledError> {
        if self.network.state() != NetworkState::Operational {
            return Err(SledError::PositionUnavailable {
                stale: PositionSample {
                    position: f64::NAN,
                    velocity: f64::NAN,
                    timestamp_us: now_us,
                },
            });
        }
        Ok(self.position)
    }

    /// Allocate a profile
    pub fn profile_create(&mut self) -> Result<ProfileId, SledError> {
        self.profiles.create()
    }

    /// Allocate a profile with an absolute target
    pub fn profile_create_pt(&mut self, position: f64, duration: f64) -> Result<ProfileId, SledError> {
        self.profiles.create_pt(position, duration)
    }

    /// Free a profile
    pub fn profile_destroy(&mut self, id: ProfileId) -> Result<(), SledError> {
        self.profiles.destroy(id)
    }

    /// Set the target of a profile
    pub fn profile_set_target(
        &mut self,
        id: ProfileId,
        position_type: PositionType,
        position: f64,
        duration: f64,
    ) -> Result<(), SledError> {
        self.profiles.set_target(id, position_type, position, duration)
    }

    /// Chain a profile to `next`, or unchain it
    pub fn profile_set_next(
        &mut self,
        id: ProfileId,
        next: Option<ProfileId>,
        delay: f64,
        blend: BlendType,
    ) -> Result<(), SledError> {
        self.profiles.set_next(id, next, delay, blend)
    }

    /// Select the profile table of a profile
    pub fn profile_set_table(&mut self, id: ProfileId, table: u32) -> Result<(), SledError> {
        self.profiles.set_table(id, table)
    }

    /// Upload the changed registers of a profile and of the profiles chained to it
    pub fn profile_write_pending_changes(&mut self, id: ProfileId) -> Result<(), SledError> {
        self.profiles.write_pending_changes(id, &mut self.outbox)?;
        self.pump();
        Ok(())
    }

    /// Start a profile
    ///
    /// Pending changes are uploaded first. Fails without side effects unless the motion machine
    /// is idle. Success means the command was queued, not that the move started. Writes queued
    /// after an aborted transfer are never sent, see [`Sled::light_set_state`].
    pub fn profile_execute(&mut self, id: ProfileId) -> Result<(), SledError> {
        let task = self.profiles.get(id)?.task();
        let state = self.motion.state();
        if state != MotionState::Idle {
            log::error!("Unable to execute profile {id}, motion is {state:?}");
            return Err(SledError::MotionNotIdle { state });
        }
        log::debug!("Executing profile {id} as task {task}");

        self.profiles.write_pending_changes(id, &mut self.outbox)?;
        self.outbox.push_back(Action::Enqueue(SdoRequest::write(
            motion_task::MOTION_TASK,
            0,
            task as u32,
            2,
        )));
        self.outbox.push_back(Action::Enqueue(SdoRequest::write(
            object_ids::CONTROL_WORD,
            0,
            CW_START_TASK as u32,
            2,
        )));
        self.pump();
        self.feed_motion(MotionEvent::SetpointSet);
        Ok(())
    }

    /// Start oscillating between the current position and `2 * amplitude` beyond it
    ///
    /// A full cycle takes `period` seconds. Fails without side effects unless the motion machine
    /// is idle.
    pub fn sinusoid_start(&mut self, amplitude: f64, period: f64) -> Result<(), SledError> {
        log::debug!("Starting sinusoid, amplitude {amplitude:.3} m, period {period:.2} s");
        let state = self.motion.state();
        if state != MotionState::Idle {
            return Err(SledError::MotionNotIdle { state });
        }
        let (there, back) = (self.sinusoid_there, self.sinusoid_back);
        let origin = self.position.position;
        let half = period / 2.0;

        self.profiles
            .set_target(there, PositionType::Absolute, origin + amplitude * 2.0, half)?;
        self.profiles
            .set_target(back, PositionType::Absolute, origin, half)?;
        self.profiles
            .set_next(there, Some(back), 0.0, BlendType::After)?;
        self.profiles
            .set_next(back, Some(there), 0.0, BlendType::After)?;
        self.profile_execute(there)
    }

    /// Break the sinusoid chain, so the motion stops at the end of the current half cycle
    pub fn sinusoid_stop(&mut self) -> Result<(), SledError> {
        log::debug!("Stopping sinusoid");
        let (there, back) = (self.sinusoid_there, self.sinusoid_back);
        self.profiles.set_next(there, None, 0.0, BlendType::After)?;
        self.profiles.set_next(back, None, 0.0, BlendType::After)?;
        // Unlinked, so each has to be flushed on its own
        self.profiles.write_pending_changes(there, &mut self.outbox)?;
        self.profiles.write_pending_changes(back, &mut self.outbox)?;
        self.pump();
        Ok(())
    }

    /// The profiles reserved for the sinusoid, as `(there, back)`
    pub fn sinusoid_profiles(&self) -> (ProfileId, ProfileId) {
        (self.sinusoid_there, self.sinusoid_back)
    }

    /// Switch the light on digital output 1
    ///
    /// Fails while register transfers are disabled. After the drive aborted a transfer, the queue
    /// is in [`SdoQueueState::Error`] and the write is accepted but only held; it is dropped when
    /// the network is renegotiated.
    pub fn light_set_state(&mut self, on: bool) -> Result<(), SledError> {
        log::debug!("Light {}", if on { "on" } else { "off" });
        if self.sdo.state() == SdoQueueState::Disabled {
            return Err(SledError::SdoDisabled);
        }
        self.outbox.push_back(Action::Enqueue(SdoRequest::write(
            motion_task::DIGITAL_OUTPUT_1,
            1,
            on as u32,
            4,
        )));
        self.pump();
        Ok(())
    }

    /// Access a profile
    pub fn profile(&self, id: ProfileId) -> Result<&Profile, SledError> {
        self.profiles.get(id)
    }

    /// Access the profile table
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// State of the interface machine
    pub fn interface_state(&self) -> InterfaceState {
        self.interface.state()
    }

    /// State of the network machine
    pub fn network_state(&self) -> NetworkState {
        self.network.state()
    }

    /// State of the SDO queue
    pub fn sdo_state(&self) -> SdoQueueState {
        self.sdo.state()
    }

    /// Number of transfers waiting in the SDO queue
    pub fn sdo_queue_len(&self) -> usize {
        self.sdo.len()
    }

    /// State of the drive machine
    pub fn drive_state(&self) -> DriveState {
        self.drive.state()
    }

    /// State of the motion machine
    pub fn motion_state(&self) -> MotionState {
        self.motion.state()
    }

    /// The heartbeat watchdog
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Access the CAN driver
    pub fn driver(&self) -> &D {
        self.transport.driver()
    }

    /// Mutably access the CAN driver
    pub fn driver_mut(&mut self) -> &mut D {
        self.transport.driver_mut()
    }

    fn handle_message(&mut self, msg: &CanMessage, now_us: u64) {
        let Some(dispatch) = self.transport.dispatch(msg) else {
            return;
        };
        match dispatch {
            // Logged by the transport
            Dispatch::Emergency(_) => (),
            Dispatch::Heartbeat { state } => {
                self.watchdog.feed(now_us);
                if let Some(event) = state.and_then(NetworkEvent::from_heartbeat) {
                    self.feed_network(event);
                }
            }
            Dispatch::Tpdo { channel: 1, data } => {
                let status = u16::from_le_bytes([data[0], data[1]]);
                let mode = data[2] as i8;
                for event in DriveEvent::from_status_word(status) {
                    self.feed_drive(event);
                }
                for event in MotionEvent::from_status(status, mode) {
                    self.feed_motion(event);
                }
            }
            Dispatch::Tpdo { channel: 2, data } => {
                let position = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                let velocity = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
                self.position = PositionSample {
                    position: position as f64 / 1e6,
                    velocity: velocity as f64 / 1e6,
                    timestamp_us: now_us,
                };
            }
            Dispatch::Tpdo { .. } => (),
            Dispatch::Sdo(response) => {
                self.sdo.handle_response(response, &mut self.outbox);
                self.pump();
            }
        }
    }

    fn feed_interface(&mut self, event: InterfaceEvent) {
        self.interface.handle_event(event, &mut self.outbox);
        self.pump();
    }

    fn feed_network(&mut self, event: NetworkEvent) {
        self.network.handle_event(event, &mut self.outbox);
        self.pump();
    }

    fn feed_drive(&mut self, event: DriveEvent) {
        self.drive.handle_event(event, &mut self.outbox);
        self.pump();
    }

    fn feed_motion(&mut self, event: MotionEvent) {
        self.motion.handle_event(event, &mut self.outbox);
        self.pump();
    }

    /// Carry out queued actions until none are left
    fn pump(&mut self) {
        while let Some(action) = self.outbox.pop_front() {
            self.perform(action);
        }
    }

    fn perform(&mut self, action: Action) {
        let out = &mut self.outbox;
        match action {
            Action::OpenTransport => {
                let event = match self.transport.open() {
                    Ok(()) => InterfaceEvent::Opened,
                    Err(e) => {
                        log::error!("Failed to open CAN interface: {e}");
                        InterfaceEvent::Closed
                    }
                };
                self.interface.handle_event(event, out);
            }
            Action::CloseTransport => {
                self.transport.close();
                self.interface.handle_event(InterfaceEvent::Closed, out);
            }
            Action::SendNmt(command) => {
                if let Err(e) = self.transport.send_nmt(command) {
                    log::error!("Failed to send NMT {command:?}: {e}");
                }
            }
            Action::Enqueue(request) => self.sdo.enqueue(request, out),
            Action::Transmit(request) => {
                let result = match request.kind {
                    SdoKind::Write { value, size } => {
                        self.transport
                            .send_write(request.index, request.sub, value, size)
                    }
                    SdoKind::Read => self.transport.send_read(request.index, request.sub),
                };
                if let Err(e) = result {
                    log::error!("Failed to send SDO {request}: {e}");
                    let failure =
                        SdoFailure::Aborted(RawAbortCode::Valid(AbortCode::GeneralError));
                    self.sdo.transmit_failed(failure, out);
                }
            }
            Action::AbandonTransfer => self.transport.abandon_sdo(),
            Action::Complete {
                continuation,
                outcome,
            } => self.complete(continuation, outcome),
            Action::SdoItemAvailable => {
                self.sdo.handle_event(SdoQueueEvent::ItemAvailable, out);
            }
            Action::Notify(notification) => self.route(notification),
        }
    }

    fn route(&mut self, notification: Notification) {
        let out = &mut self.outbox;
        match notification {
            Notification::InterfaceOpened => {
                self.network.handle_event(NetworkEvent::IntfOpened, out);
            }
            Notification::InterfaceClosed => {
                self.network.handle_event(NetworkEvent::IntfClosed, out);
            }
            Notification::SdosEnabled => {
                self.sdo.handle_event(SdoQueueEvent::Enabled, out);
            }
            Notification::SdosDisabled => {
                self.sdo.handle_event(SdoQueueEvent::Disabled, out);
            }
            Notification::EnterOperational => {
                // The drive's volatile task table cannot be trusted after a restart
                self.profiles.reset();
                self.drive.handle_event(DriveEvent::NetOperational, out);
            }
            Notification::LeaveOperational => {
                self.drive.handle_event(DriveEvent::NetInoperational, out);
            }
            Notification::OperationEnabled => {
                self.motion.handle_event(MotionEvent::DsOperational, out);
            }
            Notification::OperationDisabled => {
                self.motion.handle_event(MotionEvent::DsInoperational, out);
            }
        }
    }

    fn complete(&mut self, continuation: Continuation, outcome: SdoOutcome) {
        match continuation {
            Continuation::Ignore => (),
            Continuation::NetworkConfig { last } => match outcome {
                Ok(_) => {
                    if last {
                        log::info!("PDO configuration uploaded");
                        self.network
                            .handle_event(NetworkEvent::UploadComplete, &mut self.outbox);
                    }
                }
                Err(SdoFailure::Dropped) => {
                    log::debug!("Configuration write dropped");
                    self.network
                        .handle_event(NetworkEvent::UploadFailed, &mut self.outbox);
                }
                Err(failure) => {
                    log::error!("PDO configuration upload failed: {failure}");
                    self.network
                        .handle_event(NetworkEvent::UploadFailed, &mut self.outbox);
                }
            },
            Continuation::ProfileField { slot, field } => {
                self.profiles.complete(slot, field, outcome)
            }
        }
    }
}

impl<D: CanDriver> Drop for Sled<D> {
    fn drop(&mut self) {
        self.close();
    }
}
