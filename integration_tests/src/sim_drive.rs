//! A simulated DS402 drive
//!
//! Just enough of a drive to bring the sled stack up: it answers NMT commands with heartbeats,
//! accepts every expedited SDO download, runs a simplified power state ladder from the control
//! word, keeps a motion task table, and reports status and position in TPDO1 and TPDO2.
use std::collections::HashMap;

use sled_common::{
    constants::{motion_task, object_ids},
    messages::{CanId, CanMessage},
    nmt::{NmtCommand, NmtState},
    sdo::{self, AbortCode, SdoResponse},
    traits::CanDriver,
    NodeId,
};

use crate::sim_bus::{SimBus, SimCan};

const HEARTBEAT_PERIOD_US: u64 = 100_000;

/// Task 0 registers which are saved with a motion task
const TASK_REGISTERS: [u16; 8] = [
    motion_task::TASK_POSITION,
    motion_task::TASK_VELOCITY,
    motion_task::TASK_CONTROL,
    motion_task::TASK_ACCELERATION,
    motion_task::TASK_DECELERATION,
    motion_task::TASK_TABLE,
    motion_task::TASK_NEXT,
    motion_task::TASK_NEXT_DELAY,
];

pub struct SimDrive {
    can: SimCan,
    node_id: NodeId,
    nmt: NmtState,
    /// Power state bits of the status word
    power: u16,
    control: u16,
    mode: i8,
    homed: bool,
    position_um: i32,
    registers: HashMap<(u16, u8), u32>,
    tasks: HashMap<u16, HashMap<u16, u32>>,
    writes: Vec<(u16, u8, u32)>,
    nmt_commands: Vec<u8>,
    /// Register whose downloads are aborted, and how many more times
    abort_on: Option<(u16, u8, usize)>,
    /// While set, the drive neither sends nor handles frames
    pub offline: bool,
    last_heartbeat_us: Option<u64>,
}

impl SimDrive {
    pub fn new(bus: &mut SimBus, node_id: u8) -> Self {
        let mut can = bus.new_endpoint();
        can.open().unwrap();
        Self {
            can,
            node_id: NodeId::new(node_id).unwrap(),
            nmt: NmtState::PreOperational,
            // Switch on disabled, voltage present
            power: 0x50,
            control: 0,
            mode: 0,
            homed: true,
            position_um: 0,
            registers: HashMap::new(),
            tasks: HashMap::new(),
            writes: Vec::new(),
            nmt_commands: Vec::new(),
            abort_on: None,
            offline: false,
            last_heartbeat_us: None,
        }
    }

    /// Make the drive report that it has not been homed
    pub fn set_homed(&mut self, homed: bool) {
        self.homed = homed;
    }

    /// Abort every download to the given register
    pub fn abort_writes_to(&mut self, index: u16, sub: u8) {
        self.abort_on = Some((index, sub, usize::MAX));
    }

    /// Abort only the next download to the given register
    pub fn abort_next_write_to(&mut self, index: u16, sub: u8) {
        self.abort_on = Some((index, sub, 1));
    }

    /// Every NMT command byte addressed to this node, in order
    pub fn nmt_commands(&self) -> &[u8] {
        &self.nmt_commands
    }

    /// Change the NMT state without a command, as a restart of the drive would
    pub fn set_nmt_state(&mut self, state: NmtState) {
        self.nmt = state;
    }

    pub fn nmt_state(&self) -> NmtState {
        self.nmt
    }

    pub fn mode(&self) -> i8 {
        self.mode
    }

    pub fn position_um(&self) -> i32 {
        self.position_um
    }

    pub fn register(&self, index: u16, sub: u8) -> Option<u32> {
        self.registers.get(&(index, sub)).copied()
    }

    /// A saved motion task register
    pub fn task_register(&self, task: u16, index: u16) -> Option<u32> {
        self.tasks.get(&task)?.get(&index).copied()
    }

    /// Every accepted download, in order
    pub fn writes(&self) -> &[(u16, u8, u32)] {
        &self.writes
    }

    /// Forget the recorded downloads
    pub fn take_writes(&mut self) -> Vec<(u16, u8, u32)> {
        std::mem::take(&mut self.writes)
    }

    /// Produce periodic frames due at `now_us`
    pub fn tick(&mut self, now_us: u64) {
        let due = match self.last_heartbeat_us {
            Some(last) => now_us.saturating_sub(last) >= HEARTBEAT_PERIOD_US,
            None => true,
        };
        if due && !self.offline {
            self.last_heartbeat_us = Some(now_us);
            self.send_heartbeat();
        }
    }

    /// Handle all received frames. Returns the number of frames handled.
    pub fn process(&mut self) -> usize {
        let mut count = 0;
        while let Ok(Some(msg)) = self.can.try_recv() {
            count += 1;
            if !self.offline {
                self.handle(msg);
            }
        }
        count
    }

    fn send(&mut self, id: CanId, data: &[u8]) {
        self.can.send(CanMessage::new(id, data)).unwrap();
    }

    fn send_heartbeat(&mut self) {
        let id = self.node_id.heartbeat_cob_id();
        self.send(id, &[self.nmt as u8]);
    }

    fn status_word(&self) -> u16 {
        let mut status = self.power;
        let new_setpoint = self.control & 0x10 != 0;
        match self.mode {
            6 if self.homed => status |= 0x1000,
            1 if new_setpoint => status |= 0x1000,
            1 => status |= 0x400,
            _ => (),
        }
        status
    }

    fn send_tpdos(&mut self) {
        if self.nmt != NmtState::Operational {
            return;
        }
        let status = self.status_word().to_le_bytes();
        let id = self.node_id.tpdo_cob_id(1);
        self.send(id, &[status[0], status[1], self.mode as u8]);

        let mut data = [0; 8];
        data[0..4].copy_from_slice(&self.position_um.to_le_bytes());
        let id = self.node_id.tpdo_cob_id(2);
        self.send(id, &data);
    }

    fn handle(&mut self, msg: CanMessage) {
        let id = msg.id();
        if id == CanId::std(0) {
            self.handle_nmt(msg.data());
        } else if id == self.node_id.sdo_rx_cob_id() {
            self.handle_sdo(msg.padded_data());
        }
    }

    fn handle_nmt(&mut self, data: &[u8]) {
        if data.len() < 2 || (data[1] != 0 && data[1] != self.node_id.raw()) {
            return;
        }
        log::debug!("Simulated drive received NMT command {:02X}", data[0]);
        self.nmt_commands.push(data[0]);
        match data[0] {
            x if x == NmtCommand::EnterPreOperational as u8 => {
                self.nmt = NmtState::PreOperational;
            }
            x if x == NmtCommand::Start as u8 => {
                self.nmt = NmtState::Operational;
            }
            x if x == NmtCommand::Stop as u8 => {
                self.nmt = NmtState::Stopped;
            }
            _ => return,
        }
        self.send_heartbeat();
        self.send_tpdos();
    }

    fn handle_sdo(&mut self, data: [u8; 8]) {
        let index = u16::from_le_bytes([data[1], data[2]]);
        let sub = data[3];
        let response = match data[0] & 0xE0 {
            // Expedited download
            0x20 => {
                if self.should_abort(index, sub) {
                    let reply = sdo::abort(index, sub, AbortCode::InvalidValue);
                    self.send(self.node_id.sdo_tx_cob_id(), &reply);
                    return;
                }
                let size = 4 - ((data[0] >> 2) & 0x3) as usize;
                let mut bytes = [0; 4];
                bytes[..size].copy_from_slice(&data[4..4 + size]);
                let value = u32::from_le_bytes(bytes);
                self.registers.insert((index, sub), value);
                self.writes.push((index, sub, value));
                SdoResponse::ConfirmDownload { index, sub }
            }
            // Upload
            0x40 => match self.registers.get(&(index, sub)) {
                Some(&value) => SdoResponse::ConfirmUpload {
                    index,
                    sub,
                    value,
                    size: 4,
                },
                None => {
                    let reply = sdo::abort(index, sub, AbortCode::NoSuchObject);
                    self.send(self.node_id.sdo_tx_cob_id(), &reply);
                    return;
                }
            },
            _ => return,
        };
        let reply = response.to_bytes();
        self.send(self.node_id.sdo_tx_cob_id(), &reply);

        if let SdoResponse::ConfirmDownload { index, sub } = response {
            self.apply_write(index, sub);
        }
    }

    fn should_abort(&mut self, index: u16, sub: u8) -> bool {
        match &mut self.abort_on {
            Some((i, s, remaining)) if *i == index && *s == sub && *remaining > 0 => {
                *remaining -= 1;
                log::debug!("Simulated drive aborting write to {index:04X}:{sub:02X}");
                true
            }
            _ => false,
        }
    }

    fn apply_write(&mut self, index: u16, sub: u8) {
        let value = self.registers[&(index, sub)];
        match index {
            object_ids::CONTROL_WORD => {
                self.control = value as u16;
                self.power = match self.control & 0x0F {
                    0x06 => 0x31,
                    0x07 => 0x33,
                    0x0F => 0x37,
                    _ => self.power,
                };
                let new_setpoint = self.control & 0x10 != 0;
                if new_setpoint && self.mode == 6 {
                    self.homed = true;
                    self.position_um = 0;
                }
                if new_setpoint && self.mode == 1 {
                    self.start_task();
                }
                self.send_tpdos();
            }
            object_ids::MODES_OF_OPERATION => {
                self.mode = value as u8 as i8;
                self.send_tpdos();
            }
            motion_task::COPY_MOTION_TASK => {
                let from = (value & 0xFFFF) as u16;
                let to = (value >> 16) as u16;
                let task: HashMap<u16, u32> = if from == 0 {
                    TASK_REGISTERS
                        .iter()
                        .filter_map(|&r| {
                            self.register(r, motion_task::TASK_SUB).map(|v| (r, v))
                        })
                        .collect()
                } else {
                    self.tasks.get(&from).cloned().unwrap_or_default()
                };
                if to == 0 {
                    for (r, v) in task {
                        self.registers.insert((r, motion_task::TASK_SUB), v);
                    }
                } else {
                    self.tasks.insert(to, task);
                }
            }
            _ => (),
        }
    }

    /// Move instantly to the target of the selected motion task
    fn start_task(&mut self) {
        let Some(task) = self.register(motion_task::MOTION_TASK, 0) else {
            return;
        };
        if let Some(target) = self.task_register(task as u16, motion_task::TASK_POSITION) {
            self.position_um = target as i32;
        }
    }
}
