#![allow(dead_code)]
use sled_core::{machines::motion::MotionState, Sled, SledConfig};

use crate::{
    sim_bus::{SimBus, SimBusReceiver, SimCan},
    sim_drive::SimDrive,
};

/// Simulated time between two drive ticks
const STEP_US: u64 = 10_000;
/// Exchanges allowed before the bus is considered stuck in a loop
const MAX_SETTLE_ROUNDS: usize = 1000;

/// A sled stack connected to a simulated drive over a simulated bus
pub struct Harness {
    pub sled: Sled<SimCan>,
    pub drive: SimDrive,
    pub bus: SimBus,
    pub now_us: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SledConfig::default())
    }

    pub fn with_config(config: SledConfig) -> Self {
        let mut bus = SimBus::new();
        let drive = SimDrive::new(&mut bus, config.node_id.raw());
        let sled = Sled::new(&config, bus.new_endpoint()).unwrap();
        Self {
            sled,
            drive,
            bus,
            now_us: 0,
        }
    }

    /// Let the drive and the stack exchange frames until the bus is quiet
    pub fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            let handled = self.drive.process() + self.sled.process_frames(self.now_us);
            if handled == 0 {
                return;
            }
        }
        panic!("Bus still busy after {MAX_SETTLE_ROUNDS} rounds");
    }

    /// Advance simulated time by `ms`, ticking the drive along the way
    pub fn advance(&mut self, ms: u64) {
        let end = self.now_us + ms * 1000;
        while self.now_us < end {
            self.now_us = (self.now_us + STEP_US).min(end);
            self.drive.tick(self.now_us);
            self.settle();
        }
    }

    /// Run a watchdog check at the current time
    pub fn check_watchdog(&mut self) -> bool {
        let expired = self.sled.check_watchdog(self.now_us);
        self.settle();
        expired
    }

    /// Advance until the motion machine is idle, or panic after `timeout_ms`
    pub fn wait_for_idle(&mut self, timeout_ms: u64) {
        let end = self.now_us + timeout_ms * 1000;
        while self.sled.motion_state() != MotionState::Idle {
            if self.now_us >= end {
                panic!(
                    "Motion still {:?} after {timeout_ms} ms: {:?}",
                    self.sled.motion_state(),
                    self.sled
                );
            }
            self.advance(10);
        }
    }

    /// Open the stack and wait until it is ready for motion
    pub fn bring_up(&mut self) {
        self.sled.open();
        self.settle();
        self.wait_for_idle(1000);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints every frame seen on the bus when dropped
pub struct BusLogger {
    rx: SimBusReceiver,
}

impl BusLogger {
    pub fn new(rx: SimBusReceiver) -> Self {
        Self { rx }
    }

    pub fn print(&mut self) {
        println!("Bus message history");
        println!("-------------------");
        while let Some(msg) = self.rx.try_recv() {
            println!("{:>5} {:02X?}", msg.id().to_string(), msg.data());
        }
    }
}

impl Drop for BusLogger {
    fn drop(&mut self) {
        self.print();
    }
}
