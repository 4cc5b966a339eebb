//! Constants defining standard objects, drive specific objects and special values
//!
//!

/// Object indices for standard communication objects
pub mod object_ids {
    /// The heartbeat producer time object index
    pub const HEARTBEAT_PRODUCER_TIME: u16 = 0x1017;
    /// The identity object index
    pub const IDENTITY: u16 = 0x1018;

    /// The first RPDO communication parameter index. RPDO comm can be stored from 0x1400 to 0x15FF.
    pub const RPDO_COMM_BASE: u16 = 0x1400;
    ///  The first RPDO mapping parameter index. RPDO mappings can be stored from 0x1600 to 0x17FF;
    pub const RPDO_MAP_BASE: u16 = 0x1600;
    /// The first TPDO communication parameter index. TPDO comms can be stored from 0x1800 to 0x19FF.
    pub const TPDO_COMM_BASE: u16 = 0x1800;
    ///  The first TPDO mapping parameter index. TPDO mappings can be stored from 0x1A00 to 0x1BFF;
    pub const TPDO_MAP_BASE: u16 = 0x1A00;

    /// DS402 control word
    pub const CONTROL_WORD: u16 = 0x6040;
    /// DS402 status word
    pub const STATUS_WORD: u16 = 0x6041;
    /// DS402 modes of operation
    pub const MODES_OF_OPERATION: u16 = 0x6060;
    /// DS402 modes of operation display
    pub const MODES_OF_OPERATION_DISPLAY: u16 = 0x6061;
    /// DS402 position actual value
    pub const POSITION_ACTUAL: u16 = 0x6064;
    /// DS402 velocity actual value
    pub const VELOCITY_ACTUAL: u16 = 0x606C;
    /// DS402 interpolation data record
    pub const INTERPOLATION_DATA: u16 = 0x60C1;
}

/// Sub-indices of the PDO communication parameter records
pub mod pdo_comm_sub {
    /// COB-ID used by the PDO
    pub const COB_ID: u8 = 1;
    /// Transmission type
    pub const TRANSMISSION_TYPE: u8 = 2;
    /// Inhibit time, in 100us units
    pub const INHIBIT_TIME: u8 = 3;
    /// Event timer, in ms
    pub const EVENT_TIMER: u8 = 5;
}

/// Drive specific objects used to manage motion tasks
///
/// The drive holds a table of motion tasks. Task 0 is a volatile scratch slot: its fields are
/// edited through the `TASK_*` registers and then copied to a numbered task.
pub mod motion_task {
    /// Target position of task 0
    pub const TASK_POSITION: u16 = 0x35BE;
    /// Velocity limit of task 0
    pub const TASK_VELOCITY: u16 = 0x35BF;
    /// Control word (task settings) of task 0
    pub const TASK_CONTROL: u16 = 0x35B9;
    /// Acceleration time of task 0
    pub const TASK_ACCELERATION: u16 = 0x35B7;
    /// Deceleration time of task 0
    pub const TASK_DECELERATION: u16 = 0x35BA;
    /// Profile table used by task 0
    pub const TASK_TABLE: u16 = 0x35B8;
    /// Next task number of task 0
    pub const TASK_NEXT: u16 = 0x35BC;
    /// Delay before starting the next task
    pub const TASK_NEXT_DELAY: u16 = 0x35BD;
    /// Sub-index used for all the task 0 registers
    pub const TASK_SUB: u8 = 0x01;

    /// Motion task to be started
    pub const MOTION_TASK: u16 = 0x2080;
    /// Currently active motion task
    pub const ACTIVE_TASK: u16 = 0x2081;
    /// Copy one motion task onto another
    pub const COPY_MOTION_TASK: u16 = 0x2082;

    /// State of digital output 1
    pub const DIGITAL_OUTPUT_1: u16 = 0x35AE;
    /// State of digital output 2
    pub const DIGITAL_OUTPUT_2: u16 = 0x35B1;
}

/// Special values written to drive objects
pub mod values {
    /// Control word: shutdown (go to ready to switch on)
    pub const CW_SHUTDOWN: u16 = 0x06;
    /// Control word: switch on
    pub const CW_SWITCH_ON: u16 = 0x07;
    /// Control word: disable operation
    pub const CW_DISABLE_OPERATION: u16 = 0x07;
    /// Control word: enable operation
    pub const CW_ENABLE_OPERATION: u16 = 0x0F;
    /// Control word bit: new set-point / start homing
    pub const CW_NEW_SETPOINT: u16 = 0x10;
    /// Control word bit: change set immediately
    pub const CW_CHANGE_IMMEDIATELY: u16 = 0x20;

    /// Modes of operation: profile position
    pub const MODE_PROFILE_POSITION: i8 = 1;
    /// Modes of operation: homing
    pub const MODE_HOMING: i8 = 6;

    /// Status word bit: voltage enabled
    pub const SW_VOLTAGE_ENABLED: u16 = 0x10;
    /// Status word bit: target reached
    pub const SW_TARGET_REACHED: u16 = 0x400;
    /// Status word bit: set-point acknowledge (PP) / homing attained (homing)
    pub const SW_SETPOINT_ACK: u16 = 0x1000;
}
