use assertables::*;
use integration_tests::prelude::*;

fn control_words(writes: &[(u16, u8, u32)]) -> Vec<u32> {
    writes
        .iter()
        .filter(|(index, _, _)| *index == 0x6040)
        .map(|(_, _, value)| *value)
        .collect()
}

#[test]
fn test_bootstrap_to_idle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut h = Harness::new();
    let _logger = BusLogger::new(h.bus.new_receiver());

    h.bring_up();

    assert_eq!(InterfaceState::Opened, h.sled.interface_state());
    assert_eq!(NetworkState::Operational, h.sled.network_state());
    assert_eq!(SdoQueueState::Waiting, h.sled.sdo_state());
    assert_eq!(DriveState::OperationEnabled, h.sled.drive_state());
    assert_eq!(MotionState::Idle, h.sled.motion_state());

    // Pre-operational first, started only after configuration
    assert_eq!(&[0x80, 0x01], h.drive.nmt_commands());
    assert_eq!(NmtState::Operational, h.drive.nmt_state());

    let writes = h.drive.writes();
    // TPDO1 maps the status word and the mode display
    assert_contains!(writes, &(0x1A00, 1, 0x6041_0010));
    assert_contains!(writes, &(0x1A00, 2, 0x6061_0008));
    assert_contains!(writes, &(0x1A00, 0, 2));
    // TPDO2 maps position and velocity
    assert_contains!(writes, &(0x1A01, 1, 0x6064_0020));
    assert_contains!(writes, &(0x1A01, 2, 0x606C_0020));

    // Shutdown, switch on, enable operation
    assert_eq!(vec![6, 6, 7, 0x0F], control_words(writes));
    // The drive was already homed, so homing mode is left straight away
    let modes: Vec<u32> = writes
        .iter()
        .filter(|(index, _, _)| *index == 0x6060)
        .map(|(_, _, value)| *value)
        .collect();
    assert_eq!(vec![6, 1], modes);
    assert_eq!(1, h.drive.mode());
}

#[test]
fn test_homing_when_not_homed() {
    let mut h = Harness::new();
    h.drive.set_homed(false);

    h.bring_up();

    let cws = control_words(h.drive.writes());
    // Enable, then start homing, then release the start bit
    assert_eq!(vec![6, 6, 7, 0x0F, 0x3F, 0x2F], cws);
    assert_eq!(MotionState::Idle, h.sled.motion_state());
    assert_eq!(1, h.drive.mode());
}

#[test]
fn test_stopped_drive_bring_up() {
    let mut h = Harness::new();
    // The drive misses the first command and reports stopped
    h.drive.offline = true;
    h.sled.open();
    h.settle();
    h.drive.offline = false;
    h.drive.set_nmt_state(NmtState::Stopped);

    h.wait_for_idle(1000);

    // Started, sent back to pre-operational for configuration, then started again
    assert_eq!(&[0x01, 0x80, 0x01], h.drive.nmt_commands());
    assert_eq!(NetworkState::Operational, h.sled.network_state());
    assert_contains!(h.drive.writes(), &(0x1A01, 2, 0x606C_0020));
}

#[test]
fn test_failed_open_is_retried() {
    let mut h = Harness::new();
    h.sled.driver_mut().fail_open = true;
    h.sled.open();
    h.settle();
    assert_eq!(InterfaceState::Closed, h.sled.interface_state());
    assert_eq!(NetworkState::Disabled, h.sled.network_state());
    assert!(h.drive.nmt_commands().is_empty());

    h.sled.driver_mut().fail_open = false;
    h.bring_up();
    assert_eq!(NetworkState::Operational, h.sled.network_state());
}

#[test]
fn test_config_abort_renegotiates() {
    let mut h = Harness::new();
    // Inhibit time of TPDO1
    h.drive.abort_next_write_to(0x1800, 3);

    h.bring_up();

    // The failed upload sends the drive back to pre-operational and starts over
    assert_eq!(&[0x80, 0x80, 0x01], h.drive.nmt_commands());
    assert_eq!(NetworkState::Operational, h.sled.network_state());
    assert_eq!(MotionState::Idle, h.sled.motion_state());
    let inhibit_writes = h
        .drive
        .writes()
        .iter()
        .filter(|(index, sub, _)| *index == 0x1800 && *sub == 3)
        .count();
    assert_eq!(1, inhibit_writes);
}

#[test]
fn test_profiles_reuploaded_after_restart() {
    let mut h = Harness::new();
    h.bring_up();
    let id = h.sled.profile_create_pt(0.2, 1.0).unwrap();
    h.sled.profile_write_pending_changes(id).unwrap();
    h.settle();
    assert!(!h.sled.profile(id).unwrap().has_changes_pending());

    // Losing the adapter and reconnecting renegotiates from scratch
    h.sled.close();
    assert_eq!(NetworkState::Disabled, h.sled.network_state());
    assert_eq!(MotionState::Disabled, h.sled.motion_state());
    h.bring_up();

    assert!(h.sled.profile(id).unwrap().has_changes_pending());
    assert_eq!(
        FieldState::Changed,
        h.sled.profile(id).unwrap().field_state(ProfileField::Position)
    );
}
