use assertables::*;
use integration_tests::prelude::*;

#[test]
fn test_execute_profile() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut h = Harness::new();
    let _logger = BusLogger::new(h.bus.new_receiver());
    h.bring_up();
    h.drive.take_writes();

    // Slots 0 and 1 belong to the sinusoid
    let id = h.sled.profile_create_pt(0.1, 1.0).unwrap();
    assert_eq!(2, id);
    assert_eq!(203, h.sled.profile(id).unwrap().task());

    h.sled.profile_execute(id).unwrap();
    assert_eq!(MotionState::SetpointPending, h.sled.motion_state());
    h.settle();

    assert_eq!(
        vec![
            // Load task 203 into the task 0 registers
            (0x2082, 0, 203),
            (0x35BE, 1, 100_000),
            (0x35BF, 1, 0),
            (0x35B9, 1, 0x2200),
            (0x35B7, 1, 500),
            (0x35BA, 1, 499),
            (0x35B8, 1, 2),
            // Save task 0 back to task 203
            (0x2082, 0, 203 << 16),
            (0x2080, 0, 203),
            (0x6040, 0, 0x3F),
            (0x6040, 0, 0x2F),
        ],
        h.drive.take_writes()
    );
    assert_eq!(MotionState::Idle, h.sled.motion_state());
    assert!(!h.sled.profile(id).unwrap().has_changes_pending());

    assert_eq!(100_000, h.drive.position_um());
    let sample = h.sled.get_position(h.now_us).unwrap();
    assert_in_delta!(0.1, sample.position, 1e-9);
    assert_eq!(h.now_us, sample.timestamp_us);

    // Nothing changed, so executing again only starts the task
    h.sled.profile_execute(id).unwrap();
    h.settle();
    assert_eq!(
        vec![(0x2080, 0, 203), (0x6040, 0, 0x3F), (0x6040, 0, 0x2F)],
        h.drive.take_writes()
    );
}

#[test]
fn test_execute_refused_while_busy() {
    let mut h = Harness::new();
    h.bring_up();
    let first = h.sled.profile_create_pt(0.1, 1.0).unwrap();
    let second = h.sled.profile_create_pt(0.2, 1.0).unwrap();

    h.sled.profile_execute(first).unwrap();
    assert_eq!(
        Err(SledError::MotionNotIdle {
            state: MotionState::SetpointPending
        }),
        h.sled.profile_execute(second)
    );
    h.settle();

    // Nothing of the second profile reached the drive
    assert_not_contains!(h.drive.writes(), &(0x2082, 0, 204));
    assert_not_contains!(h.drive.writes(), &(0x35BE, 1, 200_000));
    assert!(h.sled.profile(second).unwrap().has_changes_pending());
    assert_eq!(100_000, h.drive.position_um());

    // Once idle again it is accepted
    h.sled.profile_execute(second).unwrap();
    h.settle();
    assert_eq!(200_000, h.drive.position_um());
}

#[test]
fn test_execute_refused_before_bring_up() {
    let mut h = Harness::new();
    let id = h.sled.profile_create_pt(0.1, 1.0).unwrap();
    assert_eq!(
        Err(SledError::MotionNotIdle {
            state: MotionState::Disabled
        }),
        h.sled.profile_execute(id)
    );
    assert_eq!(
        Err(SledError::ProfileNotInUse { id: 50 }),
        h.sled.profile_execute(50)
    );
    assert_eq!(
        Err(SledError::InvalidProfile { id: 500 }),
        h.sled.profile_execute(500)
    );
}

#[test]
fn test_position_unavailable_until_operational() {
    let mut h = Harness::new();
    match h.sled.get_position(1234) {
        Err(SledError::PositionUnavailable { stale }) => {
            assert!(stale.position.is_nan());
            assert!(stale.velocity.is_nan());
            assert_eq!(1234, stale.timestamp_us);
        }
        other => panic!("Unexpected {other:?}"),
    }

    h.bring_up();
    let sample = h.sled.get_position(h.now_us).unwrap();
    assert_eq!(0.0, sample.position);
    assert_eq!(0.0, sample.velocity);
}

#[test]
fn test_light() {
    let mut h = Harness::new();
    assert_eq!(Err(SledError::SdoDisabled), h.sled.light_set_state(true));

    h.bring_up();
    h.drive.take_writes();
    h.sled.light_set_state(true).unwrap();
    h.settle();
    assert_eq!(Some(1), h.drive.register(0x35AE, 1));
    h.sled.light_set_state(false).unwrap();
    h.settle();
    assert_eq!(Some(0), h.drive.register(0x35AE, 1));
    assert_eq!(vec![(0x35AE, 1, 1), (0x35AE, 1, 0)], h.drive.take_writes());
}

#[test]
fn test_sinusoid() {
    let mut h = Harness::new();
    h.bring_up();
    h.drive.take_writes();

    h.sled.sinusoid_start(0.05, 2.0).unwrap();
    h.settle();
    let writes = h.drive.take_writes();

    // Both halves are uploaded, chained to each other
    assert_contains!(writes, &(0x35B9, 1, 0x2218));
    assert_contains!(writes, &(0x35BC, 1, 202));
    assert_contains!(writes, &(0x35BC, 1, 201));
    assert_contains!(writes, &(0x2080, 0, 201));
    assert_eq!(Some(100_000), h.drive.task_register(201, 0x35BE));
    assert_eq!(Some(0), h.drive.task_register(202, 0x35BE));
    assert_eq!(Some(0), h.drive.task_register(201, 0x35B8));
    assert_eq!(Some(500), h.drive.task_register(202, 0x35B7));
    assert_eq!(MotionState::Idle, h.sled.motion_state());

    h.sled.sinusoid_stop().unwrap();
    h.settle();
    // Chaining is switched off in the control word of both halves
    assert_eq!(
        vec![
            (0x2082, 0, 201),
            (0x35B9, 1, 0x2210),
            (0x2082, 0, 201 << 16),
            (0x2082, 0, 202),
            (0x35B9, 1, 0x2210),
            (0x2082, 0, 202 << 16),
        ],
        h.drive.take_writes()
    );
    let (there, back) = h.sled.sinusoid_profiles();
    assert_eq!(None, h.sled.profile(there).unwrap().next());
    assert!(!h.sled.profile(back).unwrap().has_changes_pending());
}

#[test]
fn test_unusable_durations_refused() {
    let mut h = Harness::new();
    h.bring_up();
    h.drive.take_writes();

    assert_matches!(
        h.sled.sinusoid_start(0.05, 0.0),
        Err(SledError::InvalidValue { name: "duration", .. })
    );
    let id = h.sled.profile_create_pt(0.1, 1.0).unwrap();
    assert_matches!(
        h.sled
            .profile_set_target(id, PositionType::Absolute, 0.1, -1e10),
        Err(SledError::InvalidValue { .. })
    );

    // The profile still uploads its original timing
    h.sled.profile_execute(id).unwrap();
    h.settle();
    let writes = h.drive.take_writes();
    assert_contains!(writes, &(0x35B7, 1, 500));
    assert_contains!(writes, &(0x35BA, 1, 499));
    assert_eq!(MotionState::Idle, h.sled.motion_state());
}

#[test]
fn test_profile_chain_upload() {
    let mut h = Harness::new();
    h.bring_up();
    h.drive.take_writes();

    let a = h.sled.profile_create_pt(0.1, 1.0).unwrap();
    let b = h.sled.profile_create().unwrap();
    h.sled
        .profile_set_target(b, PositionType::Absolute, 0.0, 0.5)
        .unwrap();
    h.sled
        .profile_set_next(a, Some(b), 0.25, BlendType::Before)
        .unwrap();
    h.sled.profile_write_pending_changes(a).unwrap();
    h.settle();

    let task_a = h.sled.profile(a).unwrap().task();
    let task_b = h.sled.profile(b).unwrap().task();
    assert_eq!(Some(task_b as u32), h.drive.task_register(task_a, 0x35BC));
    assert_eq!(Some(250), h.drive.task_register(task_a, 0x35BD));
    // Chained, blended before
    assert_eq!(Some(0x2318), h.drive.task_register(task_a, 0x35B9));
    assert_eq!(Some(250), h.drive.task_register(task_b, 0x35B7));
    assert!(!h.sled.profile(b).unwrap().has_changes_pending());
}
