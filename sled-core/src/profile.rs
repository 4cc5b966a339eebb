//! Motion profiles and their upload to the drive
//!
//! The drive holds a table of numbered motion tasks. Each [`Profile`] in the [`ProfileStore`] is
//! mirrored onto one of them: profile slot `n` maps to device task `task_base + n`. Tasks are not
//! edited in place. The task is copied into the volatile task 0, the registers of task 0 are
//! written, and task 0 is copied back.
//!
//! Every register of a profile carries a [`FieldState`], so that only the registers which
//! changed since they were last written are uploaded again.

use sled_common::constants::motion_task;

use crate::config::ProfilesConfig;
use crate::error::SledError;
use crate::machines::{Action, Outbox};
use crate::sdo_request::{Continuation, SdoOutcome, SdoRequest};

/// Index of a profile slot in the [`ProfileStore`]
pub type ProfileId = usize;

/// How the target position of a profile is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PositionType {
    /// Absolute position
    #[default]
    Absolute,
    /// Relative to the previous target position
    RelativeTarget,
    /// Relative to the actual position when the task starts
    RelativeActual,
}

/// How a profile hands over to its next profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendType {
    /// Stop at the target, then start the next profile
    #[default]
    None,
    /// Start the next profile before the target is reached
    Before,
    /// Start the next profile once the target is reached, without stopping
    After,
}

/// The drive registers making up a motion task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileField {
    /// Target position, in µm
    Position,
    /// Velocity limit. Always 0, the table defines the velocity.
    Velocity,
    /// Task control word
    Control,
    /// Acceleration time, in ms
    Acceleration,
    /// Deceleration time, in ms
    Deceleration,
    /// Profile table
    Table,
    /// Device task number of the next task
    Next,
    /// Delay before the next task, in ms
    NextDelay,
}

impl ProfileField {
    /// All fields, in upload order
    pub const ALL: [ProfileField; 8] = [
        ProfileField::Position,
        ProfileField::Velocity,
        ProfileField::Control,
        ProfileField::Acceleration,
        ProfileField::Deceleration,
        ProfileField::Table,
        ProfileField::Next,
        ProfileField::NextDelay,
    ];

    /// The object index of the task 0 register holding this field
    pub fn register(&self) -> u16 {
        match self {
            ProfileField::Position => motion_task::TASK_POSITION,
            ProfileField::Velocity => motion_task::TASK_VELOCITY,
            ProfileField::Control => motion_task::TASK_CONTROL,
            ProfileField::Acceleration => motion_task::TASK_ACCELERATION,
            ProfileField::Deceleration => motion_task::TASK_DECELERATION,
            ProfileField::Table => motion_task::TASK_TABLE,
            ProfileField::Next => motion_task::TASK_NEXT,
            ProfileField::NextDelay => motion_task::TASK_NEXT_DELAY,
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Upload state of one register of a profile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldState {
    /// Never written
    Unwritten,
    /// Changed locally, to be written on the next flush
    Changed,
    /// A write is queued or in flight
    Writing,
    /// The last write failed. The field is not retried until it changes again.
    Invalid,
    /// The drive holds the current value
    Written,
}

/// A motion profile
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Profile {
    task: u16,
    in_use: bool,
    table: u32,
    position_type: PositionType,
    position: f64,
    duration: f64,
    next: Option<ProfileId>,
    delay: f64,
    blend: BlendType,
    fields: [FieldState; 8],
}

impl Profile {
    fn new(task: u16, table: u32) -> Self {
        Self {
            task,
            in_use: false,
            table,
            position_type: PositionType::Absolute,
            position: 0.0,
            duration: 1.0,
            next: None,
            delay: 0.0,
            blend: BlendType::None,
            fields: [FieldState::Unwritten; 8],
        }
    }

    fn mark_all_changed(&mut self) {
        self.fields = [FieldState::Changed; 8];
    }

    fn mark(&mut self, field: ProfileField) {
        self.fields[field.slot()] = FieldState::Changed;
    }

    /// The device motion task this profile is stored in
    pub fn task(&self) -> u16 {
        self.task
    }

    /// True if the profile was created and not destroyed
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// The profile table
    pub fn table(&self) -> u32 {
        self.table
    }

    /// How [`Profile::position`] is interpreted
    pub fn position_type(&self) -> PositionType {
        self.position_type
    }

    /// Target position, in metres
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Duration of the move, in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// The profile started when this one completes
    pub fn next(&self) -> Option<ProfileId> {
        self.next
    }

    /// Delay before the next profile starts, in seconds
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// How the next profile is blended in
    pub fn blend(&self) -> BlendType {
        self.blend
    }

    /// Upload state of a register
    pub fn field_state(&self, field: ProfileField) -> FieldState {
        self.fields[field.slot()]
    }

    /// True if a register changed since it was last written
    pub fn has_changes_pending(&self) -> bool {
        self.fields.contains(&FieldState::Changed)
    }

    /// The task control word
    pub fn control_word(&self) -> u32 {
        let mut control = match self.position_type {
            PositionType::Absolute => 0,
            PositionType::RelativeActual => 0x01 | 0x04,
            PositionType::RelativeTarget => 0x01 | 0x02,
        };
        if self.next.is_some() {
            control |= 0x08;
        }
        control |= match self.blend {
            BlendType::None => 0,
            BlendType::Before => 0x100 | 0x10,
            BlendType::After => 0x10,
        };
        // Table mode, SI units
        control | 0x200 | 0x2000
    }

    /// Acceleration time in ms. Half of the move is spent accelerating.
    fn acceleration_ms(&self) -> i32 {
        (self.duration * 1000.0 / 2.0 + 0.5) as i32
    }
}

fn check_position(position: f64) -> Result<(), SledError> {
    if !position.is_finite() {
        return Err(SledError::InvalidValue {
            name: "position",
            value: position,
        });
    }
    Ok(())
}

/// A move has to take some time
fn check_duration(duration: f64) -> Result<(), SledError> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(SledError::InvalidValue {
            name: "duration",
            value: duration,
        });
    }
    Ok(())
}

fn check_delay(delay: f64) -> Result<(), SledError> {
    if !(delay.is_finite() && delay >= 0.0) {
        return Err(SledError::InvalidValue {
            name: "delay",
            value: delay,
        });
    }
    Ok(())
}

/// The fixed table of motion profiles
#[derive(Debug)]
pub struct ProfileStore {
    profiles: Vec<Profile>,
    task_base: u16,
    default_table: u32,
    /// The device task currently copied into task 0, if known
    loaded_task: Option<u16>,
}

impl ProfileStore {
    /// Create a store with all slots free
    ///
    /// Slots which would map beyond the last device task are left out.
    pub fn new(config: &ProfilesConfig) -> Self {
        let capacity = config.capacity.min(config.max_capacity());
        if capacity < config.capacity {
            log::warn!(
                "Only {capacity} of {} profile slots fit above task {}",
                config.capacity,
                config.task_base
            );
        }
        let profiles = (0..capacity)
            .map(|slot| Profile::new(config.task_base + slot as u16, config.default_table))
            .collect();
        Self {
            profiles,
            task_base: config.task_base,
            default_table: config.default_table,
            loaded_task: None,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.profiles.len()
    }

    /// Access a profile which is in use
    pub fn get(&self, id: ProfileId) -> Result<&Profile, SledError> {
        match self.profiles.get(id) {
            None => Err(SledError::InvalidProfile { id }),
            Some(p) if !p.in_use => Err(SledError::ProfileNotInUse { id }),
            Some(p) => Ok(p),
        }
    }

    fn get_mut(&mut self, id: ProfileId) -> Result<&mut Profile, SledError> {
        match self.profiles.get_mut(id) {
            None => Err(SledError::InvalidProfile { id }),
            Some(p) if !p.in_use => Err(SledError::ProfileNotInUse { id }),
            Some(p) => Ok(p),
        }
    }

    /// Allocate the first free slot
    ///
    /// The profile starts out with default values and every register marked changed.
    pub fn create(&mut self) -> Result<ProfileId, SledError> {
        let id = self
            .profiles
            .iter()
            .position(|p| !p.in_use)
            .ok_or(SledError::ProfilesExhausted)?;
        let mut profile = Profile::new(self.task_base + id as u16, self.default_table);
        profile.in_use = true;
        profile.mark_all_changed();
        self.profiles[id] = profile;
        log::debug!("Created profile {id}");
        Ok(id)
    }

    /// Allocate a profile with an absolute target
    pub fn create_pt(&mut self, position: f64, duration: f64) -> Result<ProfileId, SledError> {
        check_position(position)?;
        check_duration(duration)?;
        let id = self.create()?;
        let profile = &mut self.profiles[id];
        profile.position = position;
        profile.duration = duration;
        Ok(id)
    }

    /// Free a profile
    pub fn destroy(&mut self, id: ProfileId) -> Result<(), SledError> {
        self.get_mut(id)?.in_use = false;
        log::debug!("Destroyed profile {id}");
        Ok(())
    }

    /// Set the target of a profile
    ///
    /// Only the registers whose value changes are marked for upload.
    pub fn set_target(
        &mut self,
        id: ProfileId,
        position_type: PositionType,
        position: f64,
        duration: f64,
    ) -> Result<(), SledError> {
        let profile = self.get_mut(id)?;
        check_position(position)?;
        check_duration(duration)?;
        if profile.position_type != position_type {
            profile.position_type = position_type;
            profile.mark(ProfileField::Control);
        }
        if profile.position != position {
            profile.position = position;
            profile.mark(ProfileField::Position);
        }
        if profile.duration != duration {
            profile.duration = duration;
            profile.mark(ProfileField::Acceleration);
            profile.mark(ProfileField::Deceleration);
        }
        Ok(())
    }

    /// Chain a profile to another one, or unchain it with `next = None`
    pub fn set_next(
        &mut self,
        id: ProfileId,
        next: Option<ProfileId>,
        delay: f64,
        blend: BlendType,
    ) -> Result<(), SledError> {
        self.get(id)?;
        check_delay(delay)?;
        if let Some(next_id) = next {
            if self.get(next_id).is_err() {
                return Err(SledError::InvalidNextProfile { id: next_id });
            }
        }
        let profile = self.get_mut(id)?;
        if profile.next != next || profile.delay != delay || profile.blend != blend {
            profile.next = next;
            profile.delay = delay;
            profile.blend = blend;
            profile.mark(ProfileField::Control);
            profile.mark(ProfileField::Next);
            profile.mark(ProfileField::NextDelay);
        }
        Ok(())
    }

    /// Select the profile table
    pub fn set_table(&mut self, id: ProfileId, table: u32) -> Result<(), SledError> {
        let profile = self.get_mut(id)?;
        if profile.table != table {
            profile.table = table;
            profile.mark(ProfileField::Table);
        }
        Ok(())
    }

    /// True if the profile has registers waiting to be uploaded
    pub fn has_changes_pending(&self, id: ProfileId) -> Result<bool, SledError> {
        Ok(self.get(id)?.has_changes_pending())
    }

    /// Mark every register of every profile in use for upload
    ///
    /// Used when the drive may have lost its volatile task table. The content of task 0 is
    /// unknown afterwards.
    pub fn reset(&mut self) {
        log::debug!("Marking all profiles for upload");
        for profile in self.profiles.iter_mut().filter(|p| p.in_use) {
            profile.mark_all_changed();
        }
        self.loaded_task = None;
    }

    /// The device task which a profile uses as its next task. 0 means none.
    fn next_task(&self, profile: &Profile) -> u32 {
        profile
            .next
            .and_then(|n| self.profiles.get(n))
            .map(|p| p.task as u32)
            .unwrap_or(0)
    }

    fn field_value(&self, profile: &Profile, field: ProfileField) -> u32 {
        match field {
            ProfileField::Position => (profile.position * 1_000_000.0) as i32 as u32,
            ProfileField::Velocity => 0,
            ProfileField::Control => profile.control_word(),
            ProfileField::Acceleration => profile.acceleration_ms() as u32,
            // The drive finishes one ms late
            ProfileField::Deceleration => profile.acceleration_ms().saturating_sub(1).max(0) as u32,
            ProfileField::Table => profile.table,
            ProfileField::Next => self.next_task(profile),
            ProfileField::NextDelay => (profile.delay * 1000.0) as i32 as u32,
        }
    }

    fn copy_task(from: u16, to: u16) -> Action {
        let value = (from as u32 & 0xFFFF) | ((to as u32) << 16);
        Action::Enqueue(SdoRequest::write(motion_task::COPY_MOTION_TASK, 0, value, 4))
    }

    /// Queue the writes uploading every changed register of a profile
    ///
    /// The profile reached through the next pointers is flushed as well, until a profile without
    /// pending changes is reached. Nothing is queued when the profile has no pending changes.
    pub fn write_pending_changes(&mut self, id: ProfileId, out: &mut Outbox) -> Result<(), SledError> {
        self.get(id)?;
        let mut current = Some(id);
        while let Some(slot) = current {
            let Ok(profile) = self.get(slot) else {
                log::warn!("Next profile {slot} is not in use, not uploading it");
                break;
            };
            if !profile.has_changes_pending() {
                break;
            }
            let profile = *profile;
            log::debug!("Uploading profile {slot} to task {}", profile.task);

            if self.loaded_task != Some(profile.task) {
                out.push_back(Self::copy_task(profile.task, 0));
                self.loaded_task = Some(profile.task);
            }

            for field in ProfileField::ALL {
                if profile.field_state(field) != FieldState::Changed {
                    continue;
                }
                // Without a next task the control word disables chaining
                if profile.next.is_none()
                    && matches!(field, ProfileField::Next | ProfileField::NextDelay)
                {
                    self.profiles[slot].fields[field.slot()] = FieldState::Written;
                    continue;
                }
                let request = SdoRequest::write(
                    field.register(),
                    motion_task::TASK_SUB,
                    self.field_value(&profile, field),
                    4,
                )
                .with_continuation(Continuation::ProfileField { slot, field });
                self.profiles[slot].fields[field.slot()] = FieldState::Writing;
                out.push_back(Action::Enqueue(request));
            }

            out.push_back(Self::copy_task(0, profile.task));
            current = profile.next;
        }
        Ok(())
    }

    /// Record the outcome of a register write
    ///
    /// Only a field which is still being written is updated, so a change made while the write
    /// was in flight is not lost.
    pub fn complete(&mut self, slot: ProfileId, field: ProfileField, outcome: SdoOutcome) {
        let Some(profile) = self.profiles.get_mut(slot) else {
            return;
        };
        let state = &mut profile.fields[field.slot()];
        if *state != FieldState::Writing {
            return;
        }
        match outcome {
            Ok(_) => *state = FieldState::Written,
            Err(failure) => {
                log::error!("Uploading {field:?} of profile {slot} failed: {failure}");
                *state = FieldState::Invalid;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use assertables::*;
    use sled_common::sdo::{AbortCode, RawAbortCode};

    use super::*;
    use crate::sdo_request::{SdoFailure, SdoKind};

    fn store() -> ProfileStore {
        ProfileStore::new(&ProfilesConfig::default())
    }

    /// Complete every queued profile write with `outcome`, returning the writes in order
    fn complete_all(
        store: &mut ProfileStore,
        out: &mut Outbox,
        outcome: SdoOutcome,
    ) -> Vec<(u16, u32)> {
        let mut writes = Vec::new();
        for action in out.drain(..) {
            if let Action::Enqueue(SdoRequest {
                index,
                kind: SdoKind::Write { value, .. },
                continuation,
                ..
            }) = action
            {
                writes.push((index, value));
                if let Continuation::ProfileField { slot, field } = continuation {
                    store.complete(slot, field, outcome);
                }
            }
        }
        writes
    }

    #[test]
    fn test_create_marks_all_changed() {
        let mut store = store();
        let id = store.create().unwrap();
        assert_eq!(0, id);
        let profile = store.get(id).unwrap();
        assert_eq!(201, profile.task());
        assert_eq!(2, profile.table());
        for field in ProfileField::ALL {
            assert_eq!(FieldState::Changed, profile.field_state(field));
        }
        assert_eq!(1, store.create().unwrap());
    }

    #[test]
    fn test_invalid_ids() {
        let mut store = store();
        assert_eq!(Err(SledError::InvalidProfile { id: 99 }), store.destroy(99));
        assert_eq!(Err(SledError::ProfileNotInUse { id: 3 }), store.set_table(3, 1));
        let id = store.create().unwrap();
        assert_eq!(
            Err(SledError::InvalidNextProfile { id: 5 }),
            store.set_next(id, Some(5), 0.0, BlendType::After)
        );
        store.destroy(id).unwrap();
        assert_eq!(Err(SledError::ProfileNotInUse { id }), store.destroy(id));
    }

    #[test]
    fn test_exhausted() {
        let mut store = ProfileStore::new(&ProfilesConfig {
            capacity: 2,
            ..Default::default()
        });
        store.create().unwrap();
        let id = store.create().unwrap();
        assert_eq!(Err(SledError::ProfilesExhausted), store.create());
        store.destroy(id).unwrap();
        assert_eq!(id, store.create().unwrap());
    }

    #[test]
    fn test_unusable_values_rejected() {
        let mut store = store();
        for duration in [0.0, -1e10, f64::NAN, f64::INFINITY] {
            assert_matches!(
                store.create_pt(0.1, duration),
                Err(SledError::InvalidValue { name: "duration", .. })
            );
        }
        assert_matches!(
            store.create_pt(f64::NAN, 1.0),
            Err(SledError::InvalidValue { name: "position", .. })
        );
        // Nothing was allocated by the refused calls
        assert_eq!(0, store.create().unwrap());

        let id = store.create_pt(0.1, 1.0).unwrap();
        let before = *store.get(id).unwrap();
        assert_matches!(
            store.set_target(id, PositionType::RelativeActual, 0.2, -1e10),
            Err(SledError::InvalidValue { .. })
        );
        assert_matches!(
            store.set_target(id, PositionType::Absolute, f64::NEG_INFINITY, 1.0),
            Err(SledError::InvalidValue { .. })
        );
        assert_matches!(
            store.set_next(id, Some(0), f64::NAN, BlendType::Before),
            Err(SledError::InvalidValue { name: "delay", .. })
        );
        assert_eq!(&before, store.get(id).unwrap());
    }

    #[test]
    fn test_shortest_move_does_not_underflow() {
        let mut store = store();
        let id = store.create_pt(0.0, 1e-4).unwrap();
        let profile = store.get(id).unwrap();
        assert_eq!(0, store.field_value(profile, ProfileField::Acceleration));
        assert_eq!(0, store.field_value(profile, ProfileField::Deceleration));

        store
            .set_target(id, PositionType::Absolute, 0.0, 1e12)
            .unwrap();
        let profile = store.get(id).unwrap();
        assert_eq!(i32::MAX as u32, store.field_value(profile, ProfileField::Acceleration));
        assert_eq!(i32::MAX as u32 - 1, store.field_value(profile, ProfileField::Deceleration));
    }

    #[test]
    fn test_slots_limited_to_last_task() {
        let store = ProfileStore::new(&ProfilesConfig {
            capacity: 10,
            task_base: 65530,
            ..Default::default()
        });
        assert_eq!(6, store.capacity());
    }

    #[test]
    fn test_upload_sequence() {
        let mut store = store();
        let id = store.create_pt(0.1, 1.0).unwrap();
        let mut out = Outbox::new();
        store.write_pending_changes(id, &mut out).unwrap();

        let writes = complete_all(&mut store, &mut out, Ok(0));
        assert_eq!(
            vec![
                (0x2082, 201),
                (0x35BE, 100_000),
                (0x35BF, 0),
                (0x35B9, 0x2200),
                (0x35B7, 500),
                (0x35BA, 499),
                (0x35B8, 2),
                (0x2082, 201 << 16),
            ],
            writes
        );
        let profile = store.get(id).unwrap();
        for field in ProfileField::ALL {
            assert_eq!(FieldState::Written, profile.field_state(field));
        }
        assert!(!store.has_changes_pending(id).unwrap());

        // Nothing left to write
        store.write_pending_changes(id, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_set_target_idempotent() {
        let mut store = store();
        let id = store.create_pt(0.1, 1.0).unwrap();
        let mut out = Outbox::new();
        store.write_pending_changes(id, &mut out).unwrap();
        complete_all(&mut store, &mut out, Ok(0));

        store
            .set_target(id, PositionType::Absolute, 0.1, 1.0)
            .unwrap();
        store
            .set_next(id, None, 0.0, BlendType::None)
            .unwrap();
        store.set_table(id, 2).unwrap();
        assert!(!store.has_changes_pending(id).unwrap());

        store
            .set_target(id, PositionType::Absolute, 0.2, 2.0)
            .unwrap();
        let profile = store.get(id).unwrap();
        assert_eq!(FieldState::Changed, profile.field_state(ProfileField::Position));
        assert_eq!(FieldState::Changed, profile.field_state(ProfileField::Acceleration));
        assert_eq!(FieldState::Changed, profile.field_state(ProfileField::Deceleration));
        assert_eq!(FieldState::Written, profile.field_state(ProfileField::Control));

        // Task 201 is still loaded, so no copy into task 0
        store.write_pending_changes(id, &mut out).unwrap();
        let writes = complete_all(&mut store, &mut out, Ok(0));
        assert_eq!(
            vec![
                (0x35BE, 200_000),
                (0x35B7, 1000),
                (0x35BA, 999),
                (0x2082, 201 << 16)
            ],
            writes
        );
    }

    #[test]
    fn test_relative_position_encoding() {
        let mut store = store();
        let id = store.create().unwrap();
        store
            .set_target(id, PositionType::RelativeTarget, -0.5, 0.3)
            .unwrap();
        let profile = store.get(id).unwrap();
        assert_eq!(0x2203, profile.control_word());
        assert_eq!(-500_000, store.field_value(profile, ProfileField::Position) as i32);
        assert_eq!(150, store.field_value(profile, ProfileField::Acceleration));
    }

    #[test]
    fn test_chain_upload_terminates() {
        let mut store = store();
        let a = store.create_pt(0.1, 0.5).unwrap();
        let b = store.create_pt(0.0, 0.5).unwrap();
        store.set_next(a, Some(b), 0.0, BlendType::After).unwrap();
        store.set_next(b, Some(a), 0.0, BlendType::After).unwrap();

        let mut out = Outbox::new();
        store.write_pending_changes(a, &mut out).unwrap();
        let writes = complete_all(&mut store, &mut out, Ok(0));

        // Both tasks are loaded into task 0, written and copied back, once each
        let copies: Vec<u32> = writes
            .iter()
            .filter(|(index, _)| *index == 0x2082)
            .map(|(_, value)| *value)
            .collect();
        assert_eq!(vec![201, 201 << 16, 202, 202 << 16], copies);
        assert_contains!(writes, &(0x35BC, 202));
        assert_contains!(writes, &(0x35BC, 201));
        assert_contains!(writes, &(0x35B9, 0x2218));
        assert!(!store.has_changes_pending(a).unwrap());
        assert!(!store.has_changes_pending(b).unwrap());
    }

    #[test]
    fn test_failed_write_marks_invalid() {
        let mut store = store();
        let id = store.create().unwrap();
        let mut out = Outbox::new();
        store.write_pending_changes(id, &mut out).unwrap();
        let abort = SdoFailure::Aborted(RawAbortCode::Valid(AbortCode::NoSuchObject));
        complete_all(&mut store, &mut out, Err(abort));

        let profile = store.get(id).unwrap();
        assert_eq!(FieldState::Invalid, profile.field_state(ProfileField::Position));
        // Not retried until changed again
        assert!(!profile.has_changes_pending());
    }

    #[test]
    fn test_change_during_write_survives() {
        let mut store = store();
        let id = store.create().unwrap();
        let mut out = Outbox::new();
        store.write_pending_changes(id, &mut out).unwrap();
        store
            .set_target(id, PositionType::Absolute, 0.3, 1.0)
            .unwrap();
        complete_all(&mut store, &mut out, Ok(0));
        let profile = store.get(id).unwrap();
        assert_eq!(FieldState::Changed, profile.field_state(ProfileField::Position));
        assert_eq!(FieldState::Written, profile.field_state(ProfileField::Table));
    }

    #[test]
    fn test_reset_forgets_loaded_task() {
        let mut store = store();
        let id = store.create().unwrap();
        let mut out = Outbox::new();
        store.write_pending_changes(id, &mut out).unwrap();
        complete_all(&mut store, &mut out, Ok(0));

        store.reset();
        assert!(store.has_changes_pending(id).unwrap());
        store.write_pending_changes(id, &mut out).unwrap();
        assert_eq!(
            Some(&Action::Enqueue(SdoRequest::write(0x2082, 0, 201, 4))),
            out.front()
        );
    }
}
