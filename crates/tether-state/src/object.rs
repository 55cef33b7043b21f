//! Networked object record

use tether_core::{Anchor, BodyFlags, BodyState, ObjectId, PeerId, PhysicsBody, Pose, Quat, Vec3};
use tether_wire::{FieldMask, FieldValues, FrameKind, SyncFrame, SyncHeader};

/// Effective mode of an object as seen by one peer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Not held; free-simulated and replicated by the authority
    Free,
    /// Held by the local peer
    HeldLocal,
    /// Held by another peer; follows that peer's anchor
    HeldRemote(PeerId),
    /// All per-tick work suspended
    Frozen,
}

impl Mode {
    #[inline]
    pub fn is_held(self) -> bool {
        matches!(self, Mode::HeldLocal | Mode::HeldRemote(_))
    }
}

/// Rest-state captured once at creation, restored whenever holding ends
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestDefaults {
    pub flags: BodyFlags,
    pub pose: Pose,
}

/// One networked physical object.
///
/// Replicated fields change only through [`NetworkedObject::write`] on the
/// authority or [`NetworkedObject::ingest`] on everyone else.
#[derive(Clone, Debug)]
pub struct NetworkedObject {
    id: ObjectId,
    /// Local view of the write authority
    authority: PeerId,

    // Replicated
    pub(crate) holder: Option<PeerId>,
    pub(crate) anchor: Anchor,
    pub(crate) offset_rotation: Quat,
    pub(crate) offset_position: Vec3,
    pub(crate) frozen: bool,
    pub(crate) snapshot: BodyState,

    // Local
    defaults: RestDefaults,
    pub(crate) pickupable: bool,
    pub(crate) dirty: FieldMask,
    next_seq: u32,
    pub(crate) last_seen: Option<(PeerId, u32)>,
}

impl NetworkedObject {
    /// Create an object at its rest pose with `authority` as initial writer
    pub fn new(id: ObjectId, authority: PeerId, defaults: RestDefaults) -> Self {
        NetworkedObject {
            id,
            authority,
            holder: None,
            anchor: Anchor::None,
            offset_rotation: Quat::IDENTITY,
            offset_position: Vec3::ZERO,
            frozen: false,
            snapshot: BodyState::at_rest(defaults.pose),
            defaults,
            pickupable: defaults.flags.pickupable,
            dirty: FieldMask::NONE,
            next_seq: 0,
            last_seen: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn authority(&self) -> PeerId {
        self.authority
    }

    pub fn is_authority(&self, peer: PeerId) -> bool {
        self.authority == peer
    }

    /// Record a handoff of write authority. Clears the stale-frame guard
    /// and pending dirty fields, which belonged to the previous writer.
    pub fn set_authority(&mut self, authority: PeerId) {
        if self.authority != authority {
            self.authority = authority;
            self.last_seen = None;
            self.dirty.clear();
        }
    }

    pub fn holder(&self) -> Option<PeerId> {
        self.holder
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn offset(&self) -> Pose {
        Pose::new(self.offset_position, self.offset_rotation)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some() && self.anchor.is_some()
    }

    /// Last known authoritative free-body state
    pub fn snapshot(&self) -> &BodyState {
        &self.snapshot
    }

    pub fn defaults(&self) -> &RestDefaults {
        &self.defaults
    }

    pub fn set_default_flags(&mut self, flags: BodyFlags) {
        self.defaults.flags = flags;
    }

    /// Whether the local input system may offer this object for grabbing
    pub fn is_pickupable(&self) -> bool {
        self.pickupable
    }

    pub(crate) fn set_pickupable_local(&mut self, pickupable: bool) {
        self.pickupable = pickupable;
    }

    /// Change whether the object may be picked up at all
    pub fn set_pickupable(&mut self, pickupable: bool) {
        self.defaults.flags.pickupable = pickupable;
        self.pickupable = pickupable;
    }

    /// Put the body's kinematic and gravity flags, and local pickupability,
    /// back to the rest defaults
    pub fn restore_defaults<B: PhysicsBody>(&mut self, body: &mut B) {
        let flags = self.defaults.flags;
        body.set_kinematic(flags.kinematic);
        body.set_gravity_enabled(flags.gravity);
        self.pickupable = flags.pickupable;
    }

    pub fn dirty(&self) -> FieldMask {
        self.dirty
    }

    /// Effective mode for `local`; frozen and held never coexist
    pub fn mode(&self, local: PeerId) -> Mode {
        if self.frozen {
            return Mode::Frozen;
        }
        match self.holder {
            Some(peer) if self.anchor.is_some() => {
                if peer == local {
                    Mode::HeldLocal
                } else {
                    Mode::HeldRemote(peer)
                }
            }
            _ => Mode::Free,
        }
    }

    pub fn values(&self) -> FieldValues {
        FieldValues {
            holder: self.holder,
            anchor: self.anchor,
            offset_rotation: self.offset_rotation,
            offset_position: self.offset_position,
            frozen: self.frozen,
            position: self.snapshot.position,
            rotation: self.snapshot.rotation,
            linear_velocity: self.snapshot.linear_velocity,
            angular_velocity: self.snapshot.angular_velocity,
        }
    }

    fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    /// Build a delta frame from dirty fields and clear them.
    /// Returns `None` when nothing is dirty.
    pub fn take_delta(&mut self, sender: PeerId) -> Option<SyncFrame> {
        if self.dirty.is_empty() || sender != self.authority {
            return None;
        }
        let mask = self.dirty;
        self.dirty.clear();
        Some(self.build_frame(FrameKind::Delta, mask, sender))
    }

    /// Build a frame carrying every field, regardless of dirtiness
    pub fn take_forced(&mut self, sender: PeerId) -> SyncFrame {
        self.dirty.clear();
        self.build_frame(FrameKind::Forced, FieldMask::all(), sender)
    }

    /// Announce that `sender` now holds write authority
    pub fn take_transfer(&mut self, sender: PeerId) -> SyncFrame {
        let seq = self.take_seq();
        SyncFrame::transfer(self.id, sender, seq)
    }

    fn build_frame(&mut self, kind: FrameKind, mask: FieldMask, sender: PeerId) -> SyncFrame {
        let seq = self.take_seq();
        let mut header = SyncHeader::new(kind, self.id, sender, seq);
        header.mask = mask;
        SyncFrame::new(header, self.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> NetworkedObject {
        NetworkedObject::new(
            ObjectId::new(1),
            PeerId::new(1),
            RestDefaults {
                flags: BodyFlags::default(),
                pose: Pose::IDENTITY,
            },
        )
    }

    #[test]
    fn test_new_object_is_free() {
        let obj = object();
        assert_eq!(obj.mode(PeerId::new(1)), Mode::Free);
        assert_eq!(obj.holder(), None);
        assert!(obj.is_pickupable());
        assert!(obj.dirty().is_empty());
    }

    #[test]
    fn test_mode_is_function_of_fields() {
        let mut obj = object();
        let a = PeerId::new(1);
        let b = PeerId::new(2);

        obj.holder = Some(a);
        obj.anchor = Anchor::Left;
        assert_eq!(obj.mode(a), Mode::HeldLocal);
        assert_eq!(obj.mode(b), Mode::HeldRemote(a));

        // holder without an anchor is not held
        obj.anchor = Anchor::None;
        assert_eq!(obj.mode(a), Mode::Free);

        obj.holder = None;
        obj.frozen = true;
        assert_eq!(obj.mode(b), Mode::Frozen);
    }

    #[test]
    fn test_delta_requires_dirty_and_authority() {
        let mut obj = object();
        assert!(obj.take_delta(PeerId::new(1)).is_none());

        obj.dirty.insert(FieldMask::POSITION);
        assert!(obj.take_delta(PeerId::new(2)).is_none());

        let frame = obj.take_delta(PeerId::new(1)).unwrap();
        assert_eq!(frame.mask(), FieldMask::new(FieldMask::POSITION));
        assert!(obj.dirty().is_empty());
    }

    #[test]
    fn test_sequence_increments_per_frame() {
        let mut obj = object();
        let me = PeerId::new(1);

        let first = obj.take_forced(me);
        let second = obj.take_forced(me);
        assert_eq!(second.header.seq, first.header.seq + 1);
    }

    #[test]
    fn test_authority_change_clears_guard() {
        let mut obj = object();
        obj.last_seen = Some((PeerId::new(1), 10));
        obj.dirty.insert(FieldMask::HOLDER);

        obj.set_authority(PeerId::new(2));
        assert_eq!(obj.authority(), PeerId::new(2));
        assert!(obj.last_seen.is_none());
        assert!(obj.dirty().is_empty());
    }
}
