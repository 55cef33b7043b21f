//! Per-field write table
//!
//! Every replicated field is written through one function that
//! (a) checks the writer holds authority, (b) stores the value,
//! (c) runs the field's side effect, (d) marks it dirty for replication.
//! Received values take the same path minus (a) and (d).

use tether_core::{Anchor, PeerId, PhysicsBody, Quat, Vec3};
use tether_wire::{FieldMask, FieldValues};
use tracing::{debug, trace};

use crate::NetworkedObject;

/// Replicated field identifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Holder,
    Anchor,
    OffsetRotation,
    OffsetPosition,
    Frozen,
    Position,
    Rotation,
    LinearVelocity,
    AngularVelocity,
}

impl Field {
    /// All fields in wire order
    pub const ALL: [Field; 9] = [
        Field::Holder,
        Field::Anchor,
        Field::OffsetRotation,
        Field::OffsetPosition,
        Field::Frozen,
        Field::Position,
        Field::Rotation,
        Field::LinearVelocity,
        Field::AngularVelocity,
    ];

    /// Mask bit for this field
    pub fn bit(self) -> u16 {
        match self {
            Field::Holder => FieldMask::HOLDER,
            Field::Anchor => FieldMask::ANCHOR,
            Field::OffsetRotation => FieldMask::OFFSET_ROTATION,
            Field::OffsetPosition => FieldMask::OFFSET_POSITION,
            Field::Frozen => FieldMask::FROZEN,
            Field::Position => FieldMask::POSITION,
            Field::Rotation => FieldMask::ROTATION,
            Field::LinearVelocity => FieldMask::LINEAR_VELOCITY,
            Field::AngularVelocity => FieldMask::ANGULAR_VELOCITY,
        }
    }
}

/// A value destined for one replicated field
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldWrite {
    Holder(Option<PeerId>),
    Anchor(Anchor),
    OffsetRotation(Quat),
    OffsetPosition(Vec3),
    Frozen(bool),
    Position(Vec3),
    Rotation(Quat),
    LinearVelocity(Vec3),
    AngularVelocity(Vec3),
}

impl FieldWrite {
    pub fn field(&self) -> Field {
        match self {
            FieldWrite::Holder(_) => Field::Holder,
            FieldWrite::Anchor(_) => Field::Anchor,
            FieldWrite::OffsetRotation(_) => Field::OffsetRotation,
            FieldWrite::OffsetPosition(_) => Field::OffsetPosition,
            FieldWrite::Frozen(_) => Field::Frozen,
            FieldWrite::Position(_) => Field::Position,
            FieldWrite::Rotation(_) => Field::Rotation,
            FieldWrite::LinearVelocity(_) => Field::LinearVelocity,
            FieldWrite::AngularVelocity(_) => Field::AngularVelocity,
        }
    }

    /// Extract `field` from a received value set
    pub fn from_values(field: Field, v: &FieldValues) -> Self {
        match field {
            Field::Holder => FieldWrite::Holder(v.holder),
            Field::Anchor => FieldWrite::Anchor(v.anchor),
            Field::OffsetRotation => FieldWrite::OffsetRotation(v.offset_rotation),
            Field::OffsetPosition => FieldWrite::OffsetPosition(v.offset_position),
            Field::Frozen => FieldWrite::Frozen(v.frozen),
            Field::Position => FieldWrite::Position(v.position),
            Field::Rotation => FieldWrite::Rotation(v.rotation),
            Field::LinearVelocity => FieldWrite::LinearVelocity(v.linear_velocity),
            Field::AngularVelocity => FieldWrite::AngularVelocity(v.angular_velocity),
        }
    }
}

/// Result of an authoritative write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Writer is not the authority; nothing changed
    Rejected,
    /// Value already current; not marked dirty
    Unchanged,
    /// Stored, side effect run, marked dirty
    Written,
}

impl WriteOutcome {
    #[inline]
    pub fn is_accepted(self) -> bool {
        self != WriteOutcome::Rejected
    }
}

/// Local context a field side effect may touch
pub struct FieldContext<'a, B: PhysicsBody> {
    pub local: PeerId,
    pub allow_theft: bool,
    pub body: &'a mut B,
}

impl NetworkedObject {
    /// Authoritative write. Non-authority writers are a silent no-op.
    pub fn write<B: PhysicsBody>(
        &mut self,
        writer: PeerId,
        write: FieldWrite,
        ctx: &mut FieldContext<'_, B>,
    ) -> WriteOutcome {
        if !self.is_authority(writer) {
            debug!(object = ?self.id(), ?writer, field = ?write.field(), "write rejected: not authority");
            return WriteOutcome::Rejected;
        }
        if !self.store(write) {
            return WriteOutcome::Unchanged;
        }
        self.on_changed(write.field(), ctx);
        self.dirty.insert(write.field().bit());
        WriteOutcome::Written
    }

    /// Apply a value received from the authority
    pub fn apply_remote<B: PhysicsBody>(&mut self, write: FieldWrite, ctx: &mut FieldContext<'_, B>) {
        if self.store(write) {
            self.on_changed(write.field(), ctx);
        }
    }

    /// Returns true if the stored value changed
    fn store(&mut self, write: FieldWrite) -> bool {
        fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        }

        match write {
            FieldWrite::Holder(v) => set(&mut self.holder, v),
            FieldWrite::Anchor(v) => set(&mut self.anchor, v),
            FieldWrite::OffsetRotation(v) => set(&mut self.offset_rotation, v),
            FieldWrite::OffsetPosition(v) => set(&mut self.offset_position, v),
            FieldWrite::Frozen(v) => set(&mut self.frozen, v),
            FieldWrite::Position(v) => set(&mut self.snapshot.position, v),
            FieldWrite::Rotation(v) => set(&mut self.snapshot.rotation, v),
            FieldWrite::LinearVelocity(v) => set(&mut self.snapshot.linear_velocity, v),
            FieldWrite::AngularVelocity(v) => set(&mut self.snapshot.angular_velocity, v),
        }
    }

    /// Side effects, identical on the writer and on receivers
    fn on_changed<B: PhysicsBody>(&mut self, field: Field, ctx: &mut FieldContext<'_, B>) {
        match field {
            Field::Holder => match self.holder {
                None => {
                    self.restore_defaults(ctx.body);
                    debug!(object = ?self.id(), "holder cleared, rest flags restored");
                }
                Some(holder) if holder != ctx.local && !ctx.allow_theft => {
                    self.set_pickupable_local(false);
                    debug!(object = ?self.id(), ?holder, "held remotely, theft disallowed");
                }
                Some(holder) => {
                    trace!(object = ?self.id(), ?holder, "holder changed");
                }
            },
            Field::Frozen => {
                debug!(object = ?self.id(), frozen = self.frozen, "frozen changed");
            }
            _ => {}
        }
    }
}
