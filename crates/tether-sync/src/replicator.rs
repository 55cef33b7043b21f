//! Rigid-body replication
//!
//! The authority captures the six physical channels and writes them into
//! the object only when something changed since the last push. Everyone
//! else snaps the local body to the latest received snapshot; there is no
//! interpolation or extrapolation between updates.

use tether_core::{BodyState, PeerId, PhysicsBody};
use tether_state::{FieldContext, FieldWrite, NetworkedObject};
use tracing::trace;

/// Per-object replication memory
#[derive(Clone, Debug, Default)]
pub struct RigidBodyReplicator {
    last_pushed: Option<BodyState>,
    last_applied: Option<BodyState>,
    epsilon: f32,
}

impl RigidBodyReplicator {
    pub fn new(epsilon: f32) -> Self {
        RigidBodyReplicator {
            last_pushed: None,
            last_applied: None,
            epsilon,
        }
    }

    pub fn last_pushed(&self) -> Option<&BodyState> {
        self.last_pushed.as_ref()
    }

    pub fn last_applied(&self) -> Option<&BodyState> {
        self.last_applied.as_ref()
    }

    /// Forget what was pushed and applied (authority changed hands)
    pub fn reset(&mut self) {
        self.last_pushed = None;
        self.last_applied = None;
    }

    /// Whether the body has moved away from the last pushed position
    pub fn has_moved<B: PhysicsBody>(&self, body: &B) -> bool {
        match &self.last_pushed {
            Some(last) => last.position != body.position(),
            None => true,
        }
    }

    /// Scheduled push on the authority. Returns true if the object now
    /// has dirty physics fields; false if the state is unchanged.
    pub fn push<B: PhysicsBody>(
        &mut self,
        obj: &mut NetworkedObject,
        writer: PeerId,
        ctx: &mut FieldContext<'_, B>,
    ) -> bool {
        if !obj.is_authority(writer) {
            return false;
        }
        let state = ctx.body.capture();
        if let Some(last) = &self.last_pushed {
            if !state.differs(last, self.epsilon) {
                trace!(object = ?obj.id(), "push suppressed, state unchanged");
                return false;
            }
        }
        write_state(obj, writer, &state, ctx);
        self.last_pushed = Some(state);
        true
    }

    /// Capture and store the current state unconditionally. The caller
    /// emits a full forced frame afterwards.
    pub fn force_capture<B: PhysicsBody>(
        &mut self,
        obj: &mut NetworkedObject,
        writer: PeerId,
        ctx: &mut FieldContext<'_, B>,
    ) -> bool {
        if !obj.is_authority(writer) {
            return false;
        }
        let state = ctx.body.capture();
        write_state(obj, writer, &state, ctx);
        self.last_pushed = Some(state);
        true
    }

    /// Snap the local body to the object's snapshot, channel by channel,
    /// touching only channels that differ from what was last applied.
    pub fn apply<B: PhysicsBody>(&mut self, obj: &NetworkedObject, body: &mut B) -> bool {
        let target = *obj.snapshot();
        let last = self.last_applied;
        if last == Some(target) {
            return false;
        }

        let changed = |pick: fn(&BodyState) -> [f32; 4]| match &last {
            Some(prev) => pick(prev) != pick(&target),
            None => true,
        };

        if changed(|s| [s.position.x, s.position.y, s.position.z, 0.0]) {
            body.set_position(target.position);
        }
        if changed(|s| [s.rotation.w, s.rotation.x, s.rotation.y, s.rotation.z]) {
            body.set_rotation(target.rotation);
        }
        if changed(|s| [s.linear_velocity.x, s.linear_velocity.y, s.linear_velocity.z, 0.0]) {
            body.set_linear_velocity(target.linear_velocity);
        }
        if changed(|s| [s.angular_velocity.x, s.angular_velocity.y, s.angular_velocity.z, 0.0]) {
            body.set_angular_velocity(target.angular_velocity);
        }

        trace!(object = ?obj.id(), "snapshot applied");
        self.last_applied = Some(target);
        true
    }

    /// Place the body on the object's snapshot, every channel, whatever
    /// was applied before. Used for forced frames.
    pub fn snap<B: PhysicsBody>(&mut self, obj: &NetworkedObject, body: &mut B) {
        let target = *obj.snapshot();
        body.set_position(target.position);
        body.set_rotation(target.rotation);
        body.set_linear_velocity(target.linear_velocity);
        body.set_angular_velocity(target.angular_velocity);
        trace!(object = ?obj.id(), "snapshot forced");
        self.last_applied = Some(target);
    }
}

fn write_state<B: PhysicsBody>(
    obj: &mut NetworkedObject,
    writer: PeerId,
    state: &BodyState,
    ctx: &mut FieldContext<'_, B>,
) {
    obj.write(writer, FieldWrite::Position(state.position), ctx);
    obj.write(writer, FieldWrite::Rotation(state.rotation), ctx);
    obj.write(writer, FieldWrite::LinearVelocity(state.linear_velocity), ctx);
    obj.write(writer, FieldWrite::AngularVelocity(state.angular_velocity), ctx);
}
