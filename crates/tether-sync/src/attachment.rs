//! Attachment tracking
//!
//! While held, only the body's pose relative to the holder's anchor
//! crosses the network. Every non-holder resolves the anchor from its
//! own copy of the holder's avatar and places the body kinematically.

use tether_core::{AnchorResolver, PeerId, PhysicsBody, Pose};
use tether_state::{FieldContext, FieldWrite, NetworkedObject};
use tracing::{debug, trace};

/// Offset of `body` in the frame of `anchor`
pub fn compute_offset(anchor: &Pose, body: &Pose) -> Pose {
    body.relative_to(anchor)
}

/// World pose of a body held at `offset` from `anchor`
pub fn apply_offset(anchor: &Pose, offset: &Pose) -> Pose {
    anchor.compose(offset)
}

/// Result of one late-step follow
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FollowOutcome {
    /// Body placed at the resolved pose
    Placed(Pose),
    /// Object is not held by a remote peer; nothing to do
    Idle,
    /// The holder no longer resolves; treat as an implicit release
    HolderMissing(PeerId),
}

/// Anchor-relative placement for held objects
#[derive(Clone, Debug, Default)]
pub struct AttachmentTracker {
    captures: u64,
}

impl AttachmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of offsets captured by this peer
    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// Holder side: recompute the offset from the current anchor and body
    /// poses and write it. Returns false if not authority or the anchor
    /// cannot be resolved.
    pub fn capture_offset<B: PhysicsBody, R: AnchorResolver>(
        &mut self,
        obj: &mut NetworkedObject,
        writer: PeerId,
        anchors: &R,
        ctx: &mut FieldContext<'_, B>,
    ) -> bool {
        if !obj.is_authority(writer) {
            return false;
        }
        let Some(anchor) = anchors.anchor_pose(writer, obj.anchor()) else {
            debug!(object = ?obj.id(), anchor = ?obj.anchor(), "cannot resolve own anchor");
            return false;
        };

        let offset = compute_offset(&anchor, &ctx.body.pose());
        obj.write(writer, FieldWrite::OffsetRotation(offset.rotation), ctx);
        obj.write(writer, FieldWrite::OffsetPosition(offset.position), ctx);
        self.captures += 1;
        trace!(object = ?obj.id(), ?offset, "offset captured");
        true
    }

    /// Non-holder side: force the body kinematic and place it at
    /// `anchor * offset` using the local resolution of the holder's anchor.
    pub fn follow<B: PhysicsBody, R: AnchorResolver>(
        &self,
        obj: &NetworkedObject,
        local: PeerId,
        anchors: &R,
        body: &mut B,
    ) -> FollowOutcome {
        let holder = match obj.holder() {
            Some(holder) if holder != local && obj.is_held() => holder,
            _ => return FollowOutcome::Idle,
        };
        if !anchors.is_present(holder) {
            return FollowOutcome::HolderMissing(holder);
        }
        let Some(anchor) = anchors.anchor_pose(holder, obj.anchor()) else {
            return FollowOutcome::HolderMissing(holder);
        };

        if !body.is_kinematic() {
            body.set_kinematic(true);
        }
        let pose = apply_offset(&anchor, &obj.offset());
        body.move_to(pose);
        FollowOutcome::Placed(pose)
    }
}
