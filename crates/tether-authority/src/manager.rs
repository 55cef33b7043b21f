//! Per-object authority manager
//!
//! Owns one object's replicated record and the machinery that keeps it in
//! sync: scheduler, rigid-body replicator and attachment tracker. All
//! lifecycle events go through [`AuthorityManager::handle`], which looks
//! up the transition table and runs the resulting actions in order.

use std::time::Duration;

use tether_core::{
    Anchor, AnchorResolver, PeerId, PhysicsBody, PickupConfig, Pose, Quat, TetherResult, Vec3,
};
use tether_state::{FieldContext, FieldWrite, IngestOutcome, Mode, NetworkedObject};
use tether_sync::{AttachmentTracker, FollowOutcome, RigidBodyReplicator, SyncScheduler};
use tether_wire::{FrameKind, SyncFrame};
use tracing::{debug, info, trace};

use crate::{evaluate_transfer, transition, Action, ObjectEvent, Transition, TransitionContext};
use crate::{DenyReason, TransferDecision};

/// Per-object counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectStats {
    /// Scheduled pushes that wrote changed physics
    pub scheduled_pushes: u64,
    /// Scheduled pushes skipped because nothing changed
    pub suppressed_pushes: u64,
    /// Full frames emitted on release, teleport and freeze
    pub forced_pushes: u64,
    /// Inbound frames whose fields were applied
    pub frames_applied: u64,
    /// Inbound frames dropped as stale or from a non-authority
    pub frames_dropped: u64,
    /// Snapshots snapped onto the local body
    pub snapshots_applied: u64,
    /// Kinematic placements while following a remote holder
    pub placements: u64,
    pub transfers_granted: u64,
    pub transfers_denied: u64,
}

/// Resolver used by events that never touch anchors
struct NoAnchors;

impl AnchorResolver for NoAnchors {
    fn is_present(&self, _: PeerId) -> bool {
        false
    }

    fn anchor_pose(&self, _: PeerId, _: Anchor) -> Option<Pose> {
        None
    }
}

/// Authority, holding and sync control for one networked object on one peer
#[derive(Debug)]
pub struct AuthorityManager {
    local: PeerId,
    config: PickupConfig,
    object: NetworkedObject,
    scheduler: SyncScheduler,
    replicator: RigidBodyReplicator,
    tracker: AttachmentTracker,
    /// Holder should refresh its offset on the next late step
    offset_due: bool,
    /// Forced and transfer frames waiting for the transport
    outbound: Vec<SyncFrame>,
    stats: ObjectStats,
}

impl AuthorityManager {
    /// Create a manager for `object` as seen by `local`
    pub fn new(local: PeerId, object: NetworkedObject, config: PickupConfig) -> TetherResult<Self> {
        config.validate()?;
        Ok(AuthorityManager {
            local,
            scheduler: SyncScheduler::new(&config),
            replicator: RigidBodyReplicator::new(config.motion_epsilon),
            tracker: AttachmentTracker::new(),
            config,
            object,
            offset_due: false,
            outbound: Vec::new(),
            stats: ObjectStats::default(),
        })
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn config(&self) -> &PickupConfig {
        &self.config
    }

    pub fn object(&self) -> &NetworkedObject {
        &self.object
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn replicator(&self) -> &RigidBodyReplicator {
        &self.replicator
    }

    pub fn tracker(&self) -> &AttachmentTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &ObjectStats {
        &self.stats
    }

    /// Whether the local peer currently holds write authority
    pub fn is_authority(&self) -> bool {
        self.object.is_authority(self.local)
    }

    pub fn mode(&self) -> Mode {
        self.object.mode(self.local)
    }

    fn context(&self) -> TransitionContext {
        TransitionContext {
            is_authority: self.is_authority(),
            auto_unfreeze: self.config.auto_unfreeze,
        }
    }

    /// Run one lifecycle event through the transition table
    pub fn handle<B: PhysicsBody, R: AnchorResolver>(
        &mut self,
        event: ObjectEvent,
        body: &mut B,
        anchors: &R,
    ) -> Transition {
        let from = self.mode();
        let t = transition(from, event, self.context());
        if t.is_noop() {
            trace!(object = ?self.object.id(), ?event, mode = ?from, "event ignored");
            return t;
        }

        debug!(object = ?self.object.id(), ?event, ?from, to = ?t.next, "transition");
        for action in &t.actions {
            self.run(*action, body, anchors);
        }
        t
    }

    pub(crate) fn handle_local<B: PhysicsBody>(&mut self, event: ObjectEvent, body: &mut B) -> Transition {
        self.handle(event, body, &NoAnchors)
    }

    fn run<B: PhysicsBody, R: AnchorResolver>(&mut self, action: Action, body: &mut B, anchors: &R) {
        let me = self.local;
        let mut ctx = FieldContext {
            local: me,
            allow_theft: self.config.allow_theft,
            body,
        };

        match action {
            Action::ClearHolder => {
                self.object.write(me, FieldWrite::Holder(None), &mut ctx);
                self.object.write(me, FieldWrite::Anchor(Anchor::None), &mut ctx);
                self.object.write(me, FieldWrite::OffsetRotation(Quat::IDENTITY), &mut ctx);
                self.object.write(me, FieldWrite::OffsetPosition(Vec3::ZERO), &mut ctx);
                self.offset_due = false;
            }
            Action::RestoreDefaults => {
                self.object.restore_defaults(ctx.body);
            }
            Action::AssignHolder(anchor) => {
                self.object.write(me, FieldWrite::Holder(Some(me)), &mut ctx);
                self.object.write(me, FieldWrite::Anchor(anchor), &mut ctx);
            }
            Action::CaptureOffset => {
                if !self.tracker.capture_offset(&mut self.object, me, anchors, &mut ctx) {
                    // Retry on the next late step once the anchor resolves
                    self.offset_due = true;
                }
            }
            Action::ArmImmediate => {
                self.scheduler.arm_immediate();
            }
            Action::ForcePush => {
                if self.replicator.force_capture(&mut self.object, me, &mut ctx) {
                    self.outbound.push(self.object.take_forced(me));
                    self.stats.forced_pushes += 1;
                }
            }
            Action::SetFrozen(frozen) => {
                self.object.write(me, FieldWrite::Frozen(frozen), &mut ctx);
            }
            Action::PlaceBody(pose) => {
                ctx.body.set_position(pose.position);
                ctx.body.set_rotation(pose.rotation);
            }
            Action::ZeroVelocity => {
                if !ctx.body.is_kinematic() {
                    ctx.body.set_linear_velocity(Vec3::ZERO);
                    ctx.body.set_angular_velocity(Vec3::ZERO);
                }
            }
        }
    }

    // Ownership

    /// Authority side: decide a transfer request from `requester`. On
    /// grant, any current holder other than the requester is dropped
    /// first and the local authority view moves to the requester.
    pub fn on_ownership_requested<B: PhysicsBody>(
        &mut self,
        requester: PeerId,
        body: &mut B,
    ) -> TransferDecision {
        let decision = evaluate_transfer(&self.object, self.local, requester, &self.config);
        match decision {
            TransferDecision::Deny(reason) => {
                self.stats.transfers_denied += 1;
                info!(object = ?self.object.id(), ?requester, %reason, "transfer denied");
            }
            TransferDecision::Grant => {
                self.stats.transfers_granted += 1;
                if requester != self.local {
                    if self.object.is_held() && self.object.holder() != Some(requester) {
                        self.handle_local(ObjectEvent::ForceDrop, body);
                    }
                    self.on_ownership_transferred(requester, body);
                }
                info!(object = ?self.object.id(), ?requester, "transfer granted");
            }
        }
        decision
    }

    /// The transport reports that `new_authority` now holds write
    /// authority. The new authority announces itself with a transfer frame;
    /// a peer that loses authority mid-hold lets go locally.
    pub fn on_ownership_transferred<B: PhysicsBody>(&mut self, new_authority: PeerId, body: &mut B) {
        let previous = self.object.authority();
        if previous == new_authority {
            return;
        }
        let was_holding = self.mode() == Mode::HeldLocal;

        self.object.set_authority(new_authority);
        self.replicator.reset();

        if new_authority == self.local {
            let frame = self.object.take_transfer(self.local);
            self.outbound.push(frame);
            self.scheduler.arm_immediate();
        } else {
            self.lose_authority(was_holding, body);
        }
        debug!(object = ?self.object.id(), ?previous, ?new_authority, "authority moved");
    }

    fn lose_authority<B: PhysicsBody>(&mut self, was_holding: bool, body: &mut B) {
        self.scheduler.idle();
        self.offset_due = false;
        if was_holding {
            self.object.restore_defaults(body);
        }
    }

    // Input-driven events

    /// Local input grabbed the object. The caller has already obtained
    /// write authority for the local peer.
    pub fn on_grab<B: PhysicsBody, R: AnchorResolver>(
        &mut self,
        anchor: Anchor,
        body: &mut B,
        anchors: &R,
    ) -> Transition {
        self.handle(ObjectEvent::Grab { anchor }, body, anchors)
    }

    /// Local input released the object
    pub fn on_release<B: PhysicsBody>(&mut self, body: &mut B) -> Transition {
        self.handle_local(ObjectEvent::Release, body)
    }

    /// Authority forcibly removes the current holder
    pub fn force_drop<B: PhysicsBody>(&mut self, body: &mut B) -> Transition {
        self.handle_local(ObjectEvent::ForceDrop, body)
    }

    /// The holder's input now holds the object with another anchor
    pub fn on_anchor_changed<B: PhysicsBody, R: AnchorResolver>(
        &mut self,
        anchor: Anchor,
        body: &mut B,
        anchors: &R,
    ) -> Transition {
        if anchor == self.object.anchor() {
            return Transition {
                next: self.mode(),
                actions: Vec::new(),
            };
        }
        self.handle(ObjectEvent::AnchorChanged { anchor }, body, anchors)
    }

    /// Capture and send the full state now, bypassing diffing and timers.
    /// A no-op unless the local peer is the authority.
    pub fn force_sync<B: PhysicsBody>(&mut self, body: &mut B) -> bool {
        if !self.is_authority() {
            return false;
        }
        self.run(Action::ForcePush, body, &NoAnchors);
        true
    }

    /// Holder asks for a fresh offset and an immediate push. Returns false
    /// unless the local peer holds the object.
    pub fn request_resync(&mut self) -> bool {
        if self.mode() != Mode::HeldLocal || !self.is_authority() {
            return false;
        }
        self.scheduler.arm_immediate();
        self.offset_due = true;
        true
    }

    // Ticks

    /// Fixed-rate physics step
    pub fn on_physics_step<B: PhysicsBody>(&mut self, dt: Duration, body: &mut B) {
        if self.ticks_suspended() {
            return;
        }
        let me = self.local;

        match self.mode() {
            Mode::HeldLocal => {
                if self.scheduler.tick(dt) {
                    self.offset_due = true;
                }
            }
            Mode::HeldRemote(_) | Mode::Frozen => {}
            Mode::Free if !self.config.sync_rigidbody => {}
            Mode::Free if self.is_authority() => {
                let sleeping = body.is_sleeping();
                if !sleeping && self.replicator.has_moved(body) {
                    self.scheduler.arm();
                }
                // A sleeping body never re-arms; a due push still carries
                // the state it came to rest in
                if self.scheduler.tick(dt) {
                    let mut ctx = FieldContext {
                        local: me,
                        allow_theft: self.config.allow_theft,
                        body,
                    };
                    if self.replicator.push(&mut self.object, me, &mut ctx) {
                        self.stats.scheduled_pushes += 1;
                    } else {
                        self.stats.suppressed_pushes += 1;
                    }
                }
            }
            Mode::Free => {
                if self.replicator.apply(&self.object, body) {
                    self.stats.snapshots_applied += 1;
                }
            }
        }
    }

    /// Late step, after avatars have been posed for the frame
    pub fn on_late_step<B: PhysicsBody, R: AnchorResolver>(&mut self, body: &mut B, anchors: &R) {
        if self.ticks_suspended() {
            return;
        }

        match self.mode() {
            Mode::HeldLocal if self.offset_due => {
                let me = self.local;
                let mut ctx = FieldContext {
                    local: me,
                    allow_theft: self.config.allow_theft,
                    body,
                };
                if self.tracker.capture_offset(&mut self.object, me, anchors, &mut ctx) {
                    self.offset_due = false;
                }
            }
            Mode::HeldRemote(_) => match self.tracker.follow(&self.object, self.local, anchors, body) {
                FollowOutcome::Placed(_) => self.stats.placements += 1,
                FollowOutcome::HolderMissing(holder) => {
                    debug!(object = ?self.object.id(), ?holder, "holder gone, releasing");
                    self.handle(ObjectEvent::HolderLost, body, anchors);
                }
                FollowOutcome::Idle => {}
            },
            _ => {}
        }
    }

    // Transport

    /// Ingest a frame received from the transport
    pub fn ingest<B: PhysicsBody>(&mut self, frame: &SyncFrame, body: &mut B) -> IngestOutcome {
        let previous = self.object.authority();
        let was_holding = self.mode() == Mode::HeldLocal;

        let mut ctx = FieldContext {
            local: self.local,
            allow_theft: self.config.allow_theft,
            body: &mut *body,
        };
        let outcome = self.object.ingest(frame, &mut ctx);

        match outcome {
            IngestOutcome::Applied(_) => {
                self.stats.frames_applied += 1;
                // Forced frames place the body now; a frozen replica never
                // ticks again to pick the snapshot up later
                if frame.header.kind == FrameKind::Forced
                    && matches!(self.mode(), Mode::Free | Mode::Frozen)
                {
                    self.replicator.snap(&self.object, body);
                    self.stats.snapshots_applied += 1;
                }
            }
            IngestOutcome::Stale | IngestOutcome::NotAuthority => self.stats.frames_dropped += 1,
            IngestOutcome::Transferred(new_authority) => {
                if new_authority != previous {
                    self.replicator.reset();
                    if previous == self.local {
                        self.lose_authority(was_holding, body);
                    }
                }
            }
            IngestOutcome::OwnFrame | IngestOutcome::WrongObject => {}
        }
        outcome
    }

    /// Frames to hand to the transport: queued forced and transfer frames,
    /// then a delta of whatever is still dirty.
    pub fn take_outbound(&mut self) -> Vec<SyncFrame> {
        let mut frames = self.take_control_frames();
        if let Some(delta) = self.take_delta() {
            frames.push(delta);
        }
        frames
    }

    /// Queued forced and transfer frames. These must all reach the
    /// transport, in order.
    pub fn take_control_frames(&mut self) -> Vec<SyncFrame> {
        std::mem::take(&mut self.outbound)
    }

    /// Delta of the dirty fields. Fields stay dirty until this is called.
    pub fn take_delta(&mut self) -> Option<SyncFrame> {
        self.object.take_delta(self.local)
    }

    /// Whether a delta is waiting to be taken
    pub fn has_pending_delta(&self) -> bool {
        self.is_authority() && !self.object.dirty().is_empty()
    }

    pub(crate) fn object_mut(&mut self) -> &mut NetworkedObject {
        &mut self.object
    }

    /// Deny reason a local grab would hit, if any. Checked before asking
    /// the authority, which makes the final decision.
    pub fn local_grab_blocked(&self) -> Option<DenyReason> {
        if !self.object.is_pickupable() {
            if self.object.is_held() && !self.config.allow_theft {
                return Some(DenyReason::TheftDisallowed);
            }
            return Some(DenyReason::NotPickupable);
        }
        if self.object.is_frozen() && !self.config.auto_unfreeze {
            return Some(DenyReason::Frozen);
        }
        None
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use tether_core::{AnchorMap, BodyFlags, MemoryBody, ObjectId};
    use tether_state::RestDefaults;

    const ME: PeerId = PeerId(1);

    fn event() -> impl Strategy<Value = ObjectEvent> {
        prop_oneof![
            Just(ObjectEvent::Grab { anchor: Anchor::Left }),
            Just(ObjectEvent::Grab { anchor: Anchor::Right }),
            Just(ObjectEvent::Release),
            Just(ObjectEvent::ForceDrop),
            Just(ObjectEvent::HolderLost),
            Just(ObjectEvent::AnchorChanged { anchor: Anchor::Right }),
            Just(ObjectEvent::Freeze),
            Just(ObjectEvent::Unfreeze),
            (-5.0f32..5.0).prop_map(|x| ObjectEvent::Teleport {
                pose: Pose::new(Vec3::new(x, 1.0, 0.0), Quat::IDENTITY)
            }),
        ]
    }

    proptest! {
        #[test]
        fn frozen_and_held_never_coexist(
            events in prop::collection::vec(event(), 1..40),
            auto_unfreeze in any::<bool>(),
        ) {
            let config = PickupConfig { auto_unfreeze, ..PickupConfig::default() };
            let defaults = RestDefaults { flags: BodyFlags::default(), pose: Pose::IDENTITY };
            let object = NetworkedObject::new(ObjectId::new(1), ME, defaults);
            let mut mgr = AuthorityManager::new(ME, object, config).unwrap();
            let mut body = MemoryBody::new(Pose::IDENTITY, defaults.flags);
            let mut anchors = AnchorMap::new();
            anchors.join(ME, Pose::IDENTITY);

            for event in events {
                let t = mgr.handle(event, &mut body, &anchors);
                prop_assert_eq!(mgr.mode(), t.next);
                prop_assert!(!(mgr.object().is_frozen() && mgr.object().is_held()));
            }
        }
    }
}
