//! In-process session
//!
//! Hosts several peers in one process, joined by a [`Transport`]. The
//! session plays the hosting environment: it routes grab requests to the
//! current authority, reassigns authority when a peer leaves, and runs
//! each peer's per-frame loop.

use std::collections::BTreeMap;
use std::time::Duration;

use tether_authority::{evaluate_transfer, DenyReason, Transition, TransferDecision};
use tether_core::{
    Anchor, AnchorResolver, ObjectId, PeerId, PhysicsBody, PickupConfig, Quat, TetherError,
    TetherResult, Vec3,
};
use tether_state::{Mode, RestDefaults};
use tracing::{debug, info, warn};

use crate::{Peer, Transport};

/// Result of a grab request
#[derive(Clone, Debug, PartialEq)]
pub enum GrabOutcome {
    /// The requester now holds the object
    Granted(Transition),
    /// Refused before any authority moved
    Denied(DenyReason),
    /// Authority moved to the requester but the grab transition did not
    /// end in a hold
    NotHeld(Transition),
}

impl GrabOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, GrabOutcome::Granted(_))
    }
}

/// A group of peers sharing a set of objects
pub struct Session<B: PhysicsBody, T: Transport> {
    pickup: PickupConfig,
    max_outbound: usize,
    peers: BTreeMap<PeerId, Peer<B>>,
    objects: BTreeMap<ObjectId, RestDefaults>,
    transport: T,
}

impl<B: PhysicsBody, T: Transport> Session<B, T> {
    pub fn new(transport: T, pickup: PickupConfig) -> TetherResult<Self> {
        pickup.validate()?;
        Ok(Session {
            pickup,
            max_outbound: 1024,
            peers: BTreeMap::new(),
            objects: BTreeMap::new(),
            transport,
        })
    }

    pub fn with_max_outbound(mut self, max_outbound: usize) -> Self {
        self.max_outbound = max_outbound;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn peer(&self, id: PeerId) -> TetherResult<&Peer<B>> {
        self.peers.get(&id).ok_or(TetherError::UnknownPeer(id))
    }

    pub fn peer_mut(&mut self, id: PeerId) -> TetherResult<&mut Peer<B>> {
        self.peers.get_mut(&id).ok_or(TetherError::UnknownPeer(id))
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.keys().copied()
    }

    /// Lowest present peer id; default authority for new and orphaned objects
    pub fn master(&self) -> Option<PeerId> {
        self.peers.keys().next().copied()
    }

    /// Add a peer. Every existing object is registered on it with the
    /// master's view of the authority, and each authority sends a full
    /// frame so the newcomer converges.
    pub fn join(&mut self, id: PeerId, mut make_body: impl FnMut(ObjectId, &RestDefaults) -> B) -> TetherResult<()> {
        if self.peers.contains_key(&id) {
            return Ok(());
        }
        let mut peer = Peer::new(id, self.pickup.clone(), self.max_outbound);
        let master = self.master();

        for (object, defaults) in &self.objects {
            let authority = match master {
                Some(m) => self.peer(m)?.manager(*object)?.object().authority(),
                None => id,
            };
            peer.register(*object, authority, *defaults, make_body(*object, defaults))?;
        }
        self.transport.register(id);
        self.peers.insert(id, peer);
        info!(peer = ?id, "peer joined");

        let objects: Vec<ObjectId> = self.objects.keys().copied().collect();
        for object in objects {
            let authority = self.authority_view(id, object)?;
            if authority != id {
                if let Ok(peer) = self.peer_mut(authority) {
                    peer.with_object(object, |mgr, body| mgr.force_sync(body))?;
                }
            }
        }
        self.flush_all();
        Ok(())
    }

    /// Remove a peer. Objects whose authority left move to the master.
    pub fn leave(&mut self, id: PeerId) -> TetherResult<()> {
        if self.peers.remove(&id).is_none() {
            return Err(TetherError::UnknownPeer(id));
        }
        self.transport.unregister(id);
        info!(peer = ?id, "peer left");

        let Some(master) = self.master() else {
            return Ok(());
        };
        let objects: Vec<ObjectId> = self.objects.keys().copied().collect();
        for object in objects {
            if self.authority_view(master, object)? != id {
                continue;
            }
            debug!(?object, from = ?id, to = ?master, "reassigning orphaned authority");
            for peer in self.peers.values_mut() {
                peer.with_object(object, |mgr, body| mgr.on_ownership_transferred(master, body))?;
            }
        }
        self.flush_all();
        Ok(())
    }

    /// Create an object on every peer with the master as authority
    pub fn spawn(
        &mut self,
        object: ObjectId,
        defaults: RestDefaults,
        mut make_body: impl FnMut(PeerId) -> B,
    ) -> TetherResult<()> {
        if self.objects.contains_key(&object) {
            return Err(TetherError::DuplicateObject(object));
        }
        let master = self
            .master()
            .ok_or_else(|| TetherError::InvalidConfig("spawn requires at least one peer".into()))?;
        for (id, peer) in self.peers.iter_mut() {
            peer.register(object, master, defaults, make_body(*id))?;
        }
        self.objects.insert(object, defaults);
        Ok(())
    }

    /// Authority for `object` as seen by `peer`
    pub fn authority_view(&self, peer: PeerId, object: ObjectId) -> TetherResult<PeerId> {
        Ok(self.peer(peer)?.manager(object)?.object().authority())
    }

    /// Peers that currently believe they are the authority for `object`
    pub fn self_authorities(&self, object: ObjectId) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, p)| p.manager(object).map_or(false, |m| m.is_authority()))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Peers that currently believe they are holding `object`
    pub fn self_holders(&self, object: ObjectId) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, p)| {
                p.manager(object)
                    .map_or(false, |m| m.mode() == Mode::HeldLocal)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// `requester` grabs `object` with `anchor`. Authority is requested from
    /// the current authority first; on grant, the previous holder is
    /// dropped and its frame flushed before the requester grabs.
    pub fn grab<R: AnchorResolver>(
        &mut self,
        requester: PeerId,
        object: ObjectId,
        anchor: Anchor,
        anchors: &R,
    ) -> TetherResult<GrabOutcome> {
        if !anchor.is_some() {
            return Err(TetherError::UnknownAnchor(anchor.to_byte()));
        }
        let (authority, blocked) = {
            let mgr = self.peer(requester)?.manager(object)?;
            (mgr.object().authority(), mgr.local_grab_blocked())
        };
        if let Some(reason) = blocked {
            debug!(?requester, ?object, %reason, "grab blocked locally");
            return Ok(GrabOutcome::Denied(reason));
        }

        let decision = match self.peers.get_mut(&authority) {
            Some(owner) => owner.with_object(object, |mgr, body| {
                mgr.on_ownership_requested(requester, body)
            })?,
            None => {
                // Decide on the requester's replica in the absent authority's place
                warn!(?object, ?authority, "authority not present, deciding on requester");
                let mgr = self.peer(requester)?.manager(object)?;
                evaluate_transfer(mgr.object(), authority, requester, mgr.config())
            }
        };
        if let TransferDecision::Deny(reason) = decision {
            return Ok(GrabOutcome::Denied(reason));
        }

        if authority != requester {
            if self.peers.contains_key(&authority) {
                self.flush_peer(authority)?;
            }
            self.peer_mut(requester)?
                .with_object(object, |mgr, body| {
                    mgr.on_ownership_transferred(requester, body)
                })?;
        }

        let transition = self
            .peer_mut(requester)?
            .with_object(object, |mgr, body| mgr.on_grab(anchor, body, anchors))?;
        self.flush_peer(requester)?;

        if transition.next != Mode::HeldLocal {
            warn!(?requester, ?object, mode = ?transition.next, "authority moved but grab did not take hold");
            return Ok(GrabOutcome::NotHeld(transition));
        }
        Ok(GrabOutcome::Granted(transition))
    }

    /// `peer` lets go of `object`
    pub fn release(&mut self, peer: PeerId, object: ObjectId) -> TetherResult<Transition> {
        let t = self
            .peer_mut(peer)?
            .with_object(object, |mgr, body| mgr.on_release(body))?;
        self.flush_peer(peer)?;
        Ok(t)
    }

    /// The holder's input moved `object` to another anchor
    pub fn switch_anchor<R: AnchorResolver>(
        &mut self,
        peer: PeerId,
        object: ObjectId,
        anchor: Anchor,
        anchors: &R,
    ) -> TetherResult<Transition> {
        let t = self
            .peer_mut(peer)?
            .with_object(object, |mgr, body| mgr.on_anchor_changed(anchor, body, anchors))?;
        self.flush_peer(peer)?;
        Ok(t)
    }

    pub fn teleport(
        &mut self,
        peer: PeerId,
        object: ObjectId,
        position: Vec3,
        rotation: Quat,
    ) -> TetherResult<bool> {
        let moved = self
            .peer_mut(peer)?
            .with_object(object, |mgr, body| mgr.teleport_to(position, rotation, body))?;
        self.flush_peer(peer)?;
        Ok(moved)
    }

    pub fn respawn(&mut self, peer: PeerId, object: ObjectId) -> TetherResult<bool> {
        let moved = self
            .peer_mut(peer)?
            .with_object(object, |mgr, body| mgr.respawn(body))?;
        self.flush_peer(peer)?;
        Ok(moved)
    }

    pub fn set_frozen(&mut self, peer: PeerId, object: ObjectId, frozen: bool) -> TetherResult<bool> {
        let changed = self
            .peer_mut(peer)?
            .with_object(object, |mgr, body| mgr.set_frozen(frozen, body))?;
        self.flush_peer(peer)?;
        Ok(changed)
    }

    /// One frame for every peer: deliver, physics, late step, flush
    pub fn step<R: AnchorResolver>(&mut self, dt: Duration, anchors: &R) {
        self.transport.advance(dt);
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();

        for id in &ids {
            let inbound = self.transport.receive(*id);
            if let Some(peer) = self.peers.get_mut(id) {
                for bytes in inbound {
                    if let Err(e) = peer.receive(&bytes) {
                        debug!(peer = ?id, error = %e, "inbound frame rejected");
                    }
                }
            }
        }
        for peer in self.peers.values_mut() {
            peer.physics_step(dt);
            peer.late_step(anchors);
        }
        self.flush_all();
    }

    /// Run `step` until `duration` has elapsed
    pub fn run_for<R: AnchorResolver>(&mut self, duration: Duration, dt: Duration, anchors: &R) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            self.step(dt, anchors);
            elapsed += dt;
        }
    }

    fn flush_peer(&mut self, id: PeerId) -> TetherResult<()> {
        let peer = self.peers.get_mut(&id).ok_or(TetherError::UnknownPeer(id))?;
        peer.flush();
        while let Some(bytes) = peer.pop_outgoing() {
            self.transport.broadcast(id, bytes);
        }
        Ok(())
    }

    fn flush_all(&mut self) {
        for (id, peer) in self.peers.iter_mut() {
            peer.flush();
            while let Some(bytes) = peer.pop_outgoing() {
                self.transport.broadcast(*id, bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoopbackTransport;
    use tether_core::{AnchorMap, BodyFlags, MemoryBody, Pose};

    const A: PeerId = PeerId(1);
    const B: PeerId = PeerId(2);
    const C: PeerId = PeerId(3);
    const OBJ: ObjectId = ObjectId(1);
    const DT: Duration = Duration::from_millis(20);

    fn rest() -> Pose {
        Pose::new(Vec3::new(0.0, 0.0, 1.0), Quat::IDENTITY)
    }

    fn session(pickup: PickupConfig) -> (Session<MemoryBody, LoopbackTransport>, AnchorMap) {
        let mut s = Session::new(LoopbackTransport::new(), pickup).unwrap();
        let mut anchors = AnchorMap::new();
        for (i, id) in [A, B, C].into_iter().enumerate() {
            s.join(id, |_, d| MemoryBody::new(d.pose, d.flags)).unwrap();
            anchors.join(id, Pose::new(Vec3::new(i as f32, 1.0, 0.0), Quat::IDENTITY));
        }
        let defaults = RestDefaults {
            flags: BodyFlags::default(),
            pose: rest(),
        };
        s.spawn(OBJ, defaults, |_| MemoryBody::new(rest(), BodyFlags::default()))
            .unwrap();
        (s, anchors)
    }

    #[test]
    fn test_grab_moves_authority_to_requester() {
        let (mut s, anchors) = session(PickupConfig::default());
        assert_eq!(s.master(), Some(A));

        let outcome = s.grab(B, OBJ, Anchor::Left, &anchors).unwrap();
        assert!(outcome.is_granted());
        s.step(DT, &anchors);

        for id in [A, B, C] {
            assert_eq!(s.authority_view(id, OBJ).unwrap(), B);
        }
        assert_eq!(s.self_authorities(OBJ), vec![B]);
        assert_eq!(s.self_holders(OBJ), vec![B]);
        assert_eq!(
            s.peer(C).unwrap().manager(OBJ).unwrap().mode(),
            Mode::HeldRemote(B)
        );
    }

    #[test]
    fn test_theft_denied() {
        let (mut s, anchors) = session(PickupConfig::default());
        s.grab(B, OBJ, Anchor::Left, &anchors).unwrap();
        s.step(DT, &anchors);

        let outcome = s.grab(C, OBJ, Anchor::Right, &anchors).unwrap();
        assert_eq!(outcome, GrabOutcome::Denied(DenyReason::TheftDisallowed));
        s.step(DT, &anchors);
        assert_eq!(s.self_holders(OBJ), vec![B]);
        assert_eq!(s.authority_view(A, OBJ).unwrap(), B);
    }

    #[test]
    fn test_theft_allowed() {
        let pickup = PickupConfig {
            allow_theft: true,
            ..PickupConfig::default()
        };
        let (mut s, anchors) = session(pickup);
        s.grab(B, OBJ, Anchor::Left, &anchors).unwrap();
        s.step(DT, &anchors);

        assert!(s.grab(C, OBJ, Anchor::Right, &anchors).unwrap().is_granted());
        assert_eq!(s.self_holders(OBJ), vec![C]);
        s.step(DT, &anchors);

        assert_eq!(s.self_authorities(OBJ), vec![C]);
        for id in [A, B] {
            assert_eq!(
                s.peer(id).unwrap().manager(OBJ).unwrap().mode(),
                Mode::HeldRemote(C)
            );
        }
    }

    #[test]
    fn test_denied_grab_moves_no_authority() {
        let pickup = PickupConfig {
            auto_unfreeze: false,
            ..PickupConfig::default()
        };
        let (mut s, anchors) = session(pickup);
        assert!(s.set_frozen(A, OBJ, true).unwrap());
        s.step(DT, &anchors);

        let outcome = s.grab(C, OBJ, Anchor::Left, &anchors).unwrap();
        assert_eq!(outcome, GrabOutcome::Denied(DenyReason::Frozen));
        s.step(DT, &anchors);

        assert_eq!(s.self_authorities(OBJ), vec![A]);
        for id in [A, B, C] {
            assert_eq!(s.authority_view(id, OBJ).unwrap(), A);
        }
    }

    #[test]
    fn test_grab_from_absent_authority() {
        let (mut s, anchors) = session(PickupConfig::default());
        let ghost = PeerId::new(9);
        let transfer = tether_wire::SyncFrame::transfer(OBJ, ghost, 0);
        s.peer_mut(C).unwrap().receive(&transfer.encode()).unwrap();
        assert_eq!(s.authority_view(C, OBJ).unwrap(), ghost);

        let outcome = s.grab(C, OBJ, Anchor::Right, &anchors).unwrap();
        assert!(outcome.is_granted());
        s.step(DT, &anchors);

        assert_eq!(s.self_authorities(OBJ), vec![C]);
        assert_eq!(s.self_holders(OBJ), vec![C]);
        for id in [A, B] {
            assert_eq!(
                s.peer(id).unwrap().manager(OBJ).unwrap().mode(),
                Mode::HeldRemote(C)
            );
        }
    }

    #[test]
    fn test_holder_leaves() {
        let (mut s, mut anchors) = session(PickupConfig::default());
        s.grab(B, OBJ, Anchor::Left, &anchors).unwrap();
        s.step(DT, &anchors);

        anchors.leave(B);
        s.leave(B).unwrap();
        s.step(DT, &anchors);
        s.step(DT, &anchors);

        assert_eq!(s.self_authorities(OBJ), vec![A]);
        for id in [A, C] {
            let mgr = s.peer(id).unwrap().manager(OBJ).unwrap();
            assert_eq!(mgr.mode(), Mode::Free);
            assert!(!s.peer(id).unwrap().body(OBJ).unwrap().is_kinematic());
        }
    }

    #[test]
    fn test_late_joiner_converges() {
        let (mut s, mut anchors) = session(PickupConfig::default());
        s.teleport(A, OBJ, Vec3::new(3.0, 0.0, 3.0), Quat::IDENTITY)
            .unwrap();
        s.step(DT, &anchors);

        let d = PeerId::new(4);
        anchors.join(d, Pose::IDENTITY);
        s.join(d, |_, defaults| MemoryBody::new(defaults.pose, defaults.flags))
            .unwrap();
        s.step(DT, &anchors);

        let pos = s.peer(d).unwrap().body(OBJ).unwrap().position();
        assert_eq!(pos, Vec3::new(3.0, 0.0, 3.0));
    }

    #[test]
    fn test_unknown_peer() {
        let (mut s, anchors) = session(PickupConfig::default());
        let ghost = PeerId::new(42);
        assert!(matches!(
            s.grab(ghost, OBJ, Anchor::Left, &anchors),
            Err(TetherError::UnknownPeer(_))
        ));
        assert!(s.leave(ghost).is_err());
    }
}
