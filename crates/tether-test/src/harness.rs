//! Scenario harness
//!
//! Drives a whole [`Session`] of headless peers over a
//! [`NetworkSimulator`]. Every peer steps its own copy of each body;
//! avatars walk along scripted paths so held objects actually move.

use std::collections::BTreeMap;
use std::time::Duration;

use tether_authority::Transition;
use tether_core::{
    Anchor, AnchorMap, AnchorResolver, BodyFlags, MemoryBody, ObjectId, PeerId, PhysicsBody,
    PickupConfig, Pose, Quat, TetherResult, Vec3,
};
use tether_runtime::{GrabOutcome, Session};
use tether_state::{Mode, RestDefaults};

use crate::chaos::{ChaosConfig, ChaosStats};
use crate::simulator::NetworkSimulator;

// ============================================================================
// SCRIPTED AVATARS
// ============================================================================

/// How one avatar moves over time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub origin: Pose,
    /// World-space walking velocity (m/s)
    pub velocity: Vec3,
    /// Turning rate around +Y (rad/s)
    pub yaw_rate: f32,
}

impl Motion {
    pub fn standing(origin: Pose) -> Self {
        Motion {
            origin,
            velocity: Vec3::ZERO,
            yaw_rate: 0.0,
        }
    }

    pub fn body_at(&self, t: Duration) -> Pose {
        let secs = t.as_secs_f32();
        let turn = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), self.yaw_rate * secs);
        Pose::new(
            self.origin.position + self.velocity * secs,
            (turn * self.origin.rotation).normalize(),
        )
    }
}

/// Anchor resolver whose avatars follow [`Motion`] scripts
#[derive(Clone, Debug, Default)]
pub struct ScriptedAnchors {
    map: AnchorMap,
    motions: BTreeMap<PeerId, Motion>,
    elapsed: Duration,
}

impl ScriptedAnchors {
    /// Hands sit half a shoulder width left and right, slightly forward
    pub const HAND_OFFSET: Vec3 = Vec3::new(0.25, 1.2, 0.3);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, peer: PeerId, motion: Motion) {
        self.motions.insert(peer, motion);
        self.place(peer);
    }

    pub fn leave(&mut self, peer: PeerId) {
        self.motions.remove(&peer);
        self.map.leave(peer);
    }

    pub fn set_motion(&mut self, peer: PeerId, motion: Motion) {
        if self.motions.contains_key(&peer) {
            self.join(peer, motion);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn advance(&mut self, dt: Duration) {
        self.elapsed += dt;
        let peers: Vec<PeerId> = self.motions.keys().copied().collect();
        for peer in peers {
            self.place(peer);
        }
    }

    fn place(&mut self, peer: PeerId) {
        let Some(motion) = self.motions.get(&peer) else {
            return;
        };
        let body = motion.body_at(self.elapsed);
        let h = Self::HAND_OFFSET;
        let left = body.compose(&Pose::new(Vec3::new(-h.x, h.y, h.z), Quat::IDENTITY));
        let right = body.compose(&Pose::new(h, Quat::IDENTITY));
        self.map.set(peer, Anchor::Left, left);
        self.map.set(peer, Anchor::Right, right);
    }
}

impl AnchorResolver for ScriptedAnchors {
    fn is_present(&self, peer: PeerId) -> bool {
        self.map.is_present(peer)
    }

    fn anchor_pose(&self, peer: PeerId, anchor: Anchor) -> Option<Pose> {
        self.map.anchor_pose(peer, anchor)
    }
}

// ============================================================================
// SCENARIO
// ============================================================================

/// Builds a [`Scenario`]
pub struct ScenarioBuilder {
    peers: usize,
    objects: usize,
    chaos: ChaosConfig,
    pickup: PickupConfig,
    flags: BodyFlags,
    tick: Duration,
    seed: u64,
    max_outbound: usize,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        ScenarioBuilder {
            peers: 3,
            objects: 1,
            chaos: ChaosConfig::perfect(),
            pickup: PickupConfig::default(),
            flags: BodyFlags::default(),
            tick: Duration::from_millis(20),
            seed: 0,
            max_outbound: 1024,
        }
    }

    pub fn with_peers(mut self, count: usize) -> Self {
        self.peers = count;
        self
    }

    pub fn with_objects(mut self, count: usize) -> Self {
        self.objects = count;
        self
    }

    pub fn with_chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = chaos;
        self
    }

    pub fn with_pickup(mut self, pickup: PickupConfig) -> Self {
        self.pickup = pickup;
        self
    }

    pub fn with_flags(mut self, flags: BodyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Cap on each peer's outgoing queue
    pub fn with_max_outbound(mut self, max_outbound: usize) -> Self {
        self.max_outbound = max_outbound;
        self
    }

    /// Peers get ids 1..=n and stand two metres apart along +X. Objects get
    /// ids 1..=m and rest on the floor one metre in front of the first peer.
    pub fn build(self) -> TetherResult<Scenario> {
        let network = NetworkSimulator::new(self.chaos, self.seed);
        let mut session = Session::new(network, self.pickup)?.with_max_outbound(self.max_outbound);
        let mut anchors = ScriptedAnchors::new();

        let peers: Vec<PeerId> = (1..=self.peers as u32).map(PeerId::new).collect();
        for (i, peer) in peers.iter().enumerate() {
            let origin = Pose::new(Vec3::new(2.0 * i as f32, 0.0, 0.0), Quat::IDENTITY);
            anchors.join(*peer, Motion::standing(origin));
            session.join(*peer, |_, d| MemoryBody::new(d.pose, d.flags))?;
        }

        let flags = self.flags;
        let objects: Vec<ObjectId> = (1..=self.objects as u64).map(ObjectId::new).collect();
        for (i, object) in objects.iter().enumerate() {
            let defaults = RestDefaults {
                flags,
                pose: Pose::new(Vec3::new(0.5 * i as f32, 0.0, 1.0), Quat::IDENTITY),
            };
            session.spawn(*object, defaults, |_| MemoryBody::new(defaults.pose, flags))?;
        }

        Ok(Scenario {
            session,
            anchors,
            peers,
            objects,
            tick: self.tick,
        })
    }
}

/// A running multi-peer session
pub struct Scenario {
    pub session: Session<MemoryBody, NetworkSimulator>,
    pub anchors: ScriptedAnchors,
    peers: Vec<PeerId>,
    objects: Vec<ObjectId>,
    tick: Duration,
}

impl Scenario {
    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn elapsed(&self) -> Duration {
        self.anchors.elapsed()
    }

    /// One frame: avatars move, each peer simulates its bodies, then the
    /// session delivers, steps and flushes
    pub fn step(&mut self) {
        self.anchors.advance(self.tick);
        let dt = self.tick.as_secs_f32();

        for peer in &self.peers {
            let Ok(p) = self.session.peer_mut(*peer) else {
                continue;
            };
            for object in &self.objects {
                let anchors = &self.anchors;
                let _ = p.with_object(*object, |mgr, body| match mgr.mode() {
                    Mode::HeldLocal => {
                        let record = mgr.object();
                        if let Some(hand) = anchors.anchor_pose(*peer, record.anchor()) {
                            body.move_to(hand.compose(&record.offset()));
                        }
                    }
                    Mode::Free => body.step(dt),
                    Mode::HeldRemote(_) | Mode::Frozen => {}
                });
            }
        }
        self.session.step(self.tick, &self.anchors);
    }

    pub fn run_for(&mut self, duration: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            self.step();
            elapsed += self.tick;
        }
    }

    /// Step until `done` holds or `timeout` passes. Returns whether it held.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut(&Scenario) -> bool) -> bool {
        let mut elapsed = Duration::ZERO;
        while elapsed < timeout {
            if done(self) {
                return true;
            }
            self.step();
            elapsed += self.tick;
        }
        done(self)
    }

    pub fn grab(&mut self, peer: PeerId, object: ObjectId, anchor: Anchor) -> TetherResult<GrabOutcome> {
        self.session.grab(peer, object, anchor, &self.anchors)
    }

    pub fn release(&mut self, peer: PeerId, object: ObjectId) -> TetherResult<Transition> {
        self.session.release(peer, object)
    }

    pub fn switch_anchor(&mut self, peer: PeerId, object: ObjectId, anchor: Anchor) -> TetherResult<Transition> {
        self.session.switch_anchor(peer, object, anchor, &self.anchors)
    }

    /// The avatar disappears and the peer leaves the session
    pub fn disconnect(&mut self, peer: PeerId) -> TetherResult<()> {
        self.anchors.leave(peer);
        self.peers.retain(|p| *p != peer);
        self.session.leave(peer)
    }

    pub fn body(&self, peer: PeerId, object: ObjectId) -> TetherResult<&MemoryBody> {
        self.session.peer(peer)?.body(object)
    }

    pub fn mode(&self, peer: PeerId, object: ObjectId) -> TetherResult<Mode> {
        Ok(self.session.peer(peer)?.manager(object)?.mode())
    }

    /// Largest distance between two peers' copies of `object`
    pub fn position_spread(&self, object: ObjectId) -> f32 {
        let positions: Vec<Vec3> = self
            .peers
            .iter()
            .filter_map(|p| self.body(*p, object).ok())
            .map(|b| b.position())
            .collect();
        let mut spread: f32 = 0.0;
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                spread = spread.max(a.distance(*b));
            }
        }
        spread
    }

    /// Holder, anchor and frozen flag agree on every peer
    pub fn records_agree(&self, object: ObjectId) -> bool {
        let records: Vec<_> = self
            .peers
            .iter()
            .filter_map(|p| self.session.peer(*p).ok()?.manager(object).ok())
            .map(|m| {
                let r = m.object();
                (r.authority(), r.holder(), r.anchor(), r.is_frozen())
            })
            .collect();
        records.windows(2).all(|w| w[0] == w[1])
    }

    pub fn network_stats(&self) -> ChaosStats {
        self.session.transport().total_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hands_follow_walking_avatar() {
        let mut anchors = ScriptedAnchors::new();
        let p = PeerId::new(1);
        anchors.join(
            p,
            Motion {
                origin: Pose::IDENTITY,
                velocity: Vec3::new(1.0, 0.0, 0.0),
                yaw_rate: 0.0,
            },
        );
        let before = anchors.anchor_pose(p, Anchor::Right).unwrap();
        anchors.advance(Duration::from_secs(2));
        let after = anchors.anchor_pose(p, Anchor::Right).unwrap();
        assert!(after.position.approx_eq(before.position + Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_left_and_right_hands_differ() {
        let mut anchors = ScriptedAnchors::new();
        let p = PeerId::new(1);
        anchors.join(p, Motion::standing(Pose::IDENTITY));
        let l = anchors.anchor_pose(p, Anchor::Left).unwrap();
        let r = anchors.anchor_pose(p, Anchor::Right).unwrap();
        assert!((l.position.distance(r.position) - 0.5).abs() < 1e-5);
        assert!(anchors.anchor_pose(p, Anchor::None).is_none());

        anchors.leave(p);
        assert!(!anchors.is_present(p));
    }

    #[test]
    fn test_builder_spawns_on_master() {
        let scenario = ScenarioBuilder::new().with_peers(4).with_objects(2).build().unwrap();
        assert_eq!(scenario.peers().len(), 4);
        for object in scenario.objects() {
            assert_eq!(scenario.session.self_authorities(*object), vec![PeerId::new(1)]);
            assert!(scenario.records_agree(*object));
            assert_eq!(scenario.position_spread(*object), 0.0);
        }
    }
}
