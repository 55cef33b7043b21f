//! Property tests across whole sessions

use std::f32::consts::PI;
use std::time::Duration;

use proptest::prelude::*;
use tether_core::{
    Anchor, AnchorMap, BodyFlags, BodyState, MemoryBody, ObjectId, PeerId, PhysicsBody,
    PickupConfig, Pose, Quat, Vec3,
};
use tether_runtime::Peer;
use tether_state::{FieldContext, NetworkedObject, RestDefaults};
use tether_sync::RigidBodyReplicator;
use tether_test::{ChaosConfig, ScenarioBuilder};

const OBJ: ObjectId = ObjectId(1);

fn vec3(range: f32) -> impl Strategy<Value = Vec3> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn quat() -> impl Strategy<Value = Quat> {
    (-PI..PI, -1.5f32..1.5, -PI..PI).prop_map(|(yaw, pitch, roll)| Quat::from_euler(yaw, pitch, roll))
}

fn pose(range: f32) -> impl Strategy<Value = Pose> {
    (vec3(range), quat()).prop_map(|(p, r)| Pose::new(p, r))
}

#[derive(Clone, Debug)]
enum Op {
    Grab { peer: usize, left: bool },
    Release(usize),
    Teleport(usize),
    Freeze { peer: usize, frozen: bool },
    Wait(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, any::<bool>()).prop_map(|(peer, left)| Op::Grab { peer, left }),
        2 => (0..3usize).prop_map(Op::Release),
        1 => (0..3usize).prop_map(Op::Teleport),
        1 => (0..3usize, any::<bool>()).prop_map(|(peer, frozen)| Op::Freeze { peer, frozen }),
        2 => (1..30u8).prop_map(Op::Wait),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn at_most_one_authority_and_holder(
        ops in prop::collection::vec(op(), 1..40),
        allow_theft in any::<bool>(),
        auto_unfreeze in any::<bool>(),
    ) {
        let pickup = PickupConfig { allow_theft, auto_unfreeze, ..PickupConfig::default() };
        let mut s = ScenarioBuilder::new()
            .with_peers(3)
            .with_chaos(ChaosConfig::perfect())
            .with_pickup(pickup)
            .build()
            .unwrap();
        let peers = s.peers().to_vec();

        for op in ops {
            let steps = match op {
                Op::Grab { peer, left } => {
                    let anchor = if left { Anchor::Left } else { Anchor::Right };
                    s.grab(peers[peer], OBJ, anchor).unwrap();
                    1
                }
                Op::Release(peer) => {
                    s.release(peers[peer], OBJ).unwrap();
                    1
                }
                Op::Teleport(peer) => {
                    let to = Vec3::new(peer as f32, 0.0, 2.0);
                    s.session.teleport(peers[peer], OBJ, to, Quat::IDENTITY).unwrap();
                    1
                }
                Op::Freeze { peer, frozen } => {
                    s.session.set_frozen(peers[peer], OBJ, frozen).unwrap();
                    1
                }
                Op::Wait(n) => n as usize,
            };
            prop_assert_eq!(s.session.self_authorities(OBJ).len(), 1);
            prop_assert!(s.session.self_holders(OBJ).len() <= 1);

            for _ in 0..steps {
                s.step();
                prop_assert_eq!(s.session.self_authorities(OBJ).len(), 1);
                prop_assert!(s.session.self_holders(OBJ).len() <= 1);
            }
        }

        let authority = s.session.self_authorities(OBJ)[0];
        s.session
            .peer_mut(authority)
            .unwrap()
            .with_object(OBJ, |mgr, body| mgr.force_sync(body))
            .unwrap();
        s.run_for(Duration::from_millis(200));
        prop_assert!(s.records_agree(OBJ));
    }

    #[test]
    fn followers_reproduce_held_pose(hand in pose(20.0), held in pose(20.0)) {
        let a = PeerId::new(1);
        let b = PeerId::new(2);
        let mut anchors = AnchorMap::new();
        anchors.join(b, Pose::IDENTITY);
        anchors.join(a, Pose::IDENTITY);
        anchors.set(a, Anchor::Left, hand);

        let defaults = RestDefaults { flags: BodyFlags::default(), pose: Pose::IDENTITY };
        let mut holder: Peer<MemoryBody> = Peer::new(a, PickupConfig::default(), 16);
        let mut follower: Peer<MemoryBody> = Peer::new(b, PickupConfig::default(), 16);
        holder.register(OBJ, a, defaults, MemoryBody::new(held, defaults.flags)).unwrap();
        follower.register(OBJ, a, defaults, MemoryBody::new(Pose::IDENTITY, defaults.flags)).unwrap();

        holder
            .with_object(OBJ, |mgr, body| mgr.on_grab(Anchor::Left, body, &anchors))
            .unwrap();
        holder.flush();
        while let Some(bytes) = holder.pop_outgoing() {
            follower.receive(&bytes).unwrap();
        }
        follower.late_step(&anchors);

        let placed = follower.body(OBJ).unwrap().pose();
        prop_assert!(placed.position.approx_eq(held.position, 1e-3));
        prop_assert!(placed.rotation.approx_eq(held.rotation, 1e-4));
    }

    #[test]
    fn unchanged_state_is_never_pushed_twice(
        position in vec3(50.0),
        rotation in quat(),
        linear in vec3(10.0),
        angular in vec3(10.0),
    ) {
        let me = PeerId::new(1);
        let defaults = RestDefaults { flags: BodyFlags::default(), pose: Pose::IDENTITY };
        let mut obj = NetworkedObject::new(OBJ, me, defaults);
        let mut body = MemoryBody::new(Pose::IDENTITY, defaults.flags);
        body.state = BodyState { position, rotation, linear_velocity: linear, angular_velocity: angular };
        let mut replicator = RigidBodyReplicator::new(0.0);

        let mut ctx = FieldContext { local: me, allow_theft: false, body: &mut body };
        prop_assert!(replicator.push(&mut obj, me, &mut ctx));
        prop_assert!(obj.take_delta(me).is_some());

        prop_assert!(!replicator.push(&mut obj, me, &mut ctx));
        prop_assert!(obj.take_delta(me).is_none());

        ctx.body.set_position(position + Vec3::new(0.5, 0.0, 0.0));
        prop_assert!(replicator.push(&mut obj, me, &mut ctx));
        prop_assert_eq!(obj.take_delta(me).map(|f| f.mask().0.count_ones()), Some(1));
    }
}
