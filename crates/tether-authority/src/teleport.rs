//! Teleport and respawn
//!
//! Both bypass the scheduler: the body is placed, the holder (if any) is
//! dropped first, and a forced frame goes out immediately.

use tether_core::{PhysicsBody, Pose, Quat, Vec3};

use crate::{AuthorityManager, ObjectEvent};

impl AuthorityManager {
    /// Move the object to `position`/`rotation`. A no-op unless the local
    /// peer is the authority. Returns true if the object moved.
    pub fn teleport_to<B: PhysicsBody>(
        &mut self,
        position: Vec3,
        rotation: Quat,
        body: &mut B,
    ) -> bool {
        let pose = Pose::new(position, rotation.normalize());
        !self
            .handle_local(ObjectEvent::Teleport { pose }, body)
            .is_noop()
    }

    /// Teleport back to the pose captured at creation
    pub fn respawn<B: PhysicsBody>(&mut self, body: &mut B) -> bool {
        let rest = self.object().defaults().pose;
        self.teleport_to(rest.position, rest.rotation, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{Anchor, AnchorMap, BodyFlags, MemoryBody, ObjectId, PeerId, PickupConfig};
    use tether_state::{Mode, NetworkedObject, RestDefaults};
    use tether_wire::FrameKind;

    const A: PeerId = PeerId(1);
    const B: PeerId = PeerId(2);

    fn rest() -> Pose {
        Pose::new(Vec3::new(1.0, 0.0, -2.0), Quat::from_euler(0.5, 0.0, 0.0))
    }

    fn setup(local: PeerId) -> (AuthorityManager, MemoryBody) {
        let defaults = RestDefaults {
            flags: BodyFlags::default(),
            pose: rest(),
        };
        let object = NetworkedObject::new(ObjectId::new(5), A, defaults);
        (
            AuthorityManager::new(local, object, PickupConfig::default()).unwrap(),
            MemoryBody::new(rest(), defaults.flags),
        )
    }

    #[test]
    fn test_teleport_zeroes_velocity_and_forces_frame() {
        let (mut mgr, mut body) = setup(A);
        body.state.linear_velocity = Vec3::new(3.0, 1.0, 0.0);
        body.state.angular_velocity = Vec3::new(0.0, 2.0, 0.0);

        let target = Vec3::new(4.0, 2.0, 4.0);
        assert!(mgr.teleport_to(target, Quat::IDENTITY, &mut body));

        assert_eq!(body.position(), target);
        assert_eq!(body.linear_velocity(), Vec3::ZERO);
        assert_eq!(body.angular_velocity(), Vec3::ZERO);

        let frames = mgr.take_outbound();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.kind, FrameKind::Forced);
        assert_eq!(frames[0].values.position, target);
    }

    #[test]
    fn test_teleport_kinematic_keeps_velocity() {
        let (mut mgr, mut body) = setup(A);
        body.kinematic = true;
        body.state.linear_velocity = Vec3::new(1.0, 0.0, 0.0);

        mgr.teleport_to(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, &mut body);
        assert_eq!(body.linear_velocity(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_teleport_held_object_drops_first() {
        let mut anchors = AnchorMap::new();
        anchors.join(A, Pose::IDENTITY);
        let (mut mgr, mut body) = setup(A);
        mgr.on_grab(Anchor::Left, &mut body, &anchors);
        mgr.take_outbound();

        mgr.teleport_to(Vec3::new(0.0, 3.0, 0.0), Quat::IDENTITY, &mut body);
        assert_eq!(mgr.mode(), Mode::Free);

        let frames = mgr.take_outbound();
        assert_eq!(frames[0].values.holder, None);
        assert_eq!(frames[0].values.position, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_respawn_returns_to_rest_pose() {
        let (mut mgr, mut body) = setup(A);
        body.state.position = Vec3::new(9.0, 9.0, 9.0);

        assert!(mgr.respawn(&mut body));
        assert!(body.pose().approx_eq(&rest(), 1e-6));
    }

    #[test]
    fn test_non_authority_teleport_is_noop() {
        let (mut mgr, mut body) = setup(B);
        assert!(!mgr.teleport_to(Vec3::new(5.0, 0.0, 0.0), Quat::IDENTITY, &mut body));
        assert_eq!(body.pose(), rest());
        assert!(mgr.take_outbound().is_empty());
    }
}
