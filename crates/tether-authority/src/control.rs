//! Authority-only physical flag controls
//!
//! Each call is a silent no-op on a peer that is not the authority. The
//! new value also becomes the rest default restored when holding ends.

use tether_core::PhysicsBody;
use tracing::debug;

use crate::AuthorityManager;

impl AuthorityManager {
    pub fn set_gravity_enabled<B: PhysicsBody>(&mut self, enabled: bool, body: &mut B) -> bool {
        if !self.is_authority() {
            return false;
        }
        let mut flags = self.object().defaults().flags;
        flags.gravity = enabled;
        self.object_mut().set_default_flags(flags);
        if !self.mode().is_held() {
            body.set_gravity_enabled(enabled);
        }
        debug!(object = ?self.object().id(), enabled, "gravity set");
        true
    }

    pub fn set_kinematic<B: PhysicsBody>(&mut self, kinematic: bool, body: &mut B) -> bool {
        if !self.is_authority() {
            return false;
        }
        let mut flags = self.object().defaults().flags;
        flags.kinematic = kinematic;
        self.object_mut().set_default_flags(flags);
        if !self.mode().is_held() {
            body.set_kinematic(kinematic);
        }
        debug!(object = ?self.object().id(), kinematic, "kinematic set");
        true
    }

    pub fn set_pickupable(&mut self, pickupable: bool) -> bool {
        if !self.is_authority() {
            return false;
        }
        self.object_mut().set_pickupable(pickupable);
        debug!(object = ?self.object().id(), pickupable, "pickupable set");
        true
    }
}

#[cfg(test)]
mod tests {
    use tether_core::{
        Anchor, AnchorMap, BodyFlags, MemoryBody, ObjectId, PeerId, PhysicsBody, PickupConfig,
        Pose,
    };
    use tether_state::{NetworkedObject, RestDefaults};

    use crate::{AuthorityManager, DenyReason, TransferDecision};

    const A: PeerId = PeerId(1);

    fn setup(local: PeerId) -> (AuthorityManager, MemoryBody) {
        let defaults = RestDefaults {
            flags: BodyFlags::default(),
            pose: Pose::IDENTITY,
        };
        let object = NetworkedObject::new(ObjectId::new(2), A, defaults);
        (
            AuthorityManager::new(local, object, PickupConfig::default()).unwrap(),
            MemoryBody::new(Pose::IDENTITY, defaults.flags),
        )
    }

    #[test]
    fn test_non_authority_controls_are_noops() {
        let (mut mgr, mut body) = setup(PeerId::new(2));
        assert!(!mgr.set_gravity_enabled(false, &mut body));
        assert!(!mgr.set_kinematic(true, &mut body));
        assert!(!mgr.set_pickupable(false));
        assert!(body.gravity_enabled());
        assert!(!body.is_kinematic());
    }

    #[test]
    fn test_kinematic_default_survives_release() {
        let mut anchors = AnchorMap::new();
        anchors.join(A, Pose::IDENTITY);
        let (mut mgr, mut body) = setup(A);

        assert!(mgr.set_kinematic(true, &mut body));
        mgr.on_grab(Anchor::Left, &mut body, &anchors);
        body.kinematic = false;
        mgr.on_release(&mut body);

        assert!(body.is_kinematic());
    }

    #[test]
    fn test_disabled_pickup_denies_transfer() {
        let (mut mgr, mut body) = setup(A);
        mgr.set_pickupable(false);
        assert_eq!(
            mgr.on_ownership_requested(PeerId::new(2), &mut body),
            TransferDecision::Deny(DenyReason::NotPickupable)
        );
        assert_eq!(mgr.local_grab_blocked(), Some(DenyReason::NotPickupable));
    }
}
