//! Transfer arbitration
//!
//! Evaluated only on the current authority's replica when another peer
//! asks for write authority over an object.

use std::fmt;

use tether_core::{PeerId, PickupConfig};
use tether_state::NetworkedObject;

/// Why a transfer request was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// Held by another peer and theft is disabled
    TheftDisallowed,
    /// Frozen and auto-unfreeze is disabled
    Frozen,
    /// Pickup disabled for this object
    NotPickupable,
    /// This replica is not the authority and cannot decide
    NotAuthority,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::TheftDisallowed => "held by another peer",
            DenyReason::Frozen => "object is frozen",
            DenyReason::NotPickupable => "pickup disabled",
            DenyReason::NotAuthority => "not the authority",
        };
        f.write_str(s)
    }
}

/// Answer to a transfer request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDecision {
    Grant,
    Deny(DenyReason),
}

impl TransferDecision {
    #[inline]
    pub fn is_granted(self) -> bool {
        self == TransferDecision::Grant
    }
}

/// Decide whether `requester` may take write authority over `obj`.
///
/// `evaluator` is the peer running the check; only the current authority
/// may decide.
pub fn evaluate_transfer(
    obj: &NetworkedObject,
    evaluator: PeerId,
    requester: PeerId,
    config: &PickupConfig,
) -> TransferDecision {
    if !obj.is_authority(evaluator) {
        return TransferDecision::Deny(DenyReason::NotAuthority);
    }
    if !obj.defaults().flags.pickupable {
        return TransferDecision::Deny(DenyReason::NotPickupable);
    }
    if obj.is_frozen() && !config.auto_unfreeze {
        return TransferDecision::Deny(DenyReason::Frozen);
    }
    match obj.holder() {
        Some(holder) if obj.is_held() && holder != requester && !config.allow_theft => {
            TransferDecision::Deny(DenyReason::TheftDisallowed)
        }
        _ => TransferDecision::Grant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{Anchor, BodyFlags, MemoryBody, ObjectId, Pose};
    use tether_state::{FieldContext, FieldWrite, RestDefaults};

    const A: PeerId = PeerId(1);
    const B: PeerId = PeerId(2);
    const C: PeerId = PeerId(3);

    fn held_by_a() -> NetworkedObject {
        let defaults = RestDefaults {
            flags: BodyFlags::default(),
            pose: Pose::IDENTITY,
        };
        let mut obj = NetworkedObject::new(ObjectId::new(1), A, defaults);
        let mut body = MemoryBody::new(Pose::IDENTITY, defaults.flags);
        let mut ctx = FieldContext {
            local: A,
            allow_theft: false,
            body: &mut body,
        };
        obj.write(A, FieldWrite::Holder(Some(A)), &mut ctx);
        obj.write(A, FieldWrite::Anchor(Anchor::Right), &mut ctx);
        obj
    }

    #[test]
    fn test_theft_denied_by_default() {
        let obj = held_by_a();
        let config = PickupConfig::default();
        assert_eq!(
            evaluate_transfer(&obj, A, B, &config),
            TransferDecision::Deny(DenyReason::TheftDisallowed)
        );
    }

    #[test]
    fn test_theft_allowed() {
        let obj = held_by_a();
        let config = PickupConfig {
            allow_theft: true,
            ..PickupConfig::default()
        };
        assert!(evaluate_transfer(&obj, A, B, &config).is_granted());
    }

    #[test]
    fn test_self_request_always_granted() {
        let obj = held_by_a();
        assert!(evaluate_transfer(&obj, A, A, &PickupConfig::default()).is_granted());
    }

    #[test]
    fn test_only_authority_decides() {
        let obj = held_by_a();
        assert_eq!(
            evaluate_transfer(&obj, C, B, &PickupConfig::default()),
            TransferDecision::Deny(DenyReason::NotAuthority)
        );
    }

    #[test]
    fn test_pickup_disabled() {
        let mut obj = held_by_a();
        obj.set_pickupable(false);
        assert_eq!(
            evaluate_transfer(&obj, A, B, &PickupConfig::default()),
            TransferDecision::Deny(DenyReason::NotPickupable)
        );
    }
}
