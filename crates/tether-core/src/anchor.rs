//! Anchor boundary
//!
//! Each peer resolves a holder's anchor (hand bone) from its own copy of
//! that holder's avatar. Resolution failing means the holder left.

use std::collections::HashMap;

use crate::{Anchor, PeerId, Pose};

/// Resolves a peer's anchor transform locally
pub trait AnchorResolver {
    /// Whether the peer handle still resolves
    fn is_present(&self, peer: PeerId) -> bool;

    /// World pose of `anchor` on `peer`, or `None` if it cannot be resolved
    fn anchor_pose(&self, peer: PeerId, anchor: Anchor) -> Option<Pose>;
}

/// Table-driven resolver, useful for headless peers and tests
#[derive(Debug, Clone, Default)]
pub struct AnchorMap {
    poses: HashMap<(PeerId, Anchor), Pose>,
    present: HashMap<PeerId, bool>,
}

impl AnchorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer with both anchors at `pose`
    pub fn join(&mut self, peer: PeerId, pose: Pose) {
        self.present.insert(peer, true);
        self.poses.insert((peer, Anchor::Left), pose);
        self.poses.insert((peer, Anchor::Right), pose);
    }

    pub fn leave(&mut self, peer: PeerId) {
        self.present.remove(&peer);
        self.poses.retain(|(p, _), _| *p != peer);
    }

    pub fn set(&mut self, peer: PeerId, anchor: Anchor, pose: Pose) {
        self.present.insert(peer, true);
        self.poses.insert((peer, anchor), pose);
    }
}

impl AnchorResolver for AnchorMap {
    fn is_present(&self, peer: PeerId) -> bool {
        self.present.get(&peer).copied().unwrap_or(false)
    }

    fn anchor_pose(&self, peer: PeerId, anchor: Anchor) -> Option<Pose> {
        if anchor == Anchor::None || !self.is_present(peer) {
            return None;
        }
        self.poses.get(&(peer, anchor)).copied()
    }
}
