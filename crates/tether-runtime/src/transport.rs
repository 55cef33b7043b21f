//! Transport seam
//!
//! The core assumes delivery per object is reliable but not synchronised
//! in time across peers. Sequence guarding in the object record covers
//! transports that also reorder or duplicate.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tether_core::PeerId;

/// Moves encoded frames between peers
pub trait Transport {
    fn register(&mut self, peer: PeerId);

    fn unregister(&mut self, peer: PeerId);

    /// Send one encoded frame from `from` to every other registered peer
    fn broadcast(&mut self, from: PeerId, frame: Vec<u8>);

    /// Frames deliverable to `peer` now
    fn receive(&mut self, peer: PeerId) -> Vec<Vec<u8>>;

    /// Advance transport time
    fn advance(&mut self, _dt: Duration) {}
}

/// Immediate, lossless, in-order delivery
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    inboxes: BTreeMap<PeerId, VecDeque<Vec<u8>>>,
    delivered: u64,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames handed to receivers so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Frames waiting for `peer`
    pub fn pending(&self, peer: PeerId) -> usize {
        self.inboxes.get(&peer).map_or(0, VecDeque::len)
    }
}

impl Transport for LoopbackTransport {
    fn register(&mut self, peer: PeerId) {
        self.inboxes.entry(peer).or_default();
    }

    fn unregister(&mut self, peer: PeerId) {
        self.inboxes.remove(&peer);
    }

    fn broadcast(&mut self, from: PeerId, frame: Vec<u8>) {
        for (peer, inbox) in self.inboxes.iter_mut() {
            if *peer != from {
                inbox.push_back(frame.clone());
            }
        }
    }

    fn receive(&mut self, peer: PeerId) -> Vec<Vec<u8>> {
        let frames: Vec<Vec<u8>> = match self.inboxes.get_mut(&peer) {
            Some(inbox) => inbox.drain(..).collect(),
            None => Vec::new(),
        };
        self.delivered += frames.len() as u64;
        frames
    }
}
