//! Simulated transport
//!
//! A [`Transport`] made of one [`ChaosNetwork`] per directed peer pair.
//! Links are created on registration with seeds derived from the
//! simulator seed, so a run is reproducible.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use tether_core::PeerId;
use tether_runtime::Transport;

use crate::chaos::{ChaosConfig, ChaosNetwork, ChaosStats};

pub struct NetworkSimulator {
    links: BTreeMap<(PeerId, PeerId), ChaosNetwork>,
    members: BTreeSet<PeerId>,
    inboxes: BTreeMap<PeerId, VecDeque<Vec<u8>>>,
    default_config: ChaosConfig,
    seed: u64,
    links_created: u64,
    now: Duration,
}

impl NetworkSimulator {
    pub fn new(default_config: ChaosConfig, seed: u64) -> Self {
        NetworkSimulator {
            links: BTreeMap::new(),
            members: BTreeSet::new(),
            inboxes: BTreeMap::new(),
            default_config,
            seed,
            links_created: 0,
            now: Duration::ZERO,
        }
    }

    pub fn perfect() -> Self {
        Self::new(ChaosConfig::perfect(), 0)
    }

    pub fn reliable(seed: u64) -> Self {
        Self::new(ChaosConfig::reliable(), seed)
    }

    fn open_link(&mut self, from: PeerId, to: PeerId, config: ChaosConfig) {
        let seed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(self.links_created);
        self.links_created += 1;
        self.links.insert((from, to), ChaosNetwork::new(config, seed));
    }

    /// Replace the conditions of one directed link
    pub fn set_link_config(&mut self, from: PeerId, to: PeerId, config: ChaosConfig) {
        self.open_link(from, to, config);
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn link_stats(&self, from: PeerId, to: PeerId) -> Option<&ChaosStats> {
        self.links.get(&(from, to)).map(ChaosNetwork::stats)
    }

    /// Statistics summed over every open link
    pub fn total_stats(&self) -> ChaosStats {
        let mut total = ChaosStats::default();
        for link in self.links.values() {
            total.merge(link.stats());
        }
        total
    }

    pub fn reset_stats(&mut self) {
        for link in self.links.values_mut() {
            link.reset_stats();
        }
    }

    /// Frames sent but not yet handed to a receiver
    pub fn in_flight(&self) -> usize {
        self.links.values().map(ChaosNetwork::in_flight).sum::<usize>()
            + self.inboxes.values().map(VecDeque::len).sum::<usize>()
    }
}

impl Transport for NetworkSimulator {
    fn register(&mut self, peer: PeerId) {
        if !self.members.insert(peer) {
            return;
        }
        let others: Vec<PeerId> = self.members.iter().copied().filter(|p| *p != peer).collect();
        for other in others {
            let config = self.default_config.clone();
            self.open_link(other, peer, config.clone());
            self.open_link(peer, other, config);
        }
        self.inboxes.entry(peer).or_default();
    }

    fn unregister(&mut self, peer: PeerId) {
        self.members.remove(&peer);
        self.inboxes.remove(&peer);
        self.links.retain(|(from, to), _| *from != peer && *to != peer);
    }

    fn broadcast(&mut self, from: PeerId, frame: Vec<u8>) {
        for ((src, _), link) in self.links.iter_mut() {
            if *src == from {
                link.send(frame.clone());
            }
        }
    }

    fn receive(&mut self, peer: PeerId) -> Vec<Vec<u8>> {
        match self.inboxes.get_mut(&peer) {
            Some(inbox) => inbox.drain(..).collect(),
            None => Vec::new(),
        }
    }

    fn advance(&mut self, dt: Duration) {
        self.now += dt;
        for ((_, to), link) in self.links.iter_mut() {
            let delivered = link.tick(dt);
            if let Some(inbox) = self.inboxes.get_mut(to) {
                inbox.extend(delivered);
            }
        }
    }
}
