//! Peer runtime
//!
//! One peer hosts a replica of every networked object together with its
//! local rigid body. Each frame the host calls, in order:
//! 1. `receive` for every inbound frame
//! 2. `physics_step` at the fixed physics rate
//! 3. `late_step` after avatars are posed
//! 4. `flush`, then drains `pop_outgoing` into the transport

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use tether_authority::AuthorityManager;
use tether_core::{
    AnchorResolver, ObjectId, PeerId, PhysicsBody, PickupConfig, TetherError, TetherResult,
};
use tether_state::{IngestOutcome, NetworkedObject, RestDefaults};
use tether_wire::SyncFrame;
use tracing::{debug, trace, warn};

use crate::RuntimeConfig;

/// One object replica and its local body
#[derive(Debug)]
pub struct Slot<B> {
    pub manager: AuthorityManager,
    pub body: B,
}

#[derive(Clone, Debug, Default)]
pub struct PeerStats {
    pub ticks: u64,
    pub frames_in: u64,
    pub frames_out: u64,
    pub decode_errors: u64,
    pub stale_dropped: u64,
    /// Deltas left dirty because the outgoing queue was full
    pub deltas_deferred: u64,
    pub last_tick_duration: Duration,
}

/// A participant hosting many object replicas
#[derive(Debug)]
pub struct Peer<B: PhysicsBody> {
    id: PeerId,
    pickup: PickupConfig,
    max_outbound: usize,
    objects: BTreeMap<ObjectId, Slot<B>>,
    outgoing: VecDeque<Vec<u8>>,
    stats: PeerStats,
}

impl<B: PhysicsBody> Peer<B> {
    pub fn new(id: PeerId, pickup: PickupConfig, max_outbound: usize) -> Self {
        Peer {
            id,
            pickup,
            max_outbound,
            objects: BTreeMap::new(),
            outgoing: VecDeque::new(),
            stats: PeerStats::default(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> TetherResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.local_peer(),
            config.pickup_config(),
            config.max_outbound_frames,
        ))
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn stats(&self) -> &PeerStats {
        &self.stats
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Register a replica of `object` whose current authority is `authority`
    pub fn register(
        &mut self,
        object: ObjectId,
        authority: PeerId,
        defaults: RestDefaults,
        body: B,
    ) -> TetherResult<()> {
        if self.objects.contains_key(&object) {
            return Err(TetherError::DuplicateObject(object));
        }
        let record = NetworkedObject::new(object, authority, defaults);
        let manager = AuthorityManager::new(self.id, record, self.pickup.clone())?;
        self.objects.insert(object, Slot { manager, body });
        Ok(())
    }

    pub fn slot(&self, object: ObjectId) -> TetherResult<&Slot<B>> {
        self.objects
            .get(&object)
            .ok_or(TetherError::UnknownObject(object))
    }

    pub fn slot_mut(&mut self, object: ObjectId) -> TetherResult<&mut Slot<B>> {
        self.objects
            .get_mut(&object)
            .ok_or(TetherError::UnknownObject(object))
    }

    pub fn manager(&self, object: ObjectId) -> TetherResult<&AuthorityManager> {
        self.slot(object).map(|s| &s.manager)
    }

    pub fn body(&self, object: ObjectId) -> TetherResult<&B> {
        self.slot(object).map(|s| &s.body)
    }

    /// Run `f` against one object's manager and body
    pub fn with_object<T>(
        &mut self,
        object: ObjectId,
        f: impl FnOnce(&mut AuthorityManager, &mut B) -> T,
    ) -> TetherResult<T> {
        let Slot { manager, body } = self.slot_mut(object)?;
        Ok(f(manager, body))
    }

    /// Decode and route one inbound frame
    pub fn receive(&mut self, bytes: &[u8]) -> TetherResult<IngestOutcome> {
        let frame = match SyncFrame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(peer = ?self.id, error = %e, "dropping undecodable frame");
                return Err(e);
            }
        };
        self.stats.frames_in += 1;

        let Slot { manager, body } = self.slot_mut(frame.header.object)?;
        let outcome = manager.ingest(&frame, body);
        if outcome == IngestOutcome::Stale {
            self.stats.stale_dropped += 1;
        }
        Ok(outcome)
    }

    /// Fixed-rate physics step for every object
    pub fn physics_step(&mut self, dt: Duration) {
        let start = Instant::now();
        self.stats.ticks += 1;
        for slot in self.objects.values_mut() {
            slot.manager.on_physics_step(dt, &mut slot.body);
        }
        self.stats.last_tick_duration = start.elapsed();
    }

    /// Late step for every object. Skipped entirely while the local peer's
    /// own avatar does not resolve (joining or leaving).
    pub fn late_step<R: AnchorResolver>(&mut self, anchors: &R) {
        if !anchors.is_present(self.id) {
            trace!(peer = ?self.id, "local peer not present, skipping late step");
            return;
        }
        for slot in self.objects.values_mut() {
            slot.manager.on_late_step(&mut slot.body, anchors);
        }
    }

    /// Encode every pending frame into the outgoing queue. Returns the
    /// number queued.
    ///
    /// Forced and transfer frames are always queued. Deltas are taken only
    /// while the queue is below `max_outbound`; a delta that does not fit
    /// stays dirty in its object and goes out on a later flush.
    pub fn flush(&mut self) -> usize {
        let mut queued = 0;
        for slot in self.objects.values_mut() {
            for frame in slot.manager.take_control_frames() {
                self.outgoing.push_back(frame.encode());
                queued += 1;
            }
            if !slot.manager.has_pending_delta() {
                continue;
            }
            if self.outgoing.len() >= self.max_outbound {
                self.stats.deltas_deferred += 1;
                debug!(peer = ?self.id, object = ?slot.manager.object().id(), "outgoing queue full, delta deferred");
                continue;
            }
            if let Some(frame) = slot.manager.take_delta() {
                self.outgoing.push_back(frame.encode());
                queued += 1;
            }
        }
        queued
    }

    /// Next encoded frame for the transport
    pub fn pop_outgoing(&mut self) -> Option<Vec<u8>> {
        let frame = self.outgoing.pop_front();
        if frame.is_some() {
            self.stats.frames_out += 1;
        }
        frame
    }
}
