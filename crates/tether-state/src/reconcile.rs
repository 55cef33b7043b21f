//! Inbound frame ingestion
//!
//! Frames are accepted only from the receiver's current authority view,
//! and only if their sequence is newer than the last one applied from
//! that sender. A transfer frame moves the authority view to its sender.

use tether_core::{PeerId, PhysicsBody};
use tether_wire::{FieldMask, FrameKind, SyncFrame};
use tracing::{debug, trace};

use crate::{Field, FieldContext, FieldWrite, NetworkedObject};

/// What happened to an inbound frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Fields in the mask were stored
    Applied(FieldMask),
    /// Write authority moved to this peer
    Transferred(PeerId),
    /// Older than, or equal to, a frame already applied
    Stale,
    /// Sender is not the current authority
    NotAuthority,
    /// Echo of a frame this peer sent
    OwnFrame,
    /// Addressed to another object
    WrongObject,
}

/// Serial-number comparison tolerant of wrap-around
#[inline]
pub fn seq_newer(seq: u32, than: u32) -> bool {
    (seq.wrapping_sub(than) as i32) > 0
}

impl NetworkedObject {
    /// Ingest a frame received from the transport
    pub fn ingest<B: PhysicsBody>(
        &mut self,
        frame: &SyncFrame,
        ctx: &mut FieldContext<'_, B>,
    ) -> IngestOutcome {
        let header = &frame.header;

        if header.object != self.id() {
            return IngestOutcome::WrongObject;
        }
        if header.sender == ctx.local {
            return IngestOutcome::OwnFrame;
        }

        if header.kind == FrameKind::Transfer {
            if let Some((sender, last)) = self.last_seen {
                if sender == header.sender && !seq_newer(header.seq, last) {
                    debug!(object = ?self.id(), seq = header.seq, last, "dropping repeated transfer");
                    return IngestOutcome::Stale;
                }
            }
            debug!(object = ?self.id(), from = ?self.authority(), to = ?header.sender, "authority transferred");
            self.set_authority(header.sender);
            self.last_seen = Some((header.sender, header.seq));
            return IngestOutcome::Transferred(header.sender);
        }

        if !self.is_authority(header.sender) {
            debug!(object = ?self.id(), sender = ?header.sender, authority = ?self.authority(), "dropping frame from non-authority");
            return IngestOutcome::NotAuthority;
        }

        if let Some((sender, last)) = self.last_seen {
            if sender == header.sender && !seq_newer(header.seq, last) {
                debug!(object = ?self.id(), seq = header.seq, last, "dropping stale frame");
                return IngestOutcome::Stale;
            }
        }
        self.last_seen = Some((header.sender, header.seq));

        let mask = frame.mask();
        for field in Field::ALL {
            if mask.contains(field.bit()) {
                self.apply_remote(FieldWrite::from_values(field, &frame.values), ctx);
            }
        }
        trace!(object = ?self.id(), seq = header.seq, mask = mask.0, "frame applied");

        IngestOutcome::Applied(mask)
    }
}
