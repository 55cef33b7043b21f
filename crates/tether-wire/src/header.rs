//! Fixed header for tether frames
//!
//! Fixed header is 20 bytes:
//! - Byte 0: Version
//! - Byte 1: Frame kind
//! - Bytes 2-3: Field mask (LE)
//! - Bytes 4-11: Object ID (LE)
//! - Bytes 12-15: Sender peer ID (LE)
//! - Bytes 16-19: Sequence (LE), per object and sender

use bytes::{Buf, BufMut};
use tether_core::{ObjectId, PeerId, TetherError, TetherResult};

use crate::FieldMask;

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 20;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// What a frame carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FrameKind {
    /// Scheduled delta push of dirty fields
    #[default]
    Delta = 0,
    /// Unconditional full-state push (release, teleport)
    Forced = 1,
    /// Write authority moved to the sender; no payload
    Transfer = 2,
}

impl FrameKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(FrameKind::Delta),
            1 => Some(FrameKind::Forced),
            2 => Some(FrameKind::Transfer),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Fixed header structure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncHeader {
    pub version: u8,
    pub kind: FrameKind,
    pub mask: FieldMask,
    pub object: ObjectId,
    pub sender: PeerId,
    pub seq: u32,
}

impl SyncHeader {
    pub fn new(kind: FrameKind, object: ObjectId, sender: PeerId, seq: u32) -> Self {
        SyncHeader {
            version: WIRE_VERSION,
            kind,
            mask: FieldMask::NONE,
            object,
            sender,
            seq,
        }
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> TetherResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(TetherError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let mut cur = &buf[..HEADER_SIZE];

        let version = cur.get_u8();
        if version != WIRE_VERSION {
            return Err(TetherError::UnsupportedVersion(version));
        }

        let kind_byte = cur.get_u8();
        let kind = FrameKind::from_byte(kind_byte).ok_or(TetherError::UnknownFrameKind(kind_byte))?;

        let mask = FieldMask::new(cur.get_u16_le());
        if mask.unknown_bits() != 0 {
            return Err(TetherError::InvalidWireFormat(format!(
                "Unknown field bits: {:#06x}",
                mask.unknown_bits()
            )));
        }
        if kind == FrameKind::Transfer && !mask.is_empty() {
            return Err(TetherError::InvalidWireFormat(
                "Transfer frame carries fields".into(),
            ));
        }

        let object = ObjectId::new(cur.get_u64_le());
        let sender = PeerId::new(cur.get_u32_le());
        let seq = cur.get_u32_le();

        Ok(SyncHeader {
            version,
            kind,
            mask,
            object,
            sender,
            seq,
        })
    }

    /// Serialize header into a buffer
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.kind.to_byte());
        buf.put_u16_le(self.mask.0);
        buf.put_u64_le(self.object.0);
        buf.put_u32_le(self.sender.0);
        buf.put_u32_le(self.seq);
    }

    /// Serialize header to a new Vec
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        self.serialize(&mut buf);
        buf
    }
}

impl Default for SyncHeader {
    fn default() -> Self {
        SyncHeader::new(FrameKind::Delta, ObjectId::ZERO, PeerId::ZERO, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut header = SyncHeader::new(
            FrameKind::Forced,
            ObjectId::new(0xDEADBEEF_CAFEBABE),
            PeerId::new(7),
            0x0102_0304,
        );
        header.mask = FieldMask::new(FieldMask::PHYSICS);

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(bytes[0], WIRE_VERSION);
        assert_eq!(bytes[1], FrameKind::Forced.to_byte());
        assert_eq!(&bytes[16..20], &[0x04, 0x03, 0x02, 0x01]);

        assert_eq!(SyncHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_too_short() {
        let buf = [0u8; 12];
        let result = SyncHeader::parse(&buf);
        assert!(matches!(result, Err(TetherError::BufferTooShort { .. })));
    }

    #[test]
    fn test_header_rejects_unknown_kind() {
        let mut bytes = SyncHeader::default().to_bytes();
        bytes[1] = 9;
        assert!(matches!(
            SyncHeader::parse(&bytes),
            Err(TetherError::UnknownFrameKind(9))
        ));
    }

    #[test]
    fn test_transfer_with_fields_rejected() {
        let mut header = SyncHeader::new(FrameKind::Transfer, ObjectId::new(1), PeerId::new(2), 0);
        header.mask = FieldMask::new(FieldMask::HOLDER);

        assert!(matches!(
            SyncHeader::parse(&header.to_bytes()),
            Err(TetherError::InvalidWireFormat(_))
        ));
    }
}
