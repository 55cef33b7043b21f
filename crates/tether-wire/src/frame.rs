//! Complete frame structure for tether
//!
//! Frame = Fixed Header + masked field payload

use bytes::{Buf, BufMut};
use tether_core::{Anchor, ObjectId, PeerId, Quat, TetherError, TetherResult, Vec3};

use crate::{FieldMask, FrameKind, SyncHeader, HEADER_SIZE};

/// Wire value of an unheld object's holder field
pub const UNOWNED_WIRE: u32 = u32::MAX;

/// Largest possible frame (every field present)
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + 4 + 1 + 16 + 12 + 1 + 12 + 16 + 12 + 12;

/// Values of every replicated field. Which ones a frame carries is
/// decided by the header mask; absent fields decode to defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldValues {
    pub holder: Option<PeerId>,
    pub anchor: Anchor,
    pub offset_rotation: Quat,
    pub offset_position: Vec3,
    pub frozen: bool,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// A single replication frame
#[derive(Clone, Debug, PartialEq)]
pub struct SyncFrame {
    pub header: SyncHeader,
    pub values: FieldValues,
}

impl SyncFrame {
    pub fn new(header: SyncHeader, values: FieldValues) -> Self {
        SyncFrame { header, values }
    }

    /// Authority announcement frame
    pub fn transfer(object: ObjectId, new_authority: PeerId, seq: u32) -> Self {
        SyncFrame {
            header: SyncHeader::new(FrameKind::Transfer, object, new_authority, seq),
            values: FieldValues::default(),
        }
    }

    #[inline]
    pub fn mask(&self) -> FieldMask {
        self.header.mask
    }

    /// Payload size implied by a mask
    pub fn payload_len(mask: FieldMask) -> usize {
        let mut len = 0;
        if mask.contains(FieldMask::HOLDER) {
            len += 4;
        }
        if mask.contains(FieldMask::ANCHOR) {
            len += 1;
        }
        if mask.contains(FieldMask::OFFSET_ROTATION) {
            len += 16;
        }
        if mask.contains(FieldMask::OFFSET_POSITION) {
            len += 12;
        }
        if mask.contains(FieldMask::FROZEN) {
            len += 1;
        }
        if mask.contains(FieldMask::POSITION) {
            len += 12;
        }
        if mask.contains(FieldMask::ROTATION) {
            len += 16;
        }
        if mask.contains(FieldMask::LINEAR_VELOCITY) {
            len += 12;
        }
        if mask.contains(FieldMask::ANGULAR_VELOCITY) {
            len += 12;
        }
        len
    }

    /// Serialize frame to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mask = self.header.mask;
        let mut buf = Vec::with_capacity(HEADER_SIZE + Self::payload_len(mask));
        self.header.serialize(&mut buf);

        let v = &self.values;
        if mask.contains(FieldMask::HOLDER) {
            buf.put_u32_le(v.holder.map_or(UNOWNED_WIRE, |p| p.0));
        }
        if mask.contains(FieldMask::ANCHOR) {
            buf.put_u8(v.anchor.to_byte());
        }
        if mask.contains(FieldMask::OFFSET_ROTATION) {
            put_quat(&mut buf, v.offset_rotation);
        }
        if mask.contains(FieldMask::OFFSET_POSITION) {
            put_vec3(&mut buf, v.offset_position);
        }
        if mask.contains(FieldMask::FROZEN) {
            buf.put_u8(v.frozen as u8);
        }
        if mask.contains(FieldMask::POSITION) {
            put_vec3(&mut buf, v.position);
        }
        if mask.contains(FieldMask::ROTATION) {
            put_quat(&mut buf, v.rotation);
        }
        if mask.contains(FieldMask::LINEAR_VELOCITY) {
            put_vec3(&mut buf, v.linear_velocity);
        }
        if mask.contains(FieldMask::ANGULAR_VELOCITY) {
            put_vec3(&mut buf, v.angular_velocity);
        }
        buf
    }

    /// Parse frame from bytes
    pub fn decode(buf: &[u8]) -> TetherResult<Self> {
        let header = SyncHeader::parse(buf)?;
        let mask = header.mask;

        let expected = HEADER_SIZE + Self::payload_len(mask);
        if buf.len() < expected {
            return Err(TetherError::BufferTooShort {
                expected,
                actual: buf.len(),
            });
        }
        if buf.len() > expected {
            return Err(TetherError::InvalidWireFormat(format!(
                "Trailing bytes: {} > {}",
                buf.len(),
                expected
            )));
        }

        let mut cur = &buf[HEADER_SIZE..];
        let mut v = FieldValues::default();

        if mask.contains(FieldMask::HOLDER) {
            let raw = cur.get_u32_le();
            v.holder = (raw != UNOWNED_WIRE).then_some(PeerId::new(raw));
        }
        if mask.contains(FieldMask::ANCHOR) {
            let raw = cur.get_u8();
            v.anchor = Anchor::from_byte(raw).ok_or(TetherError::UnknownAnchor(raw))?;
        }
        if mask.contains(FieldMask::OFFSET_ROTATION) {
            v.offset_rotation = get_quat(&mut cur);
        }
        if mask.contains(FieldMask::OFFSET_POSITION) {
            v.offset_position = get_vec3(&mut cur);
        }
        if mask.contains(FieldMask::FROZEN) {
            v.frozen = match cur.get_u8() {
                0 => false,
                1 => true,
                other => {
                    return Err(TetherError::InvalidWireFormat(format!(
                        "Invalid frozen flag: {}",
                        other
                    )))
                }
            };
        }
        if mask.contains(FieldMask::POSITION) {
            v.position = get_vec3(&mut cur);
        }
        if mask.contains(FieldMask::ROTATION) {
            v.rotation = get_quat(&mut cur);
        }
        if mask.contains(FieldMask::LINEAR_VELOCITY) {
            v.linear_velocity = get_vec3(&mut cur);
        }
        if mask.contains(FieldMask::ANGULAR_VELOCITY) {
            v.angular_velocity = get_vec3(&mut cur);
        }

        Ok(SyncFrame { header, values: v })
    }
}

fn put_vec3(buf: &mut impl BufMut, v: Vec3) {
    buf.put_f32_le(v.x);
    buf.put_f32_le(v.y);
    buf.put_f32_le(v.z);
}

fn put_quat(buf: &mut impl BufMut, q: Quat) {
    buf.put_f32_le(q.w);
    buf.put_f32_le(q.x);
    buf.put_f32_le(q.y);
    buf.put_f32_le(q.z);
}

fn get_vec3(buf: &mut impl Buf) -> Vec3 {
    Vec3::new(buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le())
}

fn get_quat(buf: &mut impl Buf) -> Quat {
    Quat::new(
        buf.get_f32_le(),
        buf.get_f32_le(),
        buf.get_f32_le(),
        buf.get_f32_le(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held_frame() -> SyncFrame {
        let mut header = SyncHeader::new(FrameKind::Delta, ObjectId::new(42), PeerId::new(3), 9);
        header.mask = FieldMask::new(FieldMask::ATTACHMENT);
        SyncFrame::new(
            header,
            FieldValues {
                holder: Some(PeerId::new(3)),
                anchor: Anchor::Right,
                offset_rotation: Quat::from_euler(0.1, 0.2, 0.3),
                offset_position: Vec3::new(0.0, 0.05, 0.1),
                ..FieldValues::default()
            },
        )
    }

    #[test]
    fn test_masked_fields_only() {
        let frame = held_frame();
        let bytes = frame.encode();

        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 1 + 16 + 12);
        assert_eq!(SyncFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_unowned_holder_encoding() {
        let mut frame = held_frame();
        frame.values.holder = None;
        frame.values.anchor = Anchor::None;

        let bytes = frame.encode();
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &UNOWNED_WIRE.to_le_bytes());

        let decoded = SyncFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.values.holder, None);
    }

    #[test]
    fn test_full_frame_size() {
        let mut header = SyncHeader::new(FrameKind::Forced, ObjectId::new(1), PeerId::new(1), 0);
        header.mask = FieldMask::all();
        let frame = SyncFrame::new(header, FieldValues::default());

        assert_eq!(frame.encode().len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = held_frame().encode();
        let result = SyncFrame::decode(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(TetherError::BufferTooShort { .. })));
    }

    #[test]
    fn test_bad_anchor_byte() {
        let mut bytes = held_frame().encode();
        bytes[HEADER_SIZE + 4] = 5;
        assert!(matches!(
            SyncFrame::decode(&bytes),
            Err(TetherError::UnknownAnchor(5))
        ));
    }

    #[test]
    fn test_transfer_frame_is_header_only() {
        let frame = SyncFrame::transfer(ObjectId::new(5), PeerId::new(8), 0);
        let bytes = frame.encode();

        assert_eq!(bytes.len(), HEADER_SIZE);
        let decoded = SyncFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.header.kind, FrameKind::Transfer);
        assert_eq!(decoded.header.sender, PeerId::new(8));
    }
}
