//! Identity types for tether
//!
//! Peer identifiers are 32-bit (sessions never hold more peers than that),
//! object identifiers are 64-bit so hosts can pack scene and instance bits.

use std::fmt;

/// Peer identity - one participant in the shared environment
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PeerId(pub u32);

impl PeerId {
    pub const ZERO: PeerId = PeerId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        PeerId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        PeerId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Networked object identity - unique within a session
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub const ZERO: ObjectId = ObjectId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        ObjectId(id)
    }

    /// Create an object ID from scene prefix and instance ID
    /// Format: \[scene:16\]\[instance:48\]
    #[inline]
    pub fn from_scene_instance(scene: u16, instance: u64) -> Self {
        ObjectId(((scene as u64) << 48) | (instance & 0x0000_FFFF_FFFF_FFFF))
    }

    #[inline]
    pub fn scene(self) -> u16 {
        (self.0 >> 48) as u16
    }

    #[inline]
    pub fn instance(self) -> u64 {
        self.0 & 0x0000_FFFF_FFFF_FFFF
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        ObjectId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:04x}:{:012x})", self.scene(), self.instance())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:012x}", self.scene(), self.instance())
    }
}

/// Which of the holder's manipulable anchor points an object is bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Anchor {
    #[default]
    None = 0,
    Left = 1,
    Right = 2,
}

impl Anchor {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Anchor::None),
            1 => Some(Anchor::Left),
            2 => Some(Anchor::Right),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_some(self) -> bool {
        self != Anchor::None
    }

    /// The anchor on the opposite side of the body
    pub fn opposite(self) -> Self {
        match self {
            Anchor::None => Anchor::None,
            Anchor::Left => Anchor::Right,
            Anchor::Right => Anchor::Left,
        }
    }
}
