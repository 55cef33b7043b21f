//! Field mask for tether frames

/// Bitset over the replicated wire fields (2 bytes)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldMask(pub u16);

impl FieldMask {
    pub const NONE: FieldMask = FieldMask(0);

    // Field bits, in payload order
    pub const HOLDER: u16 = 1 << 0;
    pub const ANCHOR: u16 = 1 << 1;
    pub const OFFSET_ROTATION: u16 = 1 << 2;
    pub const OFFSET_POSITION: u16 = 1 << 3;
    pub const FROZEN: u16 = 1 << 4;
    pub const POSITION: u16 = 1 << 5;
    pub const ROTATION: u16 = 1 << 6;
    pub const LINEAR_VELOCITY: u16 = 1 << 7;
    pub const ANGULAR_VELOCITY: u16 = 1 << 8;

    /// Attachment fields (meaningful while held)
    pub const ATTACHMENT: u16 =
        Self::HOLDER | Self::ANCHOR | Self::OFFSET_ROTATION | Self::OFFSET_POSITION;
    /// Free-body physics channels
    pub const PHYSICS: u16 =
        Self::POSITION | Self::ROTATION | Self::LINEAR_VELOCITY | Self::ANGULAR_VELOCITY;
    pub const ALL: u16 = Self::ATTACHMENT | Self::FROZEN | Self::PHYSICS;

    #[inline]
    pub fn new(bits: u16) -> Self {
        FieldMask(bits)
    }

    #[inline]
    pub fn all() -> Self {
        FieldMask(Self::ALL)
    }

    #[inline]
    pub fn contains(self, bits: u16) -> bool {
        self.0 & bits == bits
    }

    #[inline]
    pub fn intersects(self, bits: u16) -> bool {
        self.0 & bits != 0
    }

    #[inline]
    pub fn insert(&mut self, bits: u16) {
        self.0 |= bits;
    }

    #[inline]
    pub fn remove(&mut self, bits: u16) {
        self.0 &= !bits;
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Bits outside the known field set
    #[inline]
    pub fn unknown_bits(self) -> u16 {
        self.0 & !Self::ALL
    }

    #[inline]
    pub fn has_physics(self) -> bool {
        self.intersects(Self::PHYSICS)
    }

    #[inline]
    pub fn has_attachment(self) -> bool {
        self.intersects(Self::ATTACHMENT)
    }
}

impl From<u16> for FieldMask {
    fn from(bits: u16) -> Self {
        FieldMask(bits)
    }
}

impl From<FieldMask> for u16 {
    fn from(mask: FieldMask) -> Self {
        mask.0
    }
}
