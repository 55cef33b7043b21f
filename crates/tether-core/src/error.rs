//! Error types for tether
//!
//! Protocol outcomes (denied transfers, non-authority writes, stale frames)
//! are reported as values, not errors. These cover decoding, configuration
//! and lookups only.

use thiserror::Error;

use crate::{ObjectId, PeerId};

/// Core tether errors
#[derive(Error, Debug)]
pub enum TetherError {
    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown frame kind: {0}")]
    UnknownFrameKind(u8),

    #[error("Unknown anchor: {0}")]
    UnknownAnchor(u8),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Runtime lookup errors
    #[error("Object not found: {0:?}")]
    UnknownObject(ObjectId),

    #[error("Object already registered: {0:?}")]
    DuplicateObject(ObjectId),

    #[error("Peer not found: {0:?}")]
    UnknownPeer(PeerId),

    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Result type for tether operations
pub type TetherResult<T> = Result<T, TetherError>;
