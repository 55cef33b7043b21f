//! Tether Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every tether crate:
//! - Identifiers (PeerId, ObjectId, Anchor)
//! - Geometry (Vec3, Quat, Pose)
//! - The rigid-body and anchor boundaries towards the hosting environment
//! - Pickup configuration and error types

pub mod anchor;
pub mod body;
pub mod config;
pub mod error;
pub mod id;
pub mod math;

pub use anchor::*;
pub use body::*;
pub use config::*;
pub use error::*;
pub use id::*;
pub use math::*;
