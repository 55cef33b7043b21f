//! Tether Wire Protocol - Binary frame format
//!
//! Only the replicated fields of a networked object cross the network:
//! - Fixed header (20 bytes)
//! - Field mask selecting which fields follow
//! - Field payload in mask-bit order

pub mod frame;
pub mod header;
pub mod mask;

pub use frame::*;
pub use header::*;
pub use mask::*;
