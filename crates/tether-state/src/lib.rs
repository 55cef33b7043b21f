//! Tether State - The replicated record of one networked object
//!
//! This crate implements:
//! - The `NetworkedObject` record and its derived mode
//! - The per-field write table (authority check, update, side effect, dirty mark)
//! - Outbound frame building from dirty fields
//! - Inbound frame ingestion with per-sender sequence guarding

pub mod field;
pub mod object;
pub mod reconcile;

pub use field::*;
pub use object::*;
pub use reconcile::*;
