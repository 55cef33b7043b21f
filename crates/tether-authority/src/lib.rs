//! Tether Authority - Who may write an object, and what that implies
//!
//! This crate implements:
//! - The mode transition table keyed by (mode, event)
//! - Transfer arbitration (theft policy, frozen and pickupable checks)
//! - `AuthorityManager`, which owns one object's record and drives the
//!   scheduler, replicator and attachment tracker
//! - The freeze gate and teleport control operations

pub mod control;
pub mod freeze;
pub mod machine;
pub mod manager;
pub mod policy;
pub mod teleport;

pub use freeze::*;
pub use machine::*;
pub use manager::*;
pub use policy::*;
pub use teleport::*;
