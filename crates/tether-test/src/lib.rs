//! Tether Test Harness - Chaos networks and multi-peer scenarios
//!
//! This crate provides:
//! - Per-link chaos (latency, jitter, loss, reordering, duplication)
//! - A simulated transport for in-process sessions
//! - Scripted avatars and a scenario builder for end-to-end tests

pub mod chaos;
pub mod harness;
pub mod simulator;

pub use chaos::*;
pub use harness::*;
pub use simulator::*;
