//! Tether Runtime - Peers, sessions and plumbing
//!
//! This crate implements:
//! - `Peer`, which hosts many objects and turns their state into frames
//! - `Session`, an in-process group of peers joined by a `Transport`
//! - Runtime configuration loaded from JSON
//! - Tracing initialisation

pub mod config;
pub mod logging;
pub mod peer;
pub mod session;
pub mod transport;

pub use config::*;
pub use logging::*;
pub use peer::*;
pub use session::*;
pub use transport::*;
