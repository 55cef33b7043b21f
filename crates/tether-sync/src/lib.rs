//! Tether Sync - Per-object replication components
//!
//! Leaf components driven by the authority manager:
//! - `SyncScheduler`: two-timer adaptive push scheduling
//! - `RigidBodyReplicator`: diff-suppressed capture and snap-to-latest apply
//! - `AttachmentTracker`: anchor-relative offset capture and application

pub mod attachment;
pub mod replicator;
pub mod scheduler;

pub use attachment::*;
pub use replicator::*;
pub use scheduler::*;
