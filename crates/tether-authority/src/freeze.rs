//! Freeze gate
//!
//! A frozen object skips all per-tick work on every peer. Freezing a held
//! object releases it first; a frozen object is never held.

use tether_core::PhysicsBody;

use crate::{AuthorityManager, ObjectEvent};

impl AuthorityManager {
    /// Set the frozen flag. A no-op unless the local peer is the authority.
    /// Returns true if the flag changed.
    pub fn set_frozen<B: PhysicsBody>(&mut self, frozen: bool, body: &mut B) -> bool {
        if frozen == self.object().is_frozen() {
            return false;
        }
        let event = if frozen {
            ObjectEvent::Freeze
        } else {
            ObjectEvent::Unfreeze
        };
        !self.handle_local(event, body).is_noop()
    }

    /// Whether per-tick work is currently skipped
    pub fn ticks_suspended(&self) -> bool {
        self.object().is_frozen()
    }
}
