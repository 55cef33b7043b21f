//! Mode transition table
//!
//! Every lifecycle event is looked up by (current mode, event) and yields
//! the next mode plus an ordered list of actions. Actions run in order,
//! which is how drop-before-grab is guaranteed.

use tether_core::{Anchor, Pose};
use tether_state::Mode;

/// Lifecycle events for one object, as seen by one peer
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObjectEvent {
    /// The local peer grabbed with `anchor` (authority already granted)
    Grab { anchor: Anchor },
    /// The local peer let go
    Release,
    /// The authority removes the current holder ahead of a transfer
    ForceDrop,
    /// The recorded holder no longer resolves
    HolderLost,
    /// The holder's input moved the object to another anchor
    AnchorChanged { anchor: Anchor },
    Freeze,
    Unfreeze,
    Teleport { pose: Pose },
}

/// Side-effecting steps executed by the manager
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Write holder = none, anchor = none, reset offsets
    ClearHolder,
    /// Put local kinematic/gravity/pickupable flags back to rest defaults
    RestoreDefaults,
    /// Write holder = local peer with this anchor
    AssignHolder(Anchor),
    /// Recompute and write the anchor-relative offset
    CaptureOffset,
    /// Re-arm the scheduler and push on the next tick
    ArmImmediate,
    /// Capture physics and emit a full forced frame now
    ForcePush,
    SetFrozen(bool),
    /// Place the body directly at a pose
    PlaceBody(Pose),
    /// Zero both velocities unless the body is kinematic
    ZeroVelocity,
}

/// Inputs the table needs beyond the mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionContext {
    pub is_authority: bool,
    pub auto_unfreeze: bool,
}

/// Outcome of a table lookup
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: Mode,
    pub actions: Vec<Action>,
}

impl Transition {
    fn stay(mode: Mode) -> Self {
        Transition {
            next: mode,
            actions: Vec::new(),
        }
    }

    fn to(next: Mode, actions: Vec<Action>) -> Self {
        Transition { next, actions }
    }

    /// No state change and no actions
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Look up the transition for `event` in `mode`
pub fn transition(mode: Mode, event: ObjectEvent, cx: TransitionContext) -> Transition {
    use Action::*;

    if !cx.is_authority {
        // Non-authority peers never write; they only repair local flags
        return match (mode, event) {
            (Mode::HeldRemote(_), ObjectEvent::HolderLost) | (_, ObjectEvent::Release) => {
                Transition::to(mode, vec![RestoreDefaults])
            }
            _ => Transition::stay(mode),
        };
    }

    match (mode, event) {
        // Grab
        (Mode::Frozen, ObjectEvent::Grab { anchor }) if anchor.is_some() => {
            if cx.auto_unfreeze {
                Transition::to(
                    Mode::HeldLocal,
                    vec![SetFrozen(false), AssignHolder(anchor), CaptureOffset, ArmImmediate],
                )
            } else {
                Transition::stay(mode)
            }
        }
        (Mode::HeldRemote(_), ObjectEvent::Grab { anchor }) if anchor.is_some() => Transition::to(
            Mode::HeldLocal,
            vec![ClearHolder, AssignHolder(anchor), CaptureOffset, ArmImmediate],
        ),
        (Mode::Free | Mode::HeldLocal, ObjectEvent::Grab { anchor }) if anchor.is_some() => {
            Transition::to(
                Mode::HeldLocal,
                vec![AssignHolder(anchor), CaptureOffset, ArmImmediate],
            )
        }

        // Release
        (Mode::HeldLocal | Mode::HeldRemote(_), ObjectEvent::Release) => {
            Transition::to(Mode::Free, vec![ClearHolder, ArmImmediate, ForcePush])
        }
        (_, ObjectEvent::Release) => Transition::to(mode, vec![RestoreDefaults]),

        // Forced drop ahead of a transfer
        (Mode::HeldLocal | Mode::HeldRemote(_), ObjectEvent::ForceDrop) => {
            Transition::to(Mode::Free, vec![ClearHolder, ForcePush])
        }

        // Holder vanished
        (Mode::HeldRemote(_), ObjectEvent::HolderLost) => {
            Transition::to(Mode::Free, vec![ClearHolder, ArmImmediate, ForcePush])
        }

        // Hand switch
        (Mode::HeldLocal, ObjectEvent::AnchorChanged { anchor }) if anchor.is_some() => {
            Transition::to(
                Mode::HeldLocal,
                vec![AssignHolder(anchor), CaptureOffset, ArmImmediate],
            )
        }

        // Freeze gate
        (Mode::HeldLocal | Mode::HeldRemote(_), ObjectEvent::Freeze) => {
            Transition::to(Mode::Frozen, vec![ClearHolder, SetFrozen(true), ForcePush])
        }
        (Mode::Free, ObjectEvent::Freeze) => {
            Transition::to(Mode::Frozen, vec![SetFrozen(true), ForcePush])
        }
        (Mode::Frozen, ObjectEvent::Unfreeze) => {
            Transition::to(Mode::Free, vec![SetFrozen(false), ArmImmediate])
        }

        // Teleport
        (_, ObjectEvent::Teleport { pose }) => {
            let mut actions = Vec::with_capacity(6);
            if mode.is_held() {
                actions.push(ClearHolder);
            }
            let next = if mode == Mode::Frozen && !cx.auto_unfreeze {
                Mode::Frozen
            } else {
                if mode == Mode::Frozen {
                    actions.push(SetFrozen(false));
                }
                Mode::Free
            };
            actions.extend([PlaceBody(pose), ZeroVelocity, ForcePush]);
            if next == Mode::Free {
                actions.push(ArmImmediate);
            }
            Transition::to(next, actions)
        }

        _ => Transition::stay(mode),
    }
}
