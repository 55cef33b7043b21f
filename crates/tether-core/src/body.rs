//! Rigid-body boundary
//!
//! The hosting physics engine owns collision and constraint solving.
//! Tether only reads and writes the kinematic channels exposed here.

use crate::{Pose, Quat, Vec3};

/// The six replicated physical channels of a free body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl BodyState {
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            position: pose.position,
            rotation: pose.rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    /// True if any channel differs by more than `epsilon`.
    /// An epsilon of zero is an exact comparison.
    pub fn differs(&self, other: &BodyState, epsilon: f32) -> bool {
        if epsilon <= 0.0 {
            return self != other;
        }
        !(self.position.approx_eq(other.position, epsilon)
            && self.rotation.approx_eq(other.rotation, epsilon)
            && self.linear_velocity.approx_eq(other.linear_velocity, epsilon)
            && self.angular_velocity.approx_eq(other.angular_velocity, epsilon))
    }
}

/// Physical flags restored whenever holding or authority ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyFlags {
    pub pickupable: bool,
    pub kinematic: bool,
    pub gravity: bool,
}

impl Default for BodyFlags {
    fn default() -> Self {
        Self {
            pickupable: true,
            kinematic: false,
            gravity: true,
        }
    }
}

/// A rigid body owned by the hosting physics engine
pub trait PhysicsBody {
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    fn linear_velocity(&self) -> Vec3;
    fn angular_velocity(&self) -> Vec3;

    fn set_position(&mut self, position: Vec3);
    fn set_rotation(&mut self, rotation: Quat);
    fn set_linear_velocity(&mut self, velocity: Vec3);
    fn set_angular_velocity(&mut self, velocity: Vec3);

    /// Kinematic placement for the next step (no impulse, no collision response)
    fn move_to(&mut self, pose: Pose);

    fn is_kinematic(&self) -> bool;
    fn set_kinematic(&mut self, kinematic: bool);
    fn gravity_enabled(&self) -> bool;
    fn set_gravity_enabled(&mut self, enabled: bool);
    fn is_sleeping(&self) -> bool;

    fn pose(&self) -> Pose {
        Pose::new(self.position(), self.rotation())
    }

    fn capture(&self) -> BodyState {
        BodyState {
            position: self.position(),
            rotation: self.rotation(),
            linear_velocity: self.linear_velocity(),
            angular_velocity: self.angular_velocity(),
        }
    }
}

/// In-memory rigid body for headless peers and tests.
///
/// Integrates ballistic motion against an optional floor plane and falls
/// asleep once both speeds stay under `sleep_threshold`.
#[derive(Debug, Clone)]
pub struct MemoryBody {
    pub state: BodyState,
    pub kinematic: bool,
    pub gravity: bool,
    pub sleeping: bool,
    pub floor: Option<f32>,
    pub sleep_threshold: f32,
    /// Number of kinematic placements received
    pub placements: u64,
}

impl MemoryBody {
    pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

    pub fn new(pose: Pose, flags: BodyFlags) -> Self {
        Self {
            state: BodyState::at_rest(pose),
            kinematic: flags.kinematic,
            gravity: flags.gravity,
            sleeping: true,
            floor: Some(0.0),
            sleep_threshold: 0.01,
            placements: 0,
        }
    }

    pub fn wake(&mut self) {
        self.sleeping = false;
    }

    /// Advance the body by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        if self.kinematic || self.sleeping {
            return;
        }

        if self.gravity {
            self.state.linear_velocity += Self::GRAVITY * dt;
        }
        self.state.position += self.state.linear_velocity * dt;

        let spin = self.state.angular_velocity;
        let angle = spin.length() * dt;
        if angle > 0.0 {
            self.state.rotation =
                (Quat::from_axis_angle(spin, angle) * self.state.rotation).normalize();
        }

        if let Some(floor) = self.floor {
            if self.state.position.y <= floor {
                self.state.position.y = floor;
                self.state.linear_velocity = Vec3::ZERO;
                self.state.angular_velocity = self.state.angular_velocity * 0.5;
            }
        }

        let resting = self.state.linear_velocity.length() < self.sleep_threshold
            && self.state.angular_velocity.length() < self.sleep_threshold;
        let supported = !self.gravity
            || self
                .floor
                .map_or(false, |floor| self.state.position.y <= floor);
        if resting && supported {
            self.state.linear_velocity = Vec3::ZERO;
            self.state.angular_velocity = Vec3::ZERO;
            self.sleeping = true;
        }
    }
}

impl PhysicsBody for MemoryBody {
    fn position(&self) -> Vec3 {
        self.state.position
    }

    fn rotation(&self) -> Quat {
        self.state.rotation
    }

    fn linear_velocity(&self) -> Vec3 {
        self.state.linear_velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.state.angular_velocity
    }

    fn set_position(&mut self, position: Vec3) {
        self.state.position = position;
        self.wake();
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.state.rotation = rotation;
        self.wake();
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.state.linear_velocity = velocity;
        self.wake();
    }

    fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.state.angular_velocity = velocity;
        self.wake();
    }

    fn move_to(&mut self, pose: Pose) {
        self.state.position = pose.position;
        self.state.rotation = pose.rotation;
        self.placements += 1;
    }

    fn is_kinematic(&self) -> bool {
        self.kinematic
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        self.kinematic = kinematic;
    }

    fn gravity_enabled(&self) -> bool {
        self.gravity
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.gravity = enabled;
        self.wake();
    }

    fn is_sleeping(&self) -> bool {
        self.sleeping
    }
}
