//! Per-object pickup configuration

use std::time::Duration;

use crate::{TetherError, TetherResult};

/// Pickup replication configuration
#[derive(Clone, Debug, PartialEq)]
pub struct PickupConfig {
    /// Replicate free-body physics after release
    pub sync_rigidbody: bool,
    /// Pushes per second while synchronization is active (1..=60)
    pub sync_rate_hz: f32,
    /// How long synchronization stays active after a state-changing event
    pub grace_period: Duration,
    /// Allow another peer to take a held object
    pub allow_theft: bool,
    /// Grabbing or teleporting a frozen object clears the freeze
    pub auto_unfreeze: bool,
    /// Per-channel tolerance for diffing; zero compares exactly
    pub motion_epsilon: f32,
}

impl Default for PickupConfig {
    fn default() -> Self {
        PickupConfig {
            sync_rigidbody: true,
            sync_rate_hz: 1.0,
            grace_period: Duration::from_millis(3500),
            allow_theft: false,
            auto_unfreeze: true,
            motion_epsilon: 0.0,
        }
    }
}

impl PickupConfig {
    pub const MIN_RATE_HZ: f32 = 1.0;
    pub const MAX_RATE_HZ: f32 = 60.0;

    /// Fast-moving throwables that others may snatch
    pub fn responsive() -> Self {
        PickupConfig {
            sync_rate_hz: 20.0,
            grace_period: Duration::from_secs(2),
            allow_theft: true,
            ..Self::default()
        }
    }

    /// Props that rarely move; minimal traffic
    pub fn conservative() -> Self {
        PickupConfig {
            sync_rate_hz: 1.0,
            grace_period: Duration::from_secs(5),
            motion_epsilon: 0.001,
            ..Self::default()
        }
    }

    /// Interval between pushes while active
    pub fn push_interval(&self) -> Duration {
        Duration::from_nanos((1_000_000_000f64 / self.sync_rate_hz as f64).round() as u64)
    }

    pub fn validate(&self) -> TetherResult<()> {
        if !(Self::MIN_RATE_HZ..=Self::MAX_RATE_HZ).contains(&self.sync_rate_hz) {
            return Err(TetherError::InvalidConfig(format!(
                "sync_rate_hz must be within {}..={}, got {}",
                Self::MIN_RATE_HZ,
                Self::MAX_RATE_HZ,
                self.sync_rate_hz
            )));
        }
        if self.grace_period.is_zero() {
            return Err(TetherError::InvalidConfig(
                "grace_period must be non-zero".into(),
            ));
        }
        if !self.motion_epsilon.is_finite() || self.motion_epsilon < 0.0 {
            return Err(TetherError::InvalidConfig(format!(
                "motion_epsilon must be finite and non-negative, got {}",
                self.motion_epsilon
            )));
        }
        Ok(())
    }
}
