//! Adaptive sync scheduler
//!
//! Two countdowns: `period` is how much longer synchronization stays
//! active, `delay` is the time until the next push. A resting object
//! with an expired period produces no pushes at all.

use std::time::Duration;

use tether_core::PickupConfig;

/// Per-object push scheduler
#[derive(Clone, Debug)]
pub struct SyncScheduler {
    period: Duration,
    delay: Duration,
    interval: Duration,
    grace: Duration,
}

impl SyncScheduler {
    pub fn new(config: &PickupConfig) -> Self {
        SyncScheduler {
            period: Duration::ZERO,
            delay: Duration::ZERO,
            interval: config.push_interval(),
            grace: config.grace_period,
        }
    }

    /// Keep synchronization active for another grace period
    pub fn arm(&mut self) {
        self.period = self.grace;
    }

    /// Arm and push on the very next tick (grab, drop, teleport)
    pub fn arm_immediate(&mut self) {
        self.period = self.grace;
        self.delay = Duration::ZERO;
    }

    /// Stop synchronizing until re-armed
    pub fn idle(&mut self) {
        self.period = Duration::ZERO;
    }

    pub fn is_active(&self) -> bool {
        !self.period.is_zero()
    }

    /// Remaining active time
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time until the next push
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Advance by one physics step. Returns true if a push is due now.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if self.period.is_zero() {
            return false;
        }
        self.period = self.period.saturating_sub(dt);

        if self.delay > dt {
            self.delay -= dt;
            return false;
        }
        self.delay = self.interval;
        true
    }
}
