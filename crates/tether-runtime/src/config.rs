//! Runtime configuration
//!
//! Loaded from JSON. Durations are human-readable strings such as
//! `"3s 500ms"` or `"20ms"`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{PeerId, PickupConfig, TetherError, TetherResult};

use crate::LogFormat;

/// File form of [`PickupConfig`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PickupSection {
    pub sync_rigidbody: bool,
    pub sync_rate_hz: f32,
    #[serde(with = "duration_str")]
    pub grace_period: Duration,
    pub allow_theft: bool,
    pub auto_unfreeze: bool,
    pub motion_epsilon: f32,
}

impl Default for PickupSection {
    fn default() -> Self {
        PickupSection::from(&PickupConfig::default())
    }
}

impl From<&PickupConfig> for PickupSection {
    fn from(c: &PickupConfig) -> Self {
        PickupSection {
            sync_rigidbody: c.sync_rigidbody,
            sync_rate_hz: c.sync_rate_hz,
            grace_period: c.grace_period,
            allow_theft: c.allow_theft,
            auto_unfreeze: c.auto_unfreeze,
            motion_epsilon: c.motion_epsilon,
        }
    }
}

impl From<&PickupSection> for PickupConfig {
    fn from(s: &PickupSection) -> Self {
        PickupConfig {
            sync_rigidbody: s.sync_rigidbody,
            sync_rate_hz: s.sync_rate_hz,
            grace_period: s.grace_period,
            allow_theft: s.allow_theft,
            auto_unfreeze: s.auto_unfreeze,
            motion_epsilon: s.motion_epsilon,
        }
    }
}

/// Peer runtime configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Local peer id
    pub local_peer: u32,
    pub log_format: LogFormat,
    /// Encoded frames buffered for the transport before new ones are dropped
    pub max_outbound_frames: usize,
    /// Fixed physics step
    #[serde(with = "duration_str")]
    pub physics_step: Duration,
    pub pickup: PickupSection,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            local_peer: 1,
            log_format: LogFormat::default(),
            max_outbound_frames: 1024,
            physics_step: Duration::from_millis(20),
            pickup: PickupSection::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> TetherResult<Self> {
        let config: RuntimeConfig = serde_json::from_str(text)
            .map_err(|e| TetherError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> TetherResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TetherError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> TetherResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TetherError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> TetherResult<()> {
        if self.max_outbound_frames == 0 {
            return Err(TetherError::InvalidConfig(
                "max_outbound_frames must be non-zero".into(),
            ));
        }
        if self.physics_step.is_zero() {
            return Err(TetherError::InvalidConfig(
                "physics_step must be non-zero".into(),
            ));
        }
        self.pickup_config().validate()
    }

    pub fn local_peer(&self) -> PeerId {
        PeerId::new(self.local_peer)
    }

    pub fn pickup_config(&self) -> PickupConfig {
        PickupConfig::from(&self.pickup)
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}
