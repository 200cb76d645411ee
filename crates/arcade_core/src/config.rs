//! Engine configuration.
//!
//! Loaded from RON by tooling, or built in code with [`EngineConfig::default`].
//!
//! # Example RON
//!
//! ```ron
//! EngineConfig(
//!     tick_rate: 60,
//!     event_delay: 1,
//!     step_unit: 4294967296, // 1.0 as raw I32F32 bits
//!     bounds: Some(Rect(x: 0, y: 0, width: 3435973836800, height: 3435973836800)),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::math::{fixed_serde, Fixed, Rect};

/// Default simulation rate in ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Default playable width and height.
pub const DEFAULT_WORLD_SIZE: i32 = 800;

/// Tunables shared by every component of one simulation instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Live ticks per second, used to pace [`advance`](crate::instance::GameInstance::advance).
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Ticks between an event's creation and its scheduled timestamp.
    #[serde(default = "default_event_delay")]
    pub event_delay: u64,
    /// Discrete advance used while resolving blocked motion.
    #[serde(default = "default_step_unit", with = "fixed_serde")]
    pub step_unit: Fixed,
    /// Playable area. Leaving it counts as hitting an obstacle.
    #[serde(default = "default_bounds")]
    pub bounds: Option<Rect>,
}

const fn default_tick_rate() -> u32 {
    DEFAULT_TICK_RATE
}

const fn default_event_delay() -> u64 {
    1
}

fn default_step_unit() -> Fixed {
    Fixed::from_num(1)
}

fn default_bounds() -> Option<Rect> {
    Some(Rect::from_ints(0, 0, DEFAULT_WORLD_SIZE, DEFAULT_WORLD_SIZE))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            event_delay: default_event_delay(),
            step_unit: default_step_unit(),
            bounds: default_bounds(),
        }
    }
}

impl EngineConfig {
    /// Unbounded world, otherwise default settings.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            bounds: None,
            ..Self::default()
        }
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(EngineError::InvalidConfig(
                "tick_rate must be at least 1".to_string(),
            ));
        }
        if self.event_delay == 0 {
            return Err(EngineError::InvalidConfig(
                "event_delay must be at least 1 so events never fire on their creation tick"
                    .to_string(),
            ));
        }
        if self.step_unit <= Fixed::ZERO {
            return Err(EngineError::InvalidConfig(
                "step_unit must be positive".to_string(),
            ));
        }
        if let Some(bounds) = &self.bounds {
            if bounds.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "bounds must have positive area".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate a config from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(ron).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Io(format!("Failed to read config: {}", e)))?;
        Self::from_ron_str(&contents)
    }
}
