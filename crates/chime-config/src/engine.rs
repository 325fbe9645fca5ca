//! Playback engine settings.

use serde::{Deserialize, Serialize};

use chime_core::Track;
use chime_core::track::DEFAULT_TICK_INTERVAL;

use crate::error::ConfigError;
use crate::value::field_seconds;

/// Timing settings shared by everything a configuration builds.
///
/// ```toml
/// [engine]
/// tick_interval = "50ms"
/// lookahead = "100ms"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// How often a track recomputes its position.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,

    /// Delay before the first scheduled event of a simulation.
    #[serde(default = "default_lookahead")]
    pub lookahead: String,
}

fn default_tick_interval() -> String {
    format!("{}ms", DEFAULT_TICK_INTERVAL * 1000.0)
}

fn default_lookahead() -> String {
    "0s".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            lookahead: default_lookahead(),
        }
    }
}

impl EngineConfig {
    /// Tick interval in seconds. Must be positive.
    pub fn tick_interval_seconds(&self) -> Result<f64, ConfigError> {
        let seconds = field_seconds("engine.tick_interval", &self.tick_interval)?;
        if seconds <= 0.0 {
            return Err(ConfigError::invalid_value(
                "engine.tick_interval",
                self.tick_interval.as_str(),
            ));
        }
        Ok(seconds)
    }

    /// Lookahead in seconds, clamped to be non-negative.
    pub fn lookahead_seconds(&self) -> Result<f64, ConfigError> {
        Ok(field_seconds("engine.lookahead", &self.lookahead)?.max(0.0))
    }

    /// Apply the tick interval to a track.
    pub fn configure_track(&self, track: Track) -> Result<Track, ConfigError> {
        Ok(track.with_tick_interval(self.tick_interval_seconds()?))
    }
}
