//! Configuration parsing and validation for simulation engines

use std::fs;
use std::path::Path;
use std::time::Duration;

use kernel::KineticsParams;
use serde::{Deserialize, Serialize};

use crate::clock::OverloadPolicy;
use crate::error::{Error, Result};

/// Highest accepted tick rate; shorter ticks are below timer resolution.
const MAX_TICK_RATE_HZ: f64 = 10_000.0;

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    pub name: String,
    /// Particle kinetics model parameters
    pub model: KineticsParams,
    /// Engine scheduling parameters
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Engine scheduling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target model updates per wall-clock second
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,
    /// Maximum updates per outer iteration; `null` disables the cap
    #[serde(default = "default_max_catch_up")]
    pub max_catch_up: Option<u32>,
    /// What happens to backlog beyond the cap
    #[serde(default)]
    pub overload_policy: OverloadPolicy,
    /// Capacity of the model command queue
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
}

// Default values
fn default_tick_rate() -> f64 {
    120.0
}

fn default_max_catch_up() -> Option<u32> {
    Some(8)
}

fn default_command_capacity() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate(),
            max_catch_up: default_max_catch_up(),
            overload_policy: OverloadPolicy::default(),
            command_capacity: default_command_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if !self.tick_rate_hz.is_finite()
            || self.tick_rate_hz <= 0.0
            || self.tick_rate_hz > MAX_TICK_RATE_HZ
        {
            return Err(Error::InvalidConfig(format!(
                "tick_rate_hz must be in (0, {MAX_TICK_RATE_HZ}]"
            )));
        }
        if self.max_catch_up == Some(0) {
            return Err(Error::InvalidConfig(
                "max_catch_up must be at least 1 (use null for no cap)".to_string(),
            ));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig(
                "command_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Wall-clock length of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: SimulationConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("name must not be empty".to_string()));
        }
        self.model
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.engine.validate()
    }
}
