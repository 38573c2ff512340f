use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use wheelie_kernel::{VehicleConfigError, VehicleParams};
use wheelie_stream::{StreamConfig, StreamConfigError};

use crate::score::ScoreParams;

/// Everything needed to build a session, loadable from YAML.
///
/// Missing fields take their defaults:
/// ```yaml
/// seed: 7
/// fixed_dt: 0.02
/// vehicle:
///   max_speed: 25.0
/// stream:
///   obstacle_spawn_chance: 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seed for the course layout. Every reset replays the same course.
    pub seed: u64,
    /// Physics step in seconds.
    pub fixed_dt: f32,
    /// Where the bike sits at the start of every run.
    pub start_position: [f32; 3],
    pub vehicle: VehicleParams,
    pub stream: StreamConfig,
    pub scoring: ScoreParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            fixed_dt: 0.02,
            start_position: [0.0, 0.5, 0.0],
            vehicle: VehicleParams::default(),
            stream: StreamConfig::default(),
            scoring: ScoreParams::default(),
        }
    }
}

/// Errors from loading or validating session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("vehicle: {0}")]
    Vehicle(#[from] VehicleConfigError),
    #[error("stream: {0}")]
    Stream(#[from] StreamConfigError),
    #[error("fixed_dt must be positive and finite, got {0}")]
    FixedDt(f32),
    #[error("start_position must be finite, got {0:?}")]
    StartPosition([f32; 3]),
    #[error("scoring: {name} must be non-negative and finite, got {value}")]
    Scoring { name: &'static str, value: f32 },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn start_position(&self) -> Vec3 {
        Vec3::from_array(self.start_position)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_fixed_dt(self.fixed_dt)?;
        if !self.start_position.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::StartPosition(self.start_position));
        }
        self.vehicle.validate()?;
        self.stream.validate()?;
        validate_scoring(&self.scoring)
    }
}

pub(crate) fn validate_fixed_dt(fixed_dt: f32) -> Result<(), ConfigError> {
    if fixed_dt.is_finite() && fixed_dt > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::FixedDt(fixed_dt))
    }
}

pub(crate) fn validate_scoring(scoring: &ScoreParams) -> Result<(), ConfigError> {
    for (name, value) in [
        ("speed_to_score_factor", scoring.speed_to_score_factor),
        ("wheelie_bonus_rate", scoring.wheelie_bonus_rate),
        ("wheelie_active_threshold", scoring.wheelie_active_threshold),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ConfigError::Scoring { name, value });
        }
    }
    Ok(())
}
