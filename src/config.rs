//! Tunables for the simulation and controllers, loadable from JSON.
//!
//! Every section uses `#[serde(default)]`, so a config file only needs the
//! values it overrides.

use crate::error::{ConfigError, Result};
use crate::scenes::Scene;
use crate::simulation::ParamName;
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded {:?}", path);
    Ok(value)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fixed update rate of the brain loop
    pub tick_hz: u32,
    pub simulation: SimulationConfig,
    pub layers: LayerConfig,
    pub lights: LightsConfig,
    pub flicker: FlickerConfig,
    pub flood_lights: FloodLightsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            simulation: SimulationConfig::default(),
            layers: LayerConfig::default(),
            lights: LightsConfig::default(),
            flicker: FlickerConfig::default(),
            flood_lights: FloodLightsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be positive".into()));
        }
        let s = &self.simulation;
        if !(0.0..=1.0).contains(&s.fate_intensity_weight) {
            return Err(ConfigError::Invalid(
                "simulation.fate_intensity_weight must be within [0, 1]".into(),
            ));
        }
        if !(s.dead_threshold < s.healthy_threshold && s.healthy_threshold <= s.recovery_threshold)
        {
            return Err(ConfigError::Invalid(
                "simulation thresholds must satisfy dead < healthy <= recovery".into(),
            ));
        }
        for rule in &s.velocity_rules {
            if rule.threshold == 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "velocity rule for {} needs a non-zero signed threshold",
                    rule.param
                )));
            }
        }
        Ok(())
    }

    pub fn tick_seconds(&self) -> f64 {
        1.0 / self.tick_hz as f64
    }
}

/// Seed value, history window and health weight of one control parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamConfig {
    /// Initial value in the parameter's working range
    pub initial: f64,
    /// History window in ticks
    pub lookback: usize,
    /// Health impact per second at full deflection
    pub weight: f64,
}

/// Fires `event` when `param` moves fast toward and past `threshold`.
/// The threshold's sign selects the direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityRule {
    pub param: ParamName,
    pub threshold: f64,
    pub event: Scene,
}

/// After the fate roll misses, `event` fires with probability
/// `max(param.mean(), 0) * chance` per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChanceRule {
    pub param: ParamName,
    pub chance: f64,
    pub event: Scene,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_health: f64,
    /// History window of forest health, in ticks
    pub health_lookback: usize,
    pub climate_change: ParamConfig,
    pub human_activity: ParamConfig,
    pub fate: ParamConfig,
    /// Share of scene intensity taken from fate's mean
    pub fate_intensity_weight: f64,
    /// Minimum |velocity| (per tick) for velocity rules to fire
    pub min_velocity: f64,
    pub velocity_rules: Vec<VelocityRule>,
    /// Per-tick chance of a random event at fate = 1
    pub fate_event_chance: f64,
    pub chance_rules: Vec<ChanceRule>,
    /// Base duration of a scripted event (seconds)
    pub event_duration: f64,
    /// Minimum time between automatic scene changes (seconds)
    pub scene_cooldown: f64,
    pub healthy_threshold: f64,
    pub dead_threshold: f64,
    /// After burning or dying, health must reach this to count as healthy again
    pub recovery_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_health: 1.0,
            health_lookback: 60,
            climate_change: ParamConfig {
                initial: 0.0,
                lookback: 60,
                weight: 0.01,
            },
            human_activity: ParamConfig {
                initial: 0.0,
                lookback: 60,
                weight: 0.01,
            },
            fate: ParamConfig {
                initial: 0.5,
                lookback: 1,
                weight: 0.0,
            },
            fate_intensity_weight: 0.3,
            min_velocity: 0.02,
            velocity_rules: vec![
                VelocityRule {
                    param: ParamName::ClimateChange,
                    threshold: 0.5,
                    event: Scene::ClimateChange,
                },
                VelocityRule {
                    param: ParamName::HumanActivity,
                    threshold: 0.75,
                    event: Scene::Deforestation,
                },
                VelocityRule {
                    param: ParamName::HumanActivity,
                    threshold: -0.75,
                    event: Scene::Rain,
                },
            ],
            fate_event_chance: 0.0005,
            chance_rules: vec![
                ChanceRule {
                    param: ParamName::ClimateChange,
                    chance: 0.0001,
                    event: Scene::ClimateChange,
                },
                ChanceRule {
                    param: ParamName::HumanActivity,
                    chance: 0.0001,
                    event: Scene::Deforestation,
                },
            ],
            event_duration: 30.0,
            scene_cooldown: 15.0,
            healthy_threshold: 0.5,
            dead_threshold: 0.2,
            recovery_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Seconds between background cue changes
    pub bg_frequency: f64,
    /// Seconds between foreground cue changes
    pub fg_frequency: f64,
    /// Cross-fade length (seconds)
    pub fade: f64,
    /// Hold after triggering a cue before fading it in (seconds)
    pub cue_settle: f64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            bg_frequency: 20.0,
            fg_frequency: 20.0,
            fade: 6.0,
            cue_settle: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    /// Seconds between color cue changes within a scene
    pub frequency: f64,
    /// Brightness the tubes and lanterns settle at
    pub max_brightness: f64,
    /// Fade-up time of the lights at start-up (seconds)
    pub startup_fade: f64,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            frequency: 20.0,
            max_brightness: 1.0,
            startup_fade: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickerConfig {
    /// Minimum time between the start of two flicker patterns (seconds)
    pub cooldown: f64,
    /// Low value of a flick
    pub low: f64,
}

impl Default for FlickerConfig {
    fn default() -> Self {
        Self {
            cooldown: 2.0,
            low: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodLightsConfig {
    /// Color cross-fade length (seconds)
    pub fade: f64,
}

impl Default for FloodLightsConfig {
    fn default() -> Self {
        Self { fade: 6.0 }
    }
}
