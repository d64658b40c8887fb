//! Forest ecosystem simulation.
//!
//! Forest health decays under climate change and human activity and is
//! nudged by scripted events. Health selects one of the main scenes and a
//! continuous scene intensity; fast knob movement and the `fate` parameter
//! trigger scripted event scenes that temporarily own the scene.
//!
//! All state sits behind one mutex: `tick` holds it for the whole update, and
//! `set_param` / `trigger_event` from the control thread take it too.

use crate::config::SimulationConfig;
use crate::parameter::{remap, Parameter};
use crate::scenes::{Scene, SceneTable, EVENT_SCENES};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Named control parameters of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    ClimateChange,
    HumanActivity,
    Fate,
}

impl ParamName {
    pub const ALL: [ParamName; 3] = [
        ParamName::ClimateChange,
        ParamName::HumanActivity,
        ParamName::Fate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::ClimateChange => "climate_change",
            ParamName::HumanActivity => "human_activity",
            ParamName::Fate => "fate",
        }
    }

    /// Working range the normalized knob value is mapped onto.
    pub fn range(&self) -> (f64, f64) {
        match self {
            ParamName::ClimateChange | ParamName::HumanActivity => (-1.0, 1.0),
            ParamName::Fate => (0.0, 1.0),
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamName::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown parameter {:?}", s))
    }
}

/// Scene state after a tick, read by the controllers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSnapshot {
    pub scene: Scene,
    pub forest_health: f64,
    pub scene_intensity: f64,
    pub current_time: f64,
    pub event_active: bool,
}

#[derive(Debug)]
struct NamedParam {
    parameter: Parameter,
    weight: f64,
}

struct SimState {
    config: SimulationConfig,
    scenes: SceneTable,
    scene: Scene,
    forest_health: Parameter,
    /// Indexed by [`ParamName`]
    params: [NamedParam; 3],
    event_deadline: Option<f64>,
    event_health_delta: f64,
    current_time: f64,
    last_scene_change: f64,
    scene_intensity: f64,
    has_died: bool,
    has_burned: bool,
    rng: StdRng,
}

pub struct Simulation {
    state: Mutex<SimState>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, scenes: SceneTable) -> Self {
        Self::with_rng(config, scenes, StdRng::from_entropy())
    }

    /// Deterministic simulation for tests and reproducible runs.
    pub fn with_seed(config: SimulationConfig, scenes: SceneTable, seed: u64) -> Self {
        Self::with_rng(config, scenes, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulationConfig, scenes: SceneTable, rng: StdRng) -> Self {
        let param = |c: &crate::config::ParamConfig| NamedParam {
            parameter: Parameter::new(c.initial, c.lookback),
            weight: c.weight,
        };
        let params = [
            param(&config.climate_change),
            param(&config.human_activity),
            param(&config.fate),
        ];
        let state = SimState {
            scene: Scene::HealthyForest,
            forest_health: Parameter::new(
                config.initial_health.clamp(0.0, 1.0),
                config.health_lookback,
            ),
            params,
            event_deadline: None,
            event_health_delta: 0.0,
            current_time: 0.0,
            last_scene_change: 0.0,
            scene_intensity: 0.0,
            has_died: false,
            has_burned: false,
            rng,
            config,
            scenes,
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // a panic elsewhere must not stop the installation
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a parameter from a normalized 0–1 control value, remapped onto
    /// the parameter's working range. Unknown names are ignored.
    pub fn set_param(&self, name: &str, normalized: f64) {
        match name.parse::<ParamName>() {
            Ok(param) => {
                let (lo, hi) = param.range();
                let value = remap(normalized, 0.0, 1.0, lo, hi);
                self.set_param_value(param, value);
            }
            Err(e) => warn!("set_param ignored: {}", e),
        }
    }

    /// Set a parameter directly in its working range.
    pub fn set_param_value(&self, param: ParamName, value: f64) {
        let (lo, hi) = param.range();
        let value = value.clamp(lo, hi);
        debug!("{} = {:.3}", param, value);
        self.lock().params[param.index()].parameter.set_current(value);
    }

    /// Force a scripted event scene. `"reset"` restores initial health and
    /// zeroes the simulation clock instead. Unknown names are ignored.
    pub fn trigger_event(&self, name: &str) {
        let mut state = self.lock();
        if name == "reset" {
            state.reset();
            return;
        }
        match name.parse::<Scene>() {
            Ok(scene) => {
                let duration = state.config.event_duration;
                state.handle_event(scene, duration);
            }
            Err(e) => warn!("trigger_event ignored: {}", e),
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn tick(&self, dt: f64) -> SimSnapshot {
        let mut state = self.lock();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        state.current_time += dt;
        if let Some(deadline) = state.event_deadline {
            if state.current_time >= deadline {
                info!("Event {} finished", state.scene);
                state.event_deadline = None;
            }
        }

        state.update_health(dt);
        state.update_intensity();
        state.trigger_velocity_events();
        state.trigger_chance_events();
        state.select_main_scene();
        state.commit_params();

        state.snapshot()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        self.lock().snapshot()
    }

    pub fn param_value(&self, param: ParamName) -> f64 {
        self.lock().param(param).current()
    }

    pub fn param_changed(&self, param: ParamName) -> bool {
        self.lock().param(param).has_changed()
    }

    pub fn param_velocity(&self, param: ParamName) -> f64 {
        self.lock().param(param).velocity()
    }
}

impl SimState {
    fn param(&self, param: ParamName) -> &Parameter {
        &self.params[param.index()].parameter
    }

    fn event_active(&self) -> bool {
        self.event_deadline.is_some()
    }

    fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            scene: self.scene,
            forest_health: self.forest_health.current(),
            scene_intensity: self.scene_intensity,
            current_time: self.current_time,
            event_active: self.event_active(),
        }
    }

    fn set_scene(&mut self, scene: Scene) {
        if scene != self.scene {
            info!(
                "Scene {} → {} (health {:.3})",
                self.scene,
                scene,
                self.forest_health.current()
            );
            self.scene = scene;
            self.last_scene_change = self.current_time;
        }
    }

    fn handle_event(&mut self, event: Scene, duration: f64) {
        let def = self.scenes.def(event);
        let duration = def.clamp_length(duration);
        let effect = def.health_effect;
        info!("Event {} for {:.1}s (health effect {:+.2})", event, duration, effect);
        self.set_scene(event);
        self.event_deadline = Some(self.current_time + duration);
        self.event_health_delta = effect;
    }

    fn reset(&mut self) {
        info!("Simulation reset");
        self.forest_health = Parameter::new(
            self.config.initial_health.clamp(0.0, 1.0),
            self.config.health_lookback,
        );
        self.current_time = 0.0;
        self.last_scene_change = 0.0;
        self.event_deadline = None;
        self.event_health_delta = 0.0;
        self.has_died = false;
        self.has_burned = false;
    }

    fn update_health(&mut self, dt: f64) {
        let mut health = self.forest_health.mean();
        for name in [ParamName::ClimateChange, ParamName::HumanActivity] {
            let p = &self.params[name.index()];
            health -= p.parameter.mean() * p.weight * dt;
        }
        health += self.event_health_delta;
        self.event_health_delta = 0.0;

        let health = if health.is_finite() {
            health.clamp(0.0, 1.0)
        } else {
            self.forest_health.current()
        };
        self.forest_health.push(health);
    }

    fn update_intensity(&mut self) {
        let badness = 1.0 - self.forest_health.current();
        let base = intensity_ramp(
            badness,
            1.0 - self.config.healthy_threshold,
            1.0 - self.config.dead_threshold,
        );
        let w = self.config.fate_intensity_weight;
        let fate = self.param(ParamName::Fate).mean();
        self.scene_intensity = (base * (1.0 - w) + fate * w).clamp(0.0, 1.0);
    }

    fn trigger_velocity_events(&mut self) {
        if self.event_active() {
            return;
        }
        let min_velocity = self.config.min_velocity;
        let fired = self.config.velocity_rules.iter().find_map(|rule| {
            let p = self.param(rule.param);
            let velocity = p.velocity();
            let mean = p.mean();
            let same_direction = velocity.signum() == rule.threshold.signum();
            let crossed = if rule.threshold > 0.0 {
                mean > rule.threshold
            } else {
                mean < rule.threshold
            };
            (same_direction && velocity.abs() > min_velocity && crossed)
                .then_some((rule.event, rule.param, mean))
        });

        if let Some((event, param, mean)) = fired {
            debug!("{} moving fast (mean {:.3})", param, mean);
            // more extreme values hold the event longer
            let duration = self.config.event_duration * (1.0 + mean.abs());
            self.handle_event(event, duration);
        }
    }

    fn trigger_chance_events(&mut self) {
        if self.event_active() {
            return;
        }
        let duration = self.config.event_duration;
        let mut roll: f64 = self.rng.gen();

        let p = self.param(ParamName::Fate).mean().max(0.0) * self.config.fate_event_chance;
        if roll < p {
            if let Some(&event) = EVENT_SCENES.choose(&mut self.rng) {
                self.handle_event(event, duration);
            }
            return;
        }
        roll -= p;

        let mut fired = None;
        for rule in &self.config.chance_rules {
            let p = self.param(rule.param).mean().max(0.0) * rule.chance;
            if roll < p {
                fired = Some(rule.event);
                break;
            }
            roll -= p;
        }
        if let Some(event) = fired {
            self.handle_event(event, duration);
        }
    }

    fn select_main_scene(&mut self) {
        if self.event_active() {
            return;
        }
        if self.current_time - self.last_scene_change < self.config.scene_cooldown {
            return;
        }

        let health = self.forest_health.current();
        let c = &self.config;
        let scene = if health < c.dead_threshold {
            self.has_died = true;
            Scene::DeadForest
        } else if health < c.healthy_threshold {
            if self.has_died {
                Scene::GrowingForest
            } else {
                self.has_burned = true;
                Scene::BurningForest
            }
        } else if (self.has_died || self.has_burned) && health < c.recovery_threshold {
            Scene::GrowingForest
        } else {
            self.has_died = false;
            self.has_burned = false;
            Scene::HealthyForest
        };
        self.set_scene(scene);
    }

    fn commit_params(&mut self) {
        for p in self.params.iter_mut() {
            let current = p.parameter.current();
            p.parameter.push(current);
        }
    }
}

/// Three-segment ramp: intensity climbs 0→1 within each band of badness
/// (healthy, burning, dead) so every main scene spans the full range.
fn intensity_ramp(badness: f64, burning_at: f64, dead_at: f64) -> f64 {
    let v = if badness < burning_at {
        badness / burning_at
    } else if badness < dead_at {
        (badness - burning_at) / (dead_at - burning_at)
    } else {
        (badness - dead_at) / (1.0 - dead_at)
    };
    v.clamp(0.0, 1.0)
}
