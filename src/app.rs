//! One fixed-tick update of the whole installation.

use crate::catalogue::{Installation, LayerGroup};
use crate::config::AppConfig;
use crate::control::ControlInputSource;
use crate::control_cache::ControlCache;
use crate::event::EventManager;
use crate::flicker_controller::LightFlickerController;
use crate::flood_lights::FloodLightsController;
use crate::layer_controller::LayerController;
use crate::lights_controller::LightsController;
use crate::scenes::Scene;
use crate::simulation::{SimSnapshot, Simulation};
use crate::sink::{FloodLightSink, MessageSink};
use crate::transitions::init_event;
use crate::types::{ControlInput, ControlKind, BUTTON_EVENTS, KNOB_PARAMS};
use log::{debug, info};

/// Upper bound on control inputs handled in one tick.
const MAX_INPUTS_PER_TICK: usize = 256;

pub struct App {
    installation: Installation,
    simulation: Simulation,
    events: EventManager,
    input: Box<dyn ControlInputSource>,
    flood_sink: Box<dyn FloodLightSink>,
    bg: LayerController,
    fg: LayerController,
    lights: LightsController,
    flicker: LightFlickerController,
    flood: FloodLightsController,
    /// Scene seen on the previous tick, `None` before the first
    scene: Option<Scene>,
    snapshot: SimSnapshot,
    frames: u64,
}

impl App {
    /// Build the app and queue the start-up reset. `seed` makes every
    /// random choice reproducible; without one a seed is drawn and logged.
    pub fn new(
        config: &AppConfig,
        installation: Installation,
        sink: Box<dyn MessageSink>,
        flood_sink: Box<dyn FloodLightSink>,
        input: Box<dyn ControlInputSource>,
        seed: Option<u64>,
    ) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        info!("Random seed {}", seed);

        let simulation = Simulation::with_seed(
            config.simulation.clone(),
            installation.scenes.clone(),
            seed,
        );
        let catalogue = &installation.catalogue;
        let mut events = EventManager::new(sink);
        events.add(init_event(
            catalogue,
            config.lights.max_brightness,
            config.lights.startup_fade,
        ));

        let bg = LayerController::new(
            LayerGroup::Background,
            &config.layers,
            catalogue,
            seed.wrapping_add(1),
        );
        let fg = LayerController::new(
            LayerGroup::Foreground,
            &config.layers,
            catalogue,
            seed.wrapping_add(2),
        );
        let lights = LightsController::new(&config.lights, seed.wrapping_add(3));
        let flicker = LightFlickerController::new(&config.flicker, config.lights.max_brightness);
        let flood = FloodLightsController::new(config.flood_lights.fade);
        let snapshot = simulation.snapshot();

        Self {
            installation,
            simulation,
            events,
            input,
            flood_sink,
            bg,
            fg,
            lights,
            flicker,
            flood,
            scene: None,
            snapshot,
            frames: 0,
        }
    }

    pub fn update(&mut self, dt: f64) -> &SimSnapshot {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.poll_input();

        // reads parameter changes before the tick commits them
        self.flicker.update(
            dt,
            &self.simulation,
            &self.installation.catalogue.lights().controls,
            &mut self.events,
        );

        let snapshot = self.simulation.tick(dt);
        let scene_changed = self.scene != Some(snapshot.scene);
        if scene_changed {
            info!(
                "SCENE CHANGED: {} (health {:.3}, intensity {:.3})",
                snapshot.scene, snapshot.forest_health, snapshot.scene_intensity
            );
            self.scene = Some(snapshot.scene);
        }

        self.bg.update(
            dt,
            &snapshot,
            scene_changed,
            &self.installation,
            &mut self.events,
        );
        self.fg.update(
            dt,
            &snapshot,
            scene_changed,
            &self.installation,
            &mut self.events,
        );
        self.lights.update(
            dt,
            &snapshot,
            scene_changed,
            &self.installation.catalogue,
            &mut self.events,
        );
        self.flood.update(
            dt,
            snapshot.scene,
            scene_changed,
            &self.installation.scenes,
            self.flood_sink.as_mut(),
        );

        // last, so events queued this tick start this tick
        self.events.advance(dt);

        self.frames += 1;
        if self.frames.is_multiple_of(3600) {
            debug!(
                "{} frames, {} running events, health {:.3}",
                self.frames,
                self.events.len(),
                snapshot.forest_health
            );
        }
        self.snapshot = snapshot;
        &self.snapshot
    }

    fn poll_input(&mut self) {
        for _ in 0..MAX_INPUTS_PER_TICK {
            let Some(input) = self.input.poll() else {
                return;
            };
            self.handle_input(input);
        }
        debug!("Input limit reached, rest deferred to next tick");
    }

    fn handle_input(&self, input: ControlInput) {
        let index = input.index as usize;
        match input.kind {
            ControlKind::Knob => match KNOB_PARAMS.get(index) {
                Some(param) => self.simulation.set_param(param, input.value),
                None => debug!("Unmapped knob {}", input),
            },
            ControlKind::Button => {
                if !input.is_pressed() {
                    return;
                }
                match BUTTON_EVENTS.get(index) {
                    Some(event) => {
                        info!("Button {} → {}", index, event);
                        self.simulation.trigger_event(event);
                    }
                    None => debug!("Unmapped button {}", input),
                }
            }
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Snapshot from the most recent tick.
    pub fn snapshot(&self) -> &SimSnapshot {
        &self.snapshot
    }

    pub fn scene(&self) -> Option<Scene> {
        self.scene
    }

    pub fn cache(&self) -> &ControlCache {
        self.events.cache()
    }

    pub fn layer_controller(&self, group: LayerGroup) -> &LayerController {
        match group {
            LayerGroup::Background => &self.bg,
            LayerGroup::Foreground => &self.fg,
        }
    }

    pub fn lights(&self) -> &LightsController {
        &self.lights
    }

    pub fn flood_lights(&self) -> &FloodLightsController {
        &self.flood
    }

    pub fn installation(&self) -> &Installation {
        &self.installation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Layer, LayerControl};
    use crate::config::SimulationConfig;
    use crate::simulation::ParamName;
    use crate::sink::test_helpers::{RecordingFloodSink, RecordingSink};
    use std::collections::VecDeque;

    const DT: f64 = 1.0 / 60.0;

    /// Replays queued inputs; `push` works after the app owns the source.
    #[derive(Clone, Default)]
    struct ScriptedInput {
        queue: std::rc::Rc<std::cell::RefCell<VecDeque<ControlInput>>>,
    }

    impl ScriptedInput {
        fn push(&self, input: ControlInput) {
            self.queue.borrow_mut().push_back(input);
        }
    }

    impl ControlInputSource for ScriptedInput {
        fn poll(&mut self) -> Option<ControlInput> {
            self.queue.borrow_mut().pop_front()
        }
    }

    fn quiet_config() -> AppConfig {
        AppConfig {
            simulation: SimulationConfig {
                fate_event_chance: 0.0,
                chance_rules: Vec::new(),
                velocity_rules: Vec::new(),
                ..SimulationConfig::default()
            },
            ..AppConfig::default()
        }
    }

    fn app(config: &AppConfig) -> (App, RecordingSink, RecordingFloodSink, ScriptedInput) {
        let sink = RecordingSink::new();
        let flood = RecordingFloodSink::default();
        let input = ScriptedInput::default();
        let app = App::new(
            config,
            Installation::builtin().unwrap(),
            Box::new(sink.clone()),
            Box::new(flood.clone()),
            Box::new(input.clone()),
            Some(42),
        );
        (app, sink, flood, input)
    }

    #[test]
    fn test_first_tick_resets_and_picks_cues() {
        let (mut app, sink, flood, _) = app(&quiet_config());
        let snap = *app.update(DT);
        assert_eq!(snap.scene, Scene::HealthyForest);
        assert_eq!(app.scene(), Some(Scene::HealthyForest));

        let cat = &app.installation().catalogue;
        for layer in Layer::ALL {
            assert!(!sink.values(cat.blackout(layer)).is_empty());
            let opacity = cat.control(layer, LayerControl::Opacity);
            assert_eq!(sink.values(opacity).first(), Some(&0.0));
        }
        assert!(app.layer_controller(LayerGroup::Background).current_cue().is_some());
        assert!(app.layer_controller(LayerGroup::Foreground).current_cue().is_some());
        assert!(app.lights().content_index().is_some());
        assert!(!flood.packets().is_empty());
    }

    #[test]
    fn test_knobs_map_to_params() {
        let (mut app, _, _, input) = app(&quiet_config());
        input.push(ControlInput::knob(0, 1.0));
        input.push(ControlInput::knob(2, 0.0));
        input.push(ControlInput::knob(7, 1.0));
        app.update(DT);
        assert_eq!(app.simulation().param_value(ParamName::ClimateChange), 1.0);
        assert_eq!(app.simulation().param_value(ParamName::Fate), 0.0);
        assert_eq!(app.simulation().param_value(ParamName::HumanActivity), 0.0);
    }

    #[test]
    fn test_button_triggers_event_scene() {
        let (mut app, _, _, input) = app(&quiet_config());
        app.update(DT);
        input.push(ControlInput::button(3, false));
        app.update(DT);
        assert_eq!(app.scene(), Some(Scene::HealthyForest));

        input.push(ControlInput::button(3, true));
        let snap = *app.update(DT);
        assert_eq!(snap.scene, Scene::Storm);
        assert!(snap.event_active);
    }

    #[test]
    fn test_reset_button_restores_health() {
        let (mut app, _, _, input) = app(&quiet_config());
        input.push(ControlInput::knob(0, 1.0));
        input.push(ControlInput::knob(1, 1.0));
        for _ in 0..600 {
            app.update(DT);
        }
        assert!(app.snapshot().forest_health < 1.0);

        input.push(ControlInput::knob(0, 0.5));
        input.push(ControlInput::knob(1, 0.5));
        input.push(ControlInput::button(4, true));
        app.update(DT);
        assert!(app.snapshot().current_time < 0.1);
    }

    #[test]
    fn test_flicker_stops_once_knob_is_still() {
        let (mut app, sink, _, input) = app(&quiet_config());
        input.push(ControlInput::knob(0, 0.37));
        for _ in 0..(30 * 60) {
            app.update(DT);
        }
        let tubes = app.installation().catalogue.lights().controls.tubes.clone();
        // the knob move flickered the side tubes
        assert!(!sink.values(&tubes[0]).is_empty());

        sink.clear();
        for _ in 0..(60 * 60) {
            app.update(DT);
        }
        assert!(!app.simulation().param_changed(ParamName::ClimateChange));
        for tube in &tubes {
            assert!(sink.values(tube).is_empty(), "{} flickered with the knob still", tube);
        }
    }

    #[test]
    fn test_negative_dt_is_ignored() {
        let (mut app, _, _, _) = app(&quiet_config());
        app.update(DT);
        let before = app.snapshot().current_time;
        app.update(-1.0);
        assert_eq!(app.snapshot().current_time, before);
        assert_eq!(app.frames(), 2);
    }
}
