//! Scene-to-cue orchestration for one layer group (background or
//! foreground), plus the per-layer FX randomizers.

use crate::catalogue::{CueRef, Installation, Layer, LayerControl, LayerGroup, MediaCatalogue};
use crate::config::LayerConfig;
use crate::event::{Event, EventId, EventManager};
use crate::scenes::Scene;
use crate::simulation::SimSnapshot;
use crate::transitions::TransitionBuilder;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Opacity fade before a foreground blackout (seconds).
const BLACKOUT_FADE: f64 = 3.0;
/// Shortest FX fade (seconds).
const FX_FADE_MIN: f64 = 1.0;
/// Extra FX fade time at zero intensity (seconds).
const FX_FADE_RANGE: f64 = 10.0;

fn is_running(running: Option<EventId>, events: &EventManager) -> bool {
    running.map_or(false, |id| events.is_running(id))
}

// ─── FX randomizers ─────────────────────────────────────────────────────────

/// Wanders one layer control between random targets. Higher intensity
/// allows larger values and shorter fades.
#[derive(Debug)]
pub struct ControlRandomizer {
    address: String,
    min: f64,
    max: f64,
    intensity: f64,
    running: Option<EventId>,
}

impl ControlRandomizer {
    pub fn new(address: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            address: address.into(),
            min,
            max,
            intensity: 0.5,
            running: None,
        }
    }

    pub fn set_intensity(&mut self, intensity: f64) {
        self.intensity = intensity.clamp(0.0, 1.0);
    }

    pub fn update(&mut self, events: &mut EventManager, rng: &mut StdRng) {
        if is_running(self.running, events) {
            return;
        }
        let start = events.cache().get(&self.address);
        let range = self.max - self.min;
        let end = (self.min + rng.gen::<f64>() * self.intensity * range).clamp(self.min, self.max);
        let fade = FX_FADE_MIN + rng.gen::<f64>() * FX_FADE_RANGE * (1.0 - self.intensity);
        self.running = Some(events.add(Event::transition(
            self.address.as_str(),
            start,
            end,
            fade,
        )));
    }
}

/// FX amount, feedback and feedback FX randomizers for one physical layer.
#[derive(Debug)]
pub struct LayerFxController {
    randomizers: [ControlRandomizer; 3],
}

impl LayerFxController {
    pub fn new(catalogue: &MediaCatalogue, layer: Layer) -> Self {
        let r = |ctl, max| ControlRandomizer::new(catalogue.control(layer, ctl), 0.0, max);
        Self {
            randomizers: [
                r(LayerControl::FxAmount, 1.0),
                r(LayerControl::FeedbackAmount, 0.33),
                r(LayerControl::FeedbackFxAmount, 1.0),
            ],
        }
    }

    pub fn set_intensity(&mut self, intensity: f64) {
        for r in self.randomizers.iter_mut() {
            r.set_intensity(intensity);
        }
    }

    pub fn update(&mut self, events: &mut EventManager, rng: &mut StdRng) {
        for r in self.randomizers.iter_mut() {
            r.update(events, rng);
        }
    }
}

// ─── Layer controller ───────────────────────────────────────────────────────

pub struct LayerController {
    group: LayerGroup,
    config: LayerConfig,
    /// Scene the cue list was built for
    scene: Option<Scene>,
    scene_cues: Vec<CueRef>,
    current: Option<CueRef>,
    time: f64,
    running: Option<EventId>,
    /// Scene changed while a transition was still running
    pending_force: bool,
    blacked_out: bool,
    fx: [LayerFxController; 2],
    rng: StdRng,
}

impl LayerController {
    pub fn new(
        group: LayerGroup,
        config: &LayerConfig,
        catalogue: &MediaCatalogue,
        seed: u64,
    ) -> Self {
        let [a, b] = group.layers();
        Self {
            group,
            config: config.clone(),
            scene: None,
            scene_cues: Vec::new(),
            current: None,
            time: 0.0,
            running: None,
            pending_force: false,
            blacked_out: false,
            fx: [
                LayerFxController::new(catalogue, a),
                LayerFxController::new(catalogue, b),
            ],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn current_cue(&self) -> Option<&CueRef> {
        self.current.as_ref()
    }

    pub fn is_blacked_out(&self) -> bool {
        self.blacked_out
    }

    /// Candidate cues for the current scene.
    pub fn scene_cues(&self) -> &[CueRef] {
        &self.scene_cues
    }

    fn frequency(&self) -> f64 {
        match self.group {
            LayerGroup::Background => self.config.bg_frequency,
            LayerGroup::Foreground => self.config.fg_frequency,
        }
    }

    pub fn update(
        &mut self,
        dt: f64,
        snapshot: &SimSnapshot,
        scene_changed: bool,
        installation: &Installation,
        events: &mut EventManager,
    ) {
        for fx in self.fx.iter_mut() {
            fx.set_intensity(snapshot.scene_intensity);
            fx.update(events, &mut self.rng);
        }

        self.time += dt;
        if scene_changed {
            self.pending_force = true;
        }

        // in-flight transitions always finish; a forced change waits for them
        let busy = is_running(self.running, events);
        if busy {
            if self.pending_force {
                debug!("{} scene change deferred until transition ends", self.group);
            }
            return;
        }
        let force = self.pending_force;
        if !force && (self.blacked_out || self.time < self.frequency()) {
            return;
        }

        self.time = 0.0;
        self.pending_force = false;
        self.update_layer(snapshot.scene, installation, events);
    }

    fn update_layer(
        &mut self,
        scene: Scene,
        installation: &Installation,
        events: &mut EventManager,
    ) {
        let bg = self.group == LayerGroup::Background;
        let prev = self.current.clone();
        let prev_layer = prev.as_ref().map(|c| c.layer);

        if self.scene != Some(scene) {
            self.scene = Some(scene);
            let bins = self.group.scene_bins(&installation.scenes, scene);
            self.scene_cues = installation.catalogue.cues_for(self.group, bins);
            self.blacked_out = false;
            debug!("{} cues for {}: {}", self.group, scene, self.scene_cues.len());
        }

        if !bg && prev_layer.is_some() {
            if let Some(p) = installation.scenes.def(scene).fg_blackout {
                if self.rng.gen::<f64>() < p {
                    self.black_out(installation, events);
                    return;
                }
            }
        }

        let mut candidates: Vec<&CueRef> = self.scene_cues.iter().collect();
        if bg {
            // alternate physical layers so one can fade while the other is live
            let other: Vec<&CueRef> = candidates
                .iter()
                .copied()
                .filter(|c| Some(c.layer) != prev_layer)
                .collect();
            if !other.is_empty() {
                candidates = other;
            }
        }
        if candidates.len() > 1 {
            if let Some(p) = &prev {
                candidates.retain(|c| *c != p);
            }
        }
        let cue = match candidates.choose(&mut self.rng) {
            Some(&cue) => cue.clone(),
            None => {
                warn!("{}: no cues for scene {}", self.group, scene);
                return;
            }
        };

        let builder = TransitionBuilder::new(
            &installation.catalogue,
            events.cache(),
            self.config.cue_settle,
        );
        let event = match prev_layer {
            Some(prev_layer) if prev_layer != cue.layer => {
                builder.layer_switch(prev_layer, &cue, self.config.fade, bg, !bg)
            }
            _ if prev.as_ref() != Some(&cue) => {
                let fade = if bg && prev_layer.is_some() {
                    0.0
                } else {
                    self.config.fade
                };
                builder.layer_transition(&cue, fade, false)
            }
            _ => None,
        };

        info!("{} → {}", self.group, cue);
        self.current = Some(cue);
        self.blacked_out = false;
        if let Some(event) = event {
            self.running = Some(events.add(event));
        }
    }

    fn black_out(&mut self, installation: &Installation, events: &mut EventManager) {
        info!("{} blackout", self.group);
        let builder = TransitionBuilder::new(
            &installation.catalogue,
            events.cache(),
            self.config.cue_settle,
        );
        let event = Event::stack(
            self.group
                .layers()
                .iter()
                .map(|&layer| builder.blackout(layer, BLACKOUT_FADE))
                .collect(),
        );
        self.running = Some(events.add(event));
        self.current = None;
        self.blacked_out = true;
    }
}
