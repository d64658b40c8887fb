//! Composite transitions built from the event primitives.
//!
//! Every builder reads start values from the [`ControlCache`] once, at
//! construction, and returns a finished tree. Later steps of a tree that
//! depend on an earlier step start from the value that step leaves behind.

use crate::catalogue::{CueDef, CueRef, Layer, LayerControl, MediaCatalogue};
use crate::control_cache::ControlCache;
use crate::event::Event;
use log::warn;

/// Blackout hold before a one-shot cue is shown (seconds).
const ONE_SHOT_BLACKOUT: f64 = 1.0;
/// Fade-out at the end of a one-shot cue (seconds).
const ONE_SHOT_FADE_OUT: f64 = 1.0;
/// Time to hide a layer behind its mask before a cross-fade (seconds).
const MASK_HIDE: f64 = 3.0;

/// Builds layer transitions against the current cache state.
pub struct TransitionBuilder<'a> {
    catalogue: &'a MediaCatalogue,
    cache: &'a ControlCache,
    /// Hold between triggering a cue and fading it in
    settle: f64,
}

impl<'a> TransitionBuilder<'a> {
    pub fn new(catalogue: &'a MediaCatalogue, cache: &'a ControlCache, settle: f64) -> Self {
        Self {
            catalogue,
            cache,
            settle: settle.max(0.0),
        }
    }

    /// Fade `address` from its last sent value to `end`.
    pub fn control_fade(&self, address: &str, end: f64, duration: f64) -> Event {
        Event::transition(address, self.cache.get(address), end, duration)
    }

    fn lookup(&self, cue: &CueRef) -> Option<&'a CueDef> {
        let def = self.catalogue.cue(cue);
        if def.is_none() {
            warn!("Cue {} is not in the catalogue", cue);
        }
        def
    }

    /// Blackout, show the layer, play the clip once, fade out.
    pub fn play_one_shot(&self, layer: Layer, cue: &CueDef) -> Event {
        let opacity = self.catalogue.control(layer, LayerControl::Opacity);
        Event::sequence(vec![
            Event::trigger(self.catalogue.blackout(layer)),
            Event::sleep(ONE_SHOT_BLACKOUT),
            Event::transition(opacity, 0.0, 1.0, 0.0),
            Event::trigger(cue.address.as_str()),
            Event::sleep(cue.clip_length()),
            Event::transition(opacity, 1.0, 0.0, ONE_SHOT_FADE_OUT),
        ])
    }

    /// Change the cue on the layer that is already live: fade out (or
    /// mask), trigger, settle, fade back in. With `fade == 0` the cue cuts.
    pub fn layer_transition(&self, cue: &CueRef, fade: f64, use_mask: bool) -> Option<Event> {
        let def = self.lookup(cue)?;
        let opacity_addr = self.catalogue.control(cue.layer, LayerControl::Opacity);
        let mask_addr = self.catalogue.control(cue.layer, LayerControl::MaskOpacity);
        let opacity = self.cache.get(opacity_addr);
        let mask = self.cache.get(mask_addr);

        let mut steps = Vec::new();
        if fade > 0.0 && opacity > 0.0 {
            if use_mask {
                if mask < 1.0 {
                    steps.push(Event::transition(mask_addr, mask, 1.0, fade));
                }
            } else {
                steps.push(Event::transition(opacity_addr, opacity, 0.0, fade));
            }
        }

        if def.one_shot {
            steps.push(self.play_one_shot(cue.layer, def));
        } else {
            steps.push(Event::trigger(def.address.as_str()));
            steps.push(Event::sleep(self.settle));
            if fade > 0.0 {
                if use_mask {
                    steps.push(Event::transition(mask_addr, 1.0, 0.5, fade));
                } else {
                    steps.push(Event::transition(opacity_addr, 0.0, 1.0, fade));
                }
            } else if opacity < 1.0 {
                steps.push(Event::transition(opacity_addr, opacity, 1.0, 0.0));
            }
        }
        Some(Event::sequence(steps))
    }

    /// Cross-fade from `prev` to the other physical layer playing `next`.
    ///
    /// The incoming cue is triggered and settled before any fade starts;
    /// then the outgoing layer drops to half while the incoming rises to
    /// full. Backgrounds blend through the mask; `fade_to_black` finishes by
    /// taking the outgoing layer to 0.
    pub fn layer_switch(
        &self,
        prev: Layer,
        next: &CueRef,
        fade: f64,
        use_mask: bool,
        fade_to_black: bool,
    ) -> Option<Event> {
        let def = self.lookup(next)?;
        let c = self.catalogue;
        let prev_opacity_addr = c.control(prev, LayerControl::Opacity);
        let prev_mask_addr = c.control(prev, LayerControl::MaskOpacity);
        let next_opacity_addr = c.control(next.layer, LayerControl::Opacity);
        let next_mask_addr = c.control(next.layer, LayerControl::MaskOpacity);
        let prev_opacity = self.cache.get(prev_opacity_addr);
        let prev_mask = self.cache.get(prev_mask_addr);
        let next_opacity = self.cache.get(next_opacity_addr);
        let next_mask = self.cache.get(next_mask_addr);

        let mut steps = Vec::new();
        let mut swap = Vec::new();
        if prev_opacity > 0.5 {
            swap.push(Event::transition(prev_opacity_addr, prev_opacity, 0.5, fade));
        }

        if !def.one_shot {
            steps.push(Event::trigger(def.address.as_str()));
            steps.push(Event::sleep(self.settle));

            if use_mask && next_mask < 1.0 {
                let hide = if next_opacity > 0.0 { MASK_HIDE } else { 0.0 };
                steps.push(Event::transition(next_mask_addr, next_mask, 1.0, hide));
            }
            let mut next_start = next_opacity;
            if fade_to_black && next_opacity < 0.5 {
                steps.push(Event::transition(next_opacity_addr, next_opacity, 0.5, fade));
                next_start = 0.5;
            }

            swap.push(Event::transition(next_opacity_addr, next_start, 1.0, fade));
            if use_mask {
                if prev_mask < 1.0 {
                    swap.push(Event::transition(prev_mask_addr, prev_mask, 1.0, fade));
                }
                swap.push(Event::transition(next_mask_addr, 1.0, 0.5, fade));
            }
        }

        steps.push(Event::stack(swap));
        if fade_to_black && prev_opacity > 0.0 {
            steps.push(Event::transition(
                prev_opacity_addr,
                prev_opacity.min(0.5),
                0.0,
                fade,
            ));
        }
        if def.one_shot {
            steps.push(self.play_one_shot(next.layer, def));
        }
        Some(Event::sequence(steps))
    }

    /// Fade the layer out and black it out.
    pub fn blackout(&self, layer: Layer, fade: f64) -> Event {
        let opacity_addr = self.catalogue.control(layer, LayerControl::Opacity);
        let opacity = self.cache.get(opacity_addr);
        let fade = if opacity > 0.0 { fade } else { 0.0 };
        Event::sequence(vec![
            Event::transition(opacity_addr, opacity, 0.0, fade),
            Event::trigger(self.catalogue.blackout(layer)),
        ])
    }
}

/// `n_flicks` dips from `high` to `low` and back, each taking `period`.
pub fn flicker(address: &str, n_flicks: usize, period: f64, high: f64, low: f64) -> Event {
    let half = period / 2.0;
    let steps = (0..n_flicks)
        .flat_map(|_| {
            [
                Event::transition(address, high, low, half),
                Event::transition(address, low, high, half),
            ]
        })
        .collect();
    Event::sequence(steps)
}

/// Start-up state: every layer blacked out with its controls at 0, lights
/// fading up to `max_brightness`.
pub fn init_event(catalogue: &MediaCatalogue, max_brightness: f64, fade: f64) -> Event {
    let mut parts: Vec<Event> = Layer::ALL
        .iter()
        .map(|&layer| {
            let mut reset = vec![Event::trigger(catalogue.blackout(layer))];
            reset.extend(
                LayerControl::ALL
                    .iter()
                    .map(|&ctl| Event::transition(catalogue.control(layer, ctl), 0.0, 0.0, 0.0)),
            );
            Event::stack(reset)
        })
        .collect();
    parts.extend(
        catalogue
            .lights()
            .controls
            .brightness()
            .map(|addr| Event::transition(addr, 0.0, max_brightness, fade)),
    );
    Event::stack(parts)
}
