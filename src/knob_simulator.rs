use crate::control::ControlInputSource;
use crate::types::{ControlInput, KNOB_PARAMS};
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chance per frame that a visitor nudges a knob.
pub const DEFAULT_DRIFT_CHANCE: f64 = 0.02;
/// Largest single nudge, normalized.
pub const MAX_DRIFT: f64 = 0.05;

/// Stands in for the control desk: every frame there is a small chance a
/// random knob drifts by up to ±[`MAX_DRIFT`].
///
/// The app drains its input source until `poll` returns `None`, so after
/// each emitted reading the next poll reports nothing. That caps the
/// simulator at one reading per frame.
pub struct KnobSimulator {
    rng: StdRng,
    knobs: [f64; KNOB_PARAMS.len()],
    chance: f64,
    emitted: bool,
}

impl KnobSimulator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            knobs: [0.5; KNOB_PARAMS.len()],
            chance: DEFAULT_DRIFT_CHANCE,
            emitted: false,
        }
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Starting knob positions, normalized.
    pub fn with_knobs(mut self, knobs: [f64; KNOB_PARAMS.len()]) -> Self {
        self.knobs = knobs.map(|k| k.clamp(0.0, 1.0));
        self
    }

    pub fn knobs(&self) -> [f64; KNOB_PARAMS.len()] {
        self.knobs
    }
}

impl ControlInputSource for KnobSimulator {
    fn poll(&mut self) -> Option<ControlInput> {
        if self.emitted {
            self.emitted = false;
            return None;
        }
        if !self.rng.gen_bool(self.chance) {
            return None;
        }
        let index = self.rng.gen_range(0..self.knobs.len());
        let step = self.rng.gen_range(-MAX_DRIFT..=MAX_DRIFT);
        let value = (self.knobs[index] + step).clamp(0.0, 1.0);
        self.knobs[index] = value;
        self.emitted = true;
        trace!("Simulated {} knob → {:.3}", KNOB_PARAMS[index], value);
        Some(ControlInput::knob(index as u8, value))
    }
}
