use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Control desk input ─────────────────────────────────────────────────────

/// What kind of physical control produced an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    /// Momentary push button: value is 1.0 pressed, 0.0 released
    Button,
    /// Potentiometer knob: value is normalized 0.0–1.0
    Knob,
}

/// One reading from the control desk (microcontroller or simulator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    pub kind: ControlKind,
    /// Which button/knob, zero-based
    pub index: u8,
    /// Normalized 0.0–1.0
    pub value: f64,
}

impl ControlInput {
    pub fn knob(index: u8, value: f64) -> Self {
        Self {
            kind: ControlKind::Knob,
            index,
            value: value.clamp(0.0, 1.0),
        }
    }

    pub fn button(index: u8, pressed: bool) -> Self {
        Self {
            kind: ControlKind::Button,
            index,
            value: if pressed { 1.0 } else { 0.0 },
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.value > 0.5
    }
}

impl fmt::Display for ControlInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ControlKind::Button => "button",
            ControlKind::Knob => "knob",
        };
        write!(f, "{}[{}]={:.3}", kind, self.index, self.value)
    }
}

// ─── Outbound messages ──────────────────────────────────────────────────────

/// A single float sent to an OSC address on the media server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub address: String,
    pub value: f64,
}

impl ControlMessage {
    pub fn new(address: impl Into<String>, value: f64) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.3}", self.address, self.value)
    }
}

/// Color for one of the two flood lights driven by the microcontroller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbPacket {
    /// 0 or 1, there are two flood lights
    pub light_index: u8,
    pub rgb: [u8; 3],
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// Number of flood lights wired to the microcontroller.
pub const FLOOD_LIGHT_COUNT: usize = 2;

/// Knob index on the control desk → simulation parameter name.
pub const KNOB_PARAMS: [&str; 3] = ["climate_change", "human_activity", "fate"];

/// Button index on the control desk → scripted event name.
pub const BUTTON_EVENTS: [&str; 5] = ["climate_change", "deforestation", "rain", "storm", "reset"];
