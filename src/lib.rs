pub mod app;
pub mod catalogue;
pub mod config;
pub mod control;
pub mod control_cache;
pub mod error;
pub mod event;
pub mod flicker_controller;
pub mod flood_lights;
pub mod knob_simulator;
pub mod layer_controller;
pub mod lights_controller;
pub mod osc_sender;
pub mod parameter;
pub mod scenes;
pub mod simulation;
pub mod sink;
pub mod transitions;
pub mod types;

#[cfg(feature = "hardware")]
pub mod serial_link;
