//! End-to-end integration tests for the Enclave brain.
//!
//! These tests exercise the full data flow:
//!   control desk bytes → PacketDecoder → ChannelInput → App → ChannelSink → OSC
//!
//! Every random choice is seeded, so each run replays the same show.

use crossbeam_channel::{unbounded, Receiver};
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use enclave_brain::app::App;
use enclave_brain::catalogue::{Installation, Layer, LayerControl, LayerGroup};
use enclave_brain::config::{AppConfig, SimulationConfig};
use enclave_brain::control::{ChannelInput, ControlInputSource, NoInput, PacketDecoder};
use enclave_brain::knob_simulator::KnobSimulator;
use enclave_brain::osc_sender::OscSender;
use enclave_brain::scenes::{enclave_scenes, Scene, SceneTableFile};
use enclave_brain::simulation::ParamName;
use enclave_brain::sink::{ChannelFloodSink, ChannelSink};
use enclave_brain::types::*;

const DT: f64 = 1.0 / 60.0;

// ─── Helpers ───────────────────────────────────────────────────────────────

/// Config with no random scripted events, so only the controls change scenes.
fn quiet_config() -> AppConfig {
    AppConfig {
        simulation: SimulationConfig {
            fate_event_chance: 0.0,
            chance_rules: Vec::new(),
            ..SimulationConfig::default()
        },
        ..AppConfig::default()
    }
}

struct Rig {
    app: App,
    messages: Receiver<ControlMessage>,
    colors: Receiver<RgbPacket>,
}

impl Rig {
    fn new(config: &AppConfig, input: Box<dyn ControlInputSource>, seed: u64) -> Self {
        let (msg_tx, messages) = unbounded();
        let (rgb_tx, colors) = unbounded();
        let app = App::new(
            config,
            Installation::builtin().unwrap(),
            Box::new(ChannelSink::new(msg_tx)),
            Box::new(ChannelFloodSink::new(rgb_tx)),
            input,
            Some(seed),
        );
        Self {
            app,
            messages,
            colors,
        }
    }

    fn run(&mut self, seconds: f64) {
        let ticks = (seconds / DT).round() as usize;
        for _ in 0..ticks {
            self.app.update(DT);
        }
    }

    fn drain(&self) -> Vec<ControlMessage> {
        self.messages.try_iter().collect()
    }
}

/// Raw control desk packet, as the microcontroller sends it.
fn desk_packet(kind: u8, index: u8, value: u16) -> Vec<u8> {
    let mut buf = vec![kind, index];
    buf.extend_from_slice(&value.to_le_bytes());
    buf
}

// ─── Integration Tests ─────────────────────────────────────────────────────

#[test]
fn test_startup_resets_layers_and_fades_in_lights() {
    let config = quiet_config();
    let mut rig = Rig::new(&config, Box::new(NoInput), 1);
    rig.app.update(DT);
    let first = rig.drain();
    let catalogue = rig.app.installation().catalogue.clone();

    for layer in Layer::ALL {
        let blackout = catalogue.blackout(layer);
        assert!(
            first.iter().any(|m| m.address == blackout && m.value == 1.0),
            "no blackout for {}",
            layer
        );
    }

    rig.run(config.lights.startup_fade + config.layers.cue_settle + 2.0);
    let controls = &catalogue.lights().controls;
    for addr in controls.brightness() {
        assert_eq!(rig.app.cache().get(addr), config.lights.max_brightness);
    }
    // some layer is visible once the first cue has faded in
    let visible = Layer::ALL
        .iter()
        .any(|&l| rig.app.cache().get(catalogue.control(l, LayerControl::Opacity)) > 0.0);
    assert!(visible);
}

#[test]
fn test_every_message_is_finite_and_in_range() {
    let config = AppConfig::default();
    let knobs = KnobSimulator::new(9).with_chance(0.2);
    let mut rig = Rig::new(&config, Box::new(knobs), 9);

    for _ in 0..20 {
        rig.run(30.0);
        let snap = *rig.app.snapshot();
        assert!((0.0..=1.0).contains(&snap.forest_health));
        assert!((0.0..=1.0).contains(&snap.scene_intensity));
        for msg in rig.drain() {
            assert!(msg.value.is_finite(), "{}", msg);
            assert!((0.0..=1.0).contains(&msg.value), "{}", msg);
        }
    }
    assert_eq!(rig.app.frames(), 20 * 1800);
}

#[test]
fn test_desk_bytes_drive_simulation_and_flicker() {
    let (tx, rx) = unbounded();
    let mut rig = Rig::new(&quiet_config(), Box::new(ChannelInput::new(rx)), 2);
    rig.run(8.0);
    rig.drain();

    // climate change knob to full, split across two serial reads
    let mut decoder = PacketDecoder::new();
    let bytes = desk_packet(b'p', 0, 4094);
    for input in decoder
        .feed(&bytes[..1])
        .into_iter()
        .chain(decoder.feed(&bytes[1..]))
    {
        tx.send(input).unwrap();
    }
    rig.app.update(DT);
    assert_eq!(
        rig.app.simulation().param_value(ParamName::ClimateChange),
        1.0
    );

    rig.run(3.0);
    let tube = rig.app.installation().catalogue.lights().controls.tubes[0].clone();
    let dips = rig
        .drain()
        .iter()
        .filter(|m| m.address == tube && m.value == config_low())
        .count();
    assert!(dips >= 1, "knob change did not flicker the tubes");

    // forest health falls while the knob stays up
    let before = rig.app.snapshot().forest_health;
    rig.run(20.0);
    assert!(rig.app.snapshot().forest_health < before);
}

fn config_low() -> f64 {
    AppConfig::default().flicker.low
}

#[test]
fn test_storm_button_switches_background_cues() {
    let (tx, rx) = unbounded();
    let mut rig = Rig::new(&quiet_config(), Box::new(ChannelInput::new(rx)), 3);
    rig.run(10.0);
    while rig.colors.try_recv().is_ok() {}

    let mut decoder = PacketDecoder::new();
    for input in decoder.feed(&desk_packet(b'b', 3, 1)) {
        tx.send(input).unwrap();
    }
    rig.app.update(DT);
    assert_eq!(rig.app.scene(), Some(Scene::Storm));
    assert!(rig.app.snapshot().event_active);

    rig.run(15.0);
    let storm = rig.app.installation().scenes.def(Scene::Storm).clone();
    let cue = rig
        .app
        .layer_controller(LayerGroup::Background)
        .current_cue()
        .cloned()
        .unwrap();
    assert!(storm.bg.contains(&cue.bin), "{} not a storm cue", cue);

    // flood lights faded to the storm palette
    let last: Vec<RgbPacket> = rig.colors.try_iter().collect();
    assert!(!last.is_empty());
    let expected = storm
        .flood_lights
        .iter()
        .map(|name| rig.app.installation().scenes.color(name).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(rig.app.flood_lights().colors().to_vec(), expected);
}

#[test]
fn test_same_seed_same_show() {
    let run = || {
        let knobs = KnobSimulator::new(4).with_chance(0.1);
        let mut rig = Rig::new(&AppConfig::default(), Box::new(knobs), 4);
        rig.run(60.0);
        rig.drain()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_osc_sender_delivers_app_output() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let target = receiver.local_addr().unwrap().to_string();

    let (tx, rx) = unbounded();
    let sender = thread::spawn(move || OscSender::new(rx, target).run());

    // forward a handful of real control messages from one tick
    let mut rig = Rig::new(&quiet_config(), Box::new(NoInput), 5);
    rig.app.update(DT);
    let sent: Vec<ControlMessage> = rig.drain().into_iter().take(5).collect();
    for msg in &sent {
        tx.send(msg.clone()).unwrap();
    }
    drop(tx);
    sender.join().unwrap();

    let mut buf = [0u8; rosc::decoder::MTU];
    for msg in &sent {
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        let rosc::OscPacket::Message(m) = packet else {
            panic!("expected message");
        };
        assert_eq!(m.addr, msg.address);
        assert_eq!(m.args, vec![rosc::OscType::Float(msg.value as f32)]);
    }
}

#[test]
fn test_tables_load_from_json() {
    let dir = std::env::temp_dir().join(format!("enclave-brain-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let scenes_path = dir.join("scenes.json");
    let file = SceneTableFile::from(enclave_scenes());
    std::fs::write(&scenes_path, serde_json::to_string_pretty(&file).unwrap()).unwrap();
    let installation = Installation::load(Some(&scenes_path), None).unwrap();
    assert_eq!(
        installation.scenes.def(Scene::Rain).flood_lights,
        enclave_scenes().def(Scene::Rain).flood_lights
    );

    // a scene pointing at a bin no layer has is rejected
    let mut broken = SceneTableFile::from(enclave_scenes());
    if let Some(def) = broken.scenes.get_mut(&Scene::Rain) {
        def.bg.push("volcanoes".to_string());
    }
    std::fs::write(&scenes_path, serde_json::to_string(&broken).unwrap()).unwrap();
    let err = Installation::load(Some(&scenes_path), None).unwrap_err();
    assert!(err.to_string().contains("volcanoes"), "{}", err);

    let config_path = dir.join("config.json");
    std::fs::write(&config_path, r#"{ "tick_hz": 30, "lights": { "frequency": 5.0 } }"#)
        .unwrap();
    let config = AppConfig::load(&config_path).unwrap();
    assert_eq!(config.tick_hz, 30);
    assert_eq!(config.lights.frequency, 5.0);
    assert_eq!(config.layers.fade, AppConfig::default().layers.fade);

    std::fs::write(&config_path, r#"{ "tick_hz": 0 }"#).unwrap();
    assert!(AppConfig::load(&config_path).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
