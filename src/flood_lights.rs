//! Flood-light colors: cross-fade both lights to the scene's palette colors
//! on every scene change.

use crate::scenes::{Scene, SceneTable};
use crate::sink::FloodLightSink;
use crate::types::{RgbPacket, FLOOD_LIGHT_COUNT};
use log::{debug, warn};

#[derive(Debug, Clone)]
struct Fade {
    from: [[f64; 3]; FLOOD_LIGHT_COUNT],
    to: [[f64; 3]; FLOOD_LIGHT_COUNT],
    elapsed: f64,
}

pub struct FloodLightsController {
    fade_time: f64,
    current: [[f64; 3]; FLOOD_LIGHT_COUNT],
    last_sent: [Option<[u8; 3]>; FLOOD_LIGHT_COUNT],
    fade: Option<Fade>,
}

impl FloodLightsController {
    pub fn new(fade_time: f64) -> Self {
        Self {
            fade_time: fade_time.max(0.0),
            current: [[0.0; 3]; FLOOD_LIGHT_COUNT],
            last_sent: [None; FLOOD_LIGHT_COUNT],
            fade: None,
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Current color of each light.
    pub fn colors(&self) -> [[u8; 3]; FLOOD_LIGHT_COUNT] {
        self.current.map(to_rgb)
    }

    pub fn update(
        &mut self,
        dt: f64,
        scene: Scene,
        scene_changed: bool,
        scenes: &SceneTable,
        sink: &mut dyn FloodLightSink,
    ) {
        if scene_changed {
            self.start_fade(scene, scenes);
        }

        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        fade.elapsed += dt.max(0.0);
        let t = if self.fade_time > 0.0 {
            (fade.elapsed / self.fade_time).min(1.0)
        } else {
            1.0
        };
        for light in 0..FLOOD_LIGHT_COUNT {
            for ch in 0..3 {
                let (a, b) = (fade.from[light][ch], fade.to[light][ch]);
                self.current[light][ch] = a + (b - a) * t;
            }
        }
        if t >= 1.0 {
            self.fade = None;
        }

        for (light, color) in self.current.iter().enumerate() {
            let rgb = to_rgb(*color);
            if self.last_sent[light] != Some(rgb) {
                self.last_sent[light] = Some(rgb);
                sink.send_rgb(RgbPacket {
                    light_index: light as u8,
                    rgb,
                });
            }
        }
    }

    fn start_fade(&mut self, scene: Scene, scenes: &SceneTable) {
        let names = &scenes.def(scene).flood_lights;
        let mut to = self.current;
        for (light, name) in names.iter().enumerate().take(FLOOD_LIGHT_COUNT) {
            match scenes.color(name) {
                Some(rgb) => to[light] = rgb.map(f64::from),
                None => warn!("Flood light color {:?} not in palette", name),
            }
        }
        debug!("Flood lights → {:?} for {}", names, scene);
        self.fade = Some(Fade {
            from: self.current,
            to,
            elapsed: 0.0,
        });
    }
}

fn to_rgb(color: [f64; 3]) -> [u8; 3] {
    color.map(|c| c.round().clamp(0.0, 255.0) as u8)
}
