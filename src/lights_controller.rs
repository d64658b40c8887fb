//! Lighting cues driven by scene intensity: speed, content and color.

use crate::catalogue::MediaCatalogue;
use crate::config::LightsConfig;
use crate::event::{Event, EventManager};
use crate::simulation::SimSnapshot;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct LightsController {
    config: LightsConfig,
    time: f64,
    content_index: Option<usize>,
    rng: StdRng,
}

impl LightsController {
    pub fn new(config: &LightsConfig, seed: u64) -> Self {
        Self {
            config: config.clone(),
            time: 0.0,
            content_index: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn content_index(&self) -> Option<usize> {
        self.content_index
    }

    pub fn update(
        &mut self,
        dt: f64,
        snapshot: &SimSnapshot,
        scene_changed: bool,
        catalogue: &MediaCatalogue,
        events: &mut EventManager,
    ) {
        let lights = catalogue.lights();
        let intensity = snapshot.scene_intensity.clamp(0.0, 1.0);

        let speed = lights.controls.speed.as_str();
        let current = events.cache().get(speed);
        events.add(Event::transition(speed, current, intensity, 0.0));

        // content is ordered by intensity; validated non-empty
        let last = lights.content.len().saturating_sub(1);
        let index = ((intensity * last as f64).round() as usize).min(last);
        if self.content_index != Some(index) {
            debug!("Lights content {}", index);
            self.content_index = Some(index);
            events.add(Event::trigger(lights.content[index].as_str()));
        }

        self.time += dt;
        if !scene_changed && self.time < self.config.frequency {
            return;
        }
        self.time = 0.0;

        // color 0 is reserved
        let count = catalogue.light_color_count(snapshot.scene);
        if count < 2 {
            warn!("No light colors for {}", snapshot.scene);
            return;
        }
        let color = self.rng.gen_range(1..count);
        if let Some(address) = catalogue.light_color(snapshot.scene, color) {
            debug!("Lights color {} for {}", color, snapshot.scene);
            events.add(Event::trigger(address));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::madmapper_catalogue;
    use crate::scenes::Scene;
    use crate::sink::test_helpers::RecordingSink;

    fn snapshot(scene: Scene, intensity: f64) -> SimSnapshot {
        SimSnapshot {
            scene,
            forest_health: 1.0 - intensity,
            scene_intensity: intensity,
            current_time: 0.0,
            event_active: false,
        }
    }

    #[test]
    fn test_speed_tracks_intensity() {
        let cat = madmapper_catalogue();
        let mut events = EventManager::new(Box::new(RecordingSink::new()));
        let mut lights = LightsController::new(&LightsConfig::default(), 1);
        for intensity in [0.2, 0.9, 0.4] {
            lights.update(0.1, &snapshot(Scene::HealthyForest, intensity), false, &cat, &mut events);
            events.advance(0.1);
            assert_eq!(events.cache().get("/Lights/Speed"), intensity);
        }
    }

    #[test]
    fn test_content_triggers_only_on_index_change() {
        let cat = madmapper_catalogue();
        let sink = RecordingSink::new();
        let mut events = EventManager::new(Box::new(sink.clone()));
        let mut lights = LightsController::new(&LightsConfig::default(), 1);
        let content = cat.lights().content.clone();

        // four content cues: index = round(intensity * 3)
        for intensity in [0.0, 0.1, 0.15, 0.5, 0.55, 1.0] {
            lights.update(0.1, &snapshot(Scene::HealthyForest, intensity), false, &cat, &mut events);
            events.advance(0.1);
        }
        assert_eq!(sink.values(&content[0]).len(), 1);
        assert_eq!(sink.values(&content[1]).len(), 0);
        assert_eq!(sink.values(&content[2]).len(), 1);
        assert_eq!(sink.values(&content[3]).len(), 1);
        assert_eq!(lights.content_index(), Some(3));
    }

    #[test]
    fn test_color_on_scene_change_and_period() {
        let cat = madmapper_catalogue();
        let sink = RecordingSink::new();
        let mut events = EventManager::new(Box::new(sink.clone()));
        let config = LightsConfig {
            frequency: 5.0,
            ..LightsConfig::default()
        };
        let mut lights = LightsController::new(&config, 7);
        let colors = |scene| -> Vec<String> {
            (0..cat.light_color_count(scene))
                .filter_map(|i| cat.light_color(scene, i).map(str::to_string))
                .collect()
        };
        let sent = |scene| -> usize {
            colors(scene)
                .iter()
                .map(|addr| sink.values(addr).len())
                .sum()
        };

        lights.update(0.1, &snapshot(Scene::Storm, 0.5), true, &cat, &mut events);
        events.advance(0.1);
        assert_eq!(sent(Scene::Storm), 1);
        // the reserved color is never picked
        assert!(sink.values(&colors(Scene::Storm)[0]).is_empty());

        for _ in 0..49 {
            lights.update(0.1, &snapshot(Scene::Storm, 0.5), false, &cat, &mut events);
            events.advance(0.1);
        }
        assert_eq!(sent(Scene::Storm), 1);
        lights.update(0.2, &snapshot(Scene::Storm, 0.5), false, &cat, &mut events);
        events.advance(0.1);
        assert_eq!(sent(Scene::Storm), 2);
    }
}
