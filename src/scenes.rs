//! Scene table: which cue bins, blackout odds, flood light colors and
//! health effects belong to each scene of the installation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A discrete mode of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    HealthyForest,
    BurningForest,
    DeadForest,
    GrowingForest,
    ClimateChange,
    Deforestation,
    Rain,
    Storm,
}

/// Scenes selected from forest health when no scripted event is running.
pub const MAIN_SCENES: [Scene; 4] = [
    Scene::HealthyForest,
    Scene::BurningForest,
    Scene::DeadForest,
    Scene::GrowingForest,
];

/// Scenes that can only be entered as scripted events.
pub const EVENT_SCENES: [Scene; 4] = [
    Scene::ClimateChange,
    Scene::Deforestation,
    Scene::Rain,
    Scene::Storm,
];

impl Scene {
    pub const ALL: [Scene; 8] = [
        Scene::HealthyForest,
        Scene::BurningForest,
        Scene::DeadForest,
        Scene::GrowingForest,
        Scene::ClimateChange,
        Scene::Deforestation,
        Scene::Rain,
        Scene::Storm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scene::HealthyForest => "healthy_forest",
            Scene::BurningForest => "burning_forest",
            Scene::DeadForest => "dead_forest",
            Scene::GrowingForest => "growing_forest",
            Scene::ClimateChange => "climate_change",
            Scene::Deforestation => "deforestation",
            Scene::Rain => "rain",
            Scene::Storm => "storm",
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scene {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scene::ALL
            .iter()
            .find(|scene| scene.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown scene {:?}", s))
    }
}

/// Per-scene configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDef {
    /// Background cue bins eligible in this scene
    pub bg: Vec<String>,
    /// Foreground cue bins eligible in this scene
    pub fg: Vec<String>,
    /// Probability that a foreground change blacks the foreground out instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_blackout: Option<f64>,
    /// Palette color names, one per flood light
    #[serde(default)]
    pub flood_lights: Vec<String>,
    /// Forest health delta applied when this scene is triggered as an event
    #[serde(default)]
    pub health_effect: f64,
    /// Bounds on a scripted event's duration (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<f64>,
}

impl SceneDef {
    /// Clamp a requested event duration to this scene's length bounds.
    pub fn clamp_length(&self, duration: f64) -> f64 {
        let mut d = duration.max(0.0);
        if let Some(max) = self.max_length {
            d = d.min(max);
        }
        if let Some(min) = self.min_length {
            d = d.max(min);
        }
        d
    }
}

/// On-disk shape of the scene table, validated into [`SceneTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneTableFile {
    pub scenes: BTreeMap<Scene, SceneDef>,
    pub palette: BTreeMap<String, [u8; 3]>,
}

/// Validated scene table. Every [`Scene`] has an entry and every flood light
/// color resolves in the palette.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SceneTableFile", into = "SceneTableFile")]
pub struct SceneTable {
    scenes: BTreeMap<Scene, SceneDef>,
    palette: BTreeMap<String, [u8; 3]>,
}

impl TryFrom<SceneTableFile> for SceneTable {
    type Error = ConfigError;

    fn try_from(file: SceneTableFile) -> Result<Self, Self::Error> {
        for scene in Scene::ALL {
            let def = file
                .scenes
                .get(&scene)
                .ok_or_else(|| ConfigError::MissingScene(scene.to_string()))?;
            for color in &def.flood_lights {
                if !file.palette.contains_key(color) {
                    return Err(ConfigError::UnknownColor {
                        scene: scene.to_string(),
                        color: color.clone(),
                    });
                }
            }
            if let Some(p) = def.fg_blackout {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ConfigError::Invalid(format!(
                        "scene {}: fg_blackout {} outside [0, 1]",
                        scene, p
                    )));
                }
            }
        }
        Ok(Self {
            scenes: file.scenes,
            palette: file.palette,
        })
    }
}

impl From<SceneTable> for SceneTableFile {
    fn from(table: SceneTable) -> Self {
        Self {
            scenes: table.scenes,
            palette: table.palette,
        }
    }
}

impl SceneTable {
    pub fn def(&self, scene: Scene) -> &SceneDef {
        // every variant is present after validation
        &self.scenes[&scene]
    }

    pub fn color(&self, name: &str) -> Option<[u8; 3]> {
        self.palette.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Scene, &SceneDef)> {
        self.scenes.iter().map(|(s, d)| (*s, d))
    }
}

fn bins(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn scene(bg: &[&str], fg: &[&str], flood: [&str; 2]) -> SceneDef {
    SceneDef {
        bg: bins(bg),
        fg: bins(fg),
        fg_blackout: None,
        flood_lights: bins(&flood),
        health_effect: 0.0,
        min_length: None,
        max_length: None,
    }
}

/// The installation's scene table.
pub fn enclave_scenes() -> SceneTable {
    let mut scenes = BTreeMap::new();

    scenes.insert(
        Scene::HealthyForest,
        SceneDef {
            fg_blackout: Some(0.9),
            ..scene(
                &["boreal", "forest", "rainforest", "flowers", "summer"],
                &["birds"],
                ["green", "blue"],
            )
        },
    );
    scenes.insert(
        Scene::BurningForest,
        SceneDef {
            min_length: Some(20.0),
            max_length: Some(48.0),
            ..scene(&["fires"], &["fires", "smoke"], ["red", "orange"])
        },
    );
    scenes.insert(
        Scene::DeadForest,
        SceneDef {
            fg_blackout: Some(0.9),
            ..scene(&["dead"], &["smoke"], ["brown", "grey"])
        },
    );
    scenes.insert(
        Scene::GrowingForest,
        SceneDef {
            fg_blackout: Some(0.5),
            min_length: Some(20.0),
            max_length: Some(50.0),
            ..scene(
                &["growth", "mushrooms"],
                &["rain", "mushrooms", "flowers"],
                ["green", "blue"],
            )
        },
    );
    scenes.insert(
        Scene::ClimateChange,
        SceneDef {
            health_effect: -0.1,
            min_length: Some(20.0),
            max_length: Some(60.0),
            ..scene(
                &["dry_pine", "drought", "smoke"],
                &["fires", "smoke"],
                ["orange", "grey"],
            )
        },
    );
    scenes.insert(
        Scene::Deforestation,
        SceneDef {
            fg_blackout: Some(0.8),
            health_effect: -0.1,
            min_length: Some(20.0),
            max_length: Some(48.0),
            ..scene(
                &["deforestation", "pollution", "industry", "roads", "logging"],
                &["smoke"],
                ["brown", "red"],
            )
        },
    );
    scenes.insert(
        Scene::Rain,
        SceneDef {
            health_effect: 0.1,
            min_length: Some(20.0),
            max_length: Some(48.0),
            ..scene(&["rain"], &["rain"], ["teal", "indigo"])
        },
    );
    scenes.insert(
        Scene::Storm,
        SceneDef {
            health_effect: -0.1,
            min_length: Some(30.0),
            max_length: Some(60.0),
            ..scene(&["storms"], &["storms"], ["blue", "purple"])
        },
    );

    let palette: BTreeMap<String, [u8; 3]> = [
        ("green", [0, 122, 10]),
        ("blue", [0, 15, 128]),
        ("red", [128, 0, 0]),
        ("orange", [191, 120, 0]),
        ("brown", [125, 79, 0]),
        ("grey", [130, 130, 130]),
        ("teal", [0, 125, 89]),
        ("indigo", [33, 0, 125]),
        ("purple", [112, 0, 125]),
    ]
    .into_iter()
    .map(|(name, rgb)| (name.to_string(), rgb))
    .collect();

    SceneTable { scenes, palette }
}
