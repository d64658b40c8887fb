//! Media server catalogue: cue and control addresses for every projection
//! layer and for the lights, plus the validated [`Installation`] that ties
//! the catalogue to the scene table.

use crate::config::read_json;
use crate::error::{ConfigError, Result};
use crate::scenes::{enclave_scenes, Scene, SceneTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Default clip length for one-shot cues that don't declare one (seconds).
pub const DEFAULT_CLIP_LENGTH: f64 = 6.0;

/// Physical projection layer on the media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Bg1,
    Bg2,
    Fg1,
    Fg2,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Bg1, Layer::Bg2, Layer::Fg1, Layer::Fg2];

    pub fn group(&self) -> LayerGroup {
        match self {
            Layer::Bg1 | Layer::Bg2 => LayerGroup::Background,
            Layer::Fg1 | Layer::Fg2 => LayerGroup::Foreground,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bg1 => "bg1",
            Layer::Bg2 => "bg2",
            Layer::Fg1 => "fg1",
            Layer::Fg2 => "fg2",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background or foreground: each role owns two physical layers so one can
/// fade while the other is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerGroup {
    Background,
    Foreground,
}

impl LayerGroup {
    pub fn layers(&self) -> [Layer; 2] {
        match self {
            LayerGroup::Background => [Layer::Bg1, Layer::Bg2],
            LayerGroup::Foreground => [Layer::Fg1, Layer::Fg2],
        }
    }

    /// Bins the scene allows for this group.
    pub fn scene_bins<'a>(&self, scenes: &'a SceneTable, scene: Scene) -> &'a [String] {
        let def = scenes.def(scene);
        match self {
            LayerGroup::Background => &def.bg,
            LayerGroup::Foreground => &def.fg,
        }
    }
}

impl fmt::Display for LayerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerGroup::Background => "bg",
            LayerGroup::Foreground => "fg",
        })
    }
}

/// Per-layer continuous controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerControl {
    Opacity,
    MaskOpacity,
    FxAmount,
    FeedbackAmount,
    FeedbackFxAmount,
}

impl LayerControl {
    pub const ALL: [LayerControl; 5] = [
        LayerControl::FeedbackAmount,
        LayerControl::FeedbackFxAmount,
        LayerControl::FxAmount,
        LayerControl::MaskOpacity,
        LayerControl::Opacity,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueDef {
    pub address: String,
    /// Plays once to completion instead of looping
    #[serde(default)]
    pub one_shot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_length: Option<f64>,
}

impl CueDef {
    pub fn clip_length(&self) -> f64 {
        self.clip_length.unwrap_or(DEFAULT_CLIP_LENGTH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerControls {
    pub opacity: String,
    pub mask_opacity: String,
    pub fx_amount: String,
    pub feedback_amount: String,
    pub feedback_fx_amount: String,
}

impl LayerControls {
    pub fn address(&self, control: LayerControl) -> &str {
        match control {
            LayerControl::Opacity => &self.opacity,
            LayerControl::MaskOpacity => &self.mask_opacity,
            LayerControl::FxAmount => &self.fx_amount,
            LayerControl::FeedbackAmount => &self.feedback_amount,
            LayerControl::FeedbackFxAmount => &self.feedback_fx_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerCatalogue {
    /// bin name → cues
    pub cues: BTreeMap<String, Vec<CueDef>>,
    /// Cue that blanks the layer
    pub blackout: String,
    pub controls: LayerControls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightControls {
    pub speed: String,
    pub tubes: [String; 3],
    pub lanterns: [String; 2],
}

impl LightControls {
    /// Every brightness control, tubes first.
    pub fn brightness(&self) -> impl Iterator<Item = &str> {
        self.tubes
            .iter()
            .chain(self.lanterns.iter())
            .map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightsCatalogue {
    /// Content cues ordered by increasing intensity
    pub content: Vec<String>,
    /// Color cues per scene; index 0 is reserved
    pub colors: BTreeMap<Scene, Vec<String>>,
    pub controls: LightControls,
}

/// A specific cue: layer + bin + index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CueRef {
    pub layer: Layer,
    pub bin: String,
    pub index: usize,
}

impl fmt::Display for CueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.layer, self.bin, self.index)
    }
}

/// On-disk shape of the catalogue, validated into [`MediaCatalogue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCatalogueFile {
    pub layers: BTreeMap<Layer, LayerCatalogue>,
    pub lights: LightsCatalogue,
}

/// Cue and control addresses on the media server. Every [`Layer`] is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MediaCatalogueFile", into = "MediaCatalogueFile")]
pub struct MediaCatalogue {
    layers: BTreeMap<Layer, LayerCatalogue>,
    lights: LightsCatalogue,
}

impl TryFrom<MediaCatalogueFile> for MediaCatalogue {
    type Error = ConfigError;

    fn try_from(file: MediaCatalogueFile) -> Result<Self> {
        for layer in Layer::ALL {
            if !file.layers.contains_key(&layer) {
                return Err(ConfigError::Invalid(format!(
                    "catalogue is missing layer {}",
                    layer
                )));
            }
        }
        if file.lights.content.is_empty() {
            return Err(ConfigError::NoLightContent);
        }
        Ok(Self {
            layers: file.layers,
            lights: file.lights,
        })
    }
}

impl From<MediaCatalogue> for MediaCatalogueFile {
    fn from(c: MediaCatalogue) -> Self {
        Self {
            layers: c.layers,
            lights: c.lights,
        }
    }
}

impl MediaCatalogue {
    pub fn layer(&self, layer: Layer) -> &LayerCatalogue {
        // every variant is present after validation
        &self.layers[&layer]
    }

    pub fn lights(&self) -> &LightsCatalogue {
        &self.lights
    }

    pub fn control(&self, layer: Layer, control: LayerControl) -> &str {
        self.layer(layer).controls.address(control)
    }

    pub fn blackout(&self, layer: Layer) -> &str {
        &self.layer(layer).blackout
    }

    pub fn cue(&self, cue: &CueRef) -> Option<&CueDef> {
        self.layer(cue.layer).cues.get(&cue.bin)?.get(cue.index)
    }

    /// All cues on the group's layers that belong to one of `bins`.
    pub fn cues_for(&self, group: LayerGroup, bins: &[String]) -> Vec<CueRef> {
        let mut out = Vec::new();
        for layer in group.layers() {
            let cat = self.layer(layer);
            for bin in bins {
                if let Some(cues) = cat.cues.get(bin) {
                    out.extend((0..cues.len()).map(|index| CueRef {
                        layer,
                        bin: bin.clone(),
                        index,
                    }));
                }
            }
        }
        out
    }

    pub fn light_color(&self, scene: Scene, index: usize) -> Option<&str> {
        self.lights
            .colors
            .get(&scene)
            .and_then(|c| c.get(index))
            .map(|s| s.as_str())
    }

    pub fn light_color_count(&self, scene: Scene) -> usize {
        self.lights.colors.get(&scene).map_or(0, |c| c.len())
    }
}

/// Scene table and catalogue, cross-validated so that every bin a scene
/// names exists on a layer of the right group and every scene has light
/// colors to choose from.
#[derive(Debug, Clone)]
pub struct Installation {
    pub scenes: SceneTable,
    pub catalogue: MediaCatalogue,
}

impl Installation {
    pub fn new(scenes: SceneTable, catalogue: MediaCatalogue) -> Result<Self> {
        for (scene, _) in scenes.iter() {
            for group in [LayerGroup::Background, LayerGroup::Foreground] {
                let bins = group.scene_bins(&scenes, scene);
                for bin in bins {
                    let known = group
                        .layers()
                        .iter()
                        .any(|l| catalogue.layer(*l).cues.contains_key(bin));
                    if !known {
                        return Err(ConfigError::UnknownBin {
                            scene: scene.to_string(),
                            group: group.to_string(),
                            bin: bin.clone(),
                        });
                    }
                }
                if catalogue.cues_for(group, bins).is_empty() {
                    return Err(ConfigError::NoCues {
                        scene: scene.to_string(),
                        group: group.to_string(),
                    });
                }
            }
            if catalogue.light_color_count(scene) < 2 {
                return Err(ConfigError::LightColors(scene.to_string()));
            }
        }
        Ok(Self { scenes, catalogue })
    }

    /// Load scene table and catalogue from JSON files, falling back to the
    /// built-in tables for whichever path is absent.
    pub fn load(scenes: Option<&Path>, catalogue: Option<&Path>) -> Result<Self> {
        let scenes = match scenes {
            Some(path) => read_json(path)?,
            None => enclave_scenes(),
        };
        let catalogue = match catalogue {
            Some(path) => read_json(path)?,
            None => madmapper_catalogue(),
        };
        Self::new(scenes, catalogue)
    }

    pub fn builtin() -> Result<Self> {
        Self::new(enclave_scenes(), madmapper_catalogue())
    }
}

// ─── Built-in MadMapper catalogue ───────────────────────────────────────────

fn cue(row: u32, col: u32) -> CueDef {
    CueDef {
        address: format!("/cues/selected/cues/by_cell/col_{}/row_{}", col, row),
        one_shot: false,
        clip_length: None,
    }
}

fn one_shot(row: u32, col: u32, clip_length: f64) -> CueDef {
    CueDef {
        one_shot: true,
        clip_length: Some(clip_length),
        ..cue(row, col)
    }
}

/// `count` cues along a row, starting at column `start_col`.
fn row_from(row: u32, count: u32, start_col: u32) -> Vec<CueDef> {
    (0..count).map(|i| cue(row, start_col + i)).collect()
}

fn row(row: u32, count: u32) -> Vec<CueDef> {
    row_from(row, count, 1)
}

fn column(col: u32, count: u32, start_row: u32) -> Vec<String> {
    (0..count)
        .map(|i| cue(start_row + i, col).address)
        .collect()
}

fn controls(name: &str) -> LayerControls {
    LayerControls {
        opacity: format!("/surfaces/Main/{}/opacity", name),
        mask_opacity: format!("/surfaces/Layers/{0}_Layers/{0}_Layer_Mask/opacity", name),
        fx_amount: format!("/{}/fx_amount", name),
        feedback_amount: format!("/modules/{}_FEEDBACK_AMOUNT/Inputs/Input_1", name),
        feedback_fx_amount: format!("/{}/feedback/fx_amount", name),
    }
}

fn layer(name: &str, blackout: CueDef, bins: Vec<(&str, Vec<CueDef>)>) -> LayerCatalogue {
    LayerCatalogue {
        cues: bins
            .into_iter()
            .map(|(bin, cues)| (bin.to_string(), cues))
            .collect(),
        blackout: blackout.address,
        controls: controls(name),
    }
}

/// The installation's MadMapper project: cue grid cells and control inputs.
pub fn madmapper_catalogue() -> MediaCatalogue {
    let mut layers = BTreeMap::new();

    layers.insert(
        Layer::Fg2,
        layer(
            "Foreground_2",
            cue(74, 4),
            vec![
                ("birds", row(4, 2)),
                ("falling_trees", vec![one_shot(19, 1, 10.0)]),
                ("fires", row(24, 6)),
                ("flowers", row(29, 2)),
                ("forest", row(34, 1)),
                ("mushrooms", row(42, 1)),
                ("rain", row(47, 2)),
                ("storms", row(61, 3)),
                ("winter", row(69, 1)),
                ("smoke", row_from(55, 4, 11)),
            ],
        ),
    );
    layers.insert(
        Layer::Fg1,
        layer(
            "Foreground_1",
            cue(74, 3),
            vec![
                ("birds", row(5, 1)),
                ("falling_trees", vec![one_shot(20, 1, 10.0)]),
                ("fires", row(25, 2)),
                ("flowers", row(30, 2)),
                ("forest", row(35, 1)),
                ("mushrooms", row(43, 2)),
                ("storms", row(62, 3)),
                ("smoke", row_from(56, 3, 11)),
            ],
        ),
    );
    layers.insert(
        Layer::Bg2,
        layer(
            "Background_2",
            cue(74, 2),
            vec![
                ("boreal", row(1, 2)),
                ("dead", row(7, 6)),
                ("deforestation", row(10, 3)),
                ("dry_pine", row(13, 3)),
                ("fall", row(16, 5)),
                ("falling_trees", row(21, 1)),
                ("fires", row(26, 5)),
                ("flowers", row(31, 5)),
                ("forest", row(36, 2)),
                ("mushrooms", row(44, 2)),
                ("rain", row(49, 3)),
                ("rainforest", row(52, 6)),
                ("smoke", row(55, 1)),
                ("spring", row(58, 4)),
                ("storms", row(63, 3)),
                ("summer", row(66, 6)),
                ("winter", row(71, 5)),
                ("drought", row(78, 2)),
                ("industry", row(83, 3)),
                ("pollution", row(88, 1)),
                ("roads", row(93, 2)),
                ("growth", row(98, 4)),
                ("logging", row(103, 1)),
            ],
        ),
    );
    layers.insert(
        Layer::Bg1,
        layer(
            "Background_1",
            cue(74, 1),
            vec![
                ("boreal", row(2, 1)),
                ("dead", row(8, 6)),
                ("deforestation", row(11, 2)),
                ("fall", row(17, 4)),
                ("falling_trees", row(22, 1)),
                ("fires", row(27, 5)),
                ("flowers", row(32, 2)),
                ("forest", row(37, 3)),
                ("mushrooms", row(45, 2)),
                ("rain", row(50, 4)),
                ("rainforest", row(53, 5)),
                ("smoke", row(56, 3)),
                ("spring", row(59, 4)),
                ("storms", row(64, 1)),
                ("summer", row(67, 6)),
                ("winter", row(72, 6)),
                ("drought", row(79, 2)),
                ("industry", row(84, 2)),
                ("pollution", row(89, 1)),
                ("roads", row(94, 3)),
                ("growth", row(99, 5)),
                ("logging", row(104, 4)),
            ],
        ),
    );

    let colors = [
        (Scene::HealthyForest, 11),
        (Scene::BurningForest, 12),
        (Scene::DeadForest, 13),
        (Scene::GrowingForest, 11),
        (Scene::ClimateChange, 14),
        (Scene::Deforestation, 15),
        (Scene::Rain, 16),
        (Scene::Storm, 17),
    ]
    .into_iter()
    .map(|(scene, col)| (scene, column(col, 3, 2)))
    .collect();

    let lights = LightsCatalogue {
        content: row_from(1, 4, 11).into_iter().map(|c| c.address).collect(),
        colors,
        controls: LightControls {
            speed: "/Lights/Speed".into(),
            tubes: [
                "/modules/TUBES_1_BRIGHTNESS/Inputs/Input_1".into(),
                "/modules/TUBES_2_BRIGHTNESS/Inputs/Input_1".into(),
                "/modules/TUBES_3_BRIGHTNESS/Inputs/Input_1".into(),
            ],
            lanterns: [
                "/modules/LANTERNS_1_BRIGHTNESS/Inputs/Input_1".into(),
                "/modules/LANTERNS_2_BRIGHTNESS/Inputs/Input_1".into(),
            ],
        },
    };

    MediaCatalogue { layers, lights }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_installation_validates() {
        let inst = Installation::builtin().unwrap();
        let bg = inst
            .catalogue
            .cues_for(LayerGroup::Background, &inst.scenes.def(Scene::BurningForest).bg);
        // fires: 5 on bg2, 5 on bg1
        assert_eq!(bg.len(), 10);
        assert!(bg.iter().any(|c| c.layer == Layer::Bg1));
        assert!(bg.iter().any(|c| c.layer == Layer::Bg2));
    }

    #[test]
    fn test_unknown_bin_is_a_load_error() {
        let mut file: crate::scenes::SceneTableFile = enclave_scenes().into();
        if let Some(def) = file.scenes.get_mut(&Scene::Rain) {
            def.bg.push("volcanoes".into());
        }
        let scenes = SceneTable::try_from(file).unwrap();
        let err = Installation::new(scenes, madmapper_catalogue()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBin { ref bin, .. } if bin == "volcanoes"));
    }

    #[test]
    fn test_bin_on_wrong_group_rejected() {
        let mut file: crate::scenes::SceneTableFile = enclave_scenes().into();
        if let Some(def) = file.scenes.get_mut(&Scene::Storm) {
            // only exists on the background layers
            def.fg = vec!["dry_pine".into()];
        }
        let scenes = SceneTable::try_from(file).unwrap();
        assert!(Installation::new(scenes, madmapper_catalogue()).is_err());
    }

    #[test]
    fn test_one_shot_metadata() {
        let cat = madmapper_catalogue();
        let cue_ref = CueRef {
            layer: Layer::Fg2,
            bin: "falling_trees".into(),
            index: 0,
        };
        let def = cat.cue(&cue_ref).unwrap();
        assert!(def.one_shot);
        assert_eq!(def.clip_length(), 10.0);

        let looping = CueRef {
            layer: Layer::Bg1,
            bin: "fires".into(),
            index: 2,
        };
        assert!(!cat.cue(&looping).unwrap().one_shot);
        assert_eq!(cat.cue(&looping).unwrap().clip_length(), DEFAULT_CLIP_LENGTH);
    }

    #[test]
    fn test_addresses() {
        let cat = madmapper_catalogue();
        assert_eq!(
            cat.control(Layer::Bg1, LayerControl::Opacity),
            "/surfaces/Main/Background_1/opacity"
        );
        assert_eq!(cat.blackout(Layer::Fg1), "/cues/selected/cues/by_cell/col_3/row_74");
        assert_eq!(
            cat.light_color(Scene::Rain, 1),
            Some("/cues/selected/cues/by_cell/col_16/row_3")
        );
        assert_eq!(cat.lights().content.len(), 4);
    }
}
