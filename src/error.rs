use std::path::PathBuf;

/// Errors raised while loading and validating configuration, scene table
/// and media catalogue. Nothing in the tick loop returns these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("scene {0} is missing from the scene table")]
    MissingScene(String),
    #[error("scene {scene}: {group} bin {bin:?} exists on no {group} layer")]
    UnknownBin {
        scene: String,
        group: String,
        bin: String,
    },
    #[error("scene {scene}: no {group} cues available")]
    NoCues { scene: String, group: String },
    #[error("scene {0}: lights need at least two color cues (index 0 is reserved)")]
    LightColors(String),
    #[error("scene {scene}: flood light color {color:?} is not in the palette")]
    UnknownColor { scene: String, color: String },
    #[error("lights content list is empty")]
    NoLightContent,
    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
