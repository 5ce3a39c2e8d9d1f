use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::catalog::{ProductCatalog, ProductFamily};
use crate::error::{Error, Result};
use crate::features::FACE_MESH_LANDMARKS;
use crate::types::{AdjustmentKind, AdjustmentState};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assets: AssetConfig,
    pub detector: DetectorConfig,
    pub catalog: ProductCatalog,
    pub defaults: AdjustmentState,
    pub surface: SurfaceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding `<id>.png` product images.
    pub root: PathBuf,
    /// Ids loaded before the first frame.
    pub preload: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Landmarks per face produced by the detector.
    pub landmark_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("images"),
            preload: ProductCatalog::default().ids().map(str::to_string).collect(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            landmark_count: FACE_MESH_LANDMARKS,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "face-tryon.json";

    /// Load from `path`. A missing or unparsable file yields the defaults;
    /// missing fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "configuration file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error parsing configuration, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Startup checks: every family's index table fits the detector, the
    /// surface is non-empty and default adjustments are usable.
    pub fn validate(&self) -> Result<()> {
        for family in ProductFamily::ALL {
            family.indices().validate(self.detector.landmark_count)?;
        }
        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "surface must be non-empty, got {}x{}",
                self.surface.width, self.surface.height
            )));
        }
        let mut probe = AdjustmentState::default();
        probe.set(AdjustmentKind::Scale, self.defaults.scale)?;
        probe.set(AdjustmentKind::YOffset, self.defaults.y_offset)?;
        probe.set(AdjustmentKind::Rotation, self.defaults.rotation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.detector.landmark_count, 468);
        assert_eq!(config.assets.preload.len(), config.catalog.entries.len());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"surface": {"width": 320}, "defaults": {"yOffset": 4.0}, "log": {"filter": "debug"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.surface.width, 320);
        assert_eq!(config.surface.height, 480);
        assert_eq!(config.defaults.y_offset, 4.0);
        assert_eq!(config.defaults.scale, 1.0);
        assert_eq!(config.log.filter, "debug");
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn save_then_load_preserves_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.catalog.entries.retain(|e| e.id == "hat1");
        config.assets.preload = vec!["hat1".into()];
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.catalog.ids().collect::<Vec<_>>(), vec!["hat1"]);
        assert_eq!(loaded, config);
    }

    #[test]
    fn short_detector_fails_validation() {
        let mut config = AppConfig::default();
        config.detector.landmark_count = 200;
        match config.validate() {
            Err(Error::InvalidIndexGroup { landmark_count, .. }) => assert_eq!(landmark_count, 200),
            other => panic!("expected InvalidIndexGroup, got {:?}", other),
        }
    }

    #[test]
    fn empty_surface_fails_validation() {
        let mut config = AppConfig::default();
        config.surface.height = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn bad_default_scale_fails_validation() {
        let mut config = AppConfig::default();
        config.defaults.scale = 0.0;
        assert!(matches!(config.validate(), Err(Error::InvalidAdjustment(_))));
    }
}
