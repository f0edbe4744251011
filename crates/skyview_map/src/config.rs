use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PaletteError};
use crate::palette::MaterialPalette;

pub const CONFIG_FILE: &str = "skyview.toml";

/// Map view settings, read from `skyview.toml`. Keys that are left out keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Screen pixels per block, at least 1.
    pub scale: u32,
    /// Screen pixels panned per frame while a direction is held.
    pub drift: f64,
    /// Palette file; the built-in palette is used when absent.
    pub palette: Option<PathBuf>,
    pub marker_color: [u8; 4],
    pub frame_rate: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            scale: 4,
            drift: 4.0,
            palette: None,
            marker_color: [237, 69, 49, 255],
            frame_rate: 60,
        }
    }
}

impl MapConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`, `None` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let src = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src).map(Some)
    }

    pub fn load_palette(&self) -> Result<MaterialPalette, PaletteError> {
        match &self.palette {
            Some(path) => MaterialPalette::load(path),
            None => Ok(MaterialPalette::default()),
        }
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scale == 0 {
            return Err(ConfigError::Invalid("scale must be at least 1".to_string()));
        }
        if !self.drift.is_finite() || self.drift < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "drift must be a non-negative number, got {}",
                self.drift
            )));
        }
        Ok(())
    }
}
