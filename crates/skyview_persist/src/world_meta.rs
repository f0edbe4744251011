use std::fs;
use std::io;
use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

pub const WORLD_META_FILE: &str = "world.toml";

/// World metadata stored next to the region directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(default = "default_spawn")]
    pub spawn: [f64; 3],
}

fn default_spawn() -> [f64; 3] {
    [0.0, 64.0, 0.0]
}

impl Default for WorldMeta {
    fn default() -> Self {
        Self {
            world_name: None,
            spawn: default_spawn(),
        }
    }
}

impl WorldMeta {
    pub fn spawn_position(&self) -> DVec3 {
        DVec3::from_array(self.spawn)
    }

    /// Saves world metadata to world.toml
    pub fn save(&self, world_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(world_dir)?;

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("failed to serialize world metadata: {e}"))
        })?;

        fs::write(world_dir.join(WORLD_META_FILE), toml_string)
    }

    /// Loads world metadata from world.toml, `None` if the file does not exist.
    pub fn load(world_dir: &Path) -> io::Result<Option<Self>> {
        let meta_path = world_dir.join(WORLD_META_FILE);
        if !meta_path.exists() {
            return Ok(None);
        }

        let toml_string = fs::read_to_string(meta_path)?;
        let meta = toml::from_str(&toml_string).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("failed to deserialize world metadata: {e}"))
        })?;

        Ok(Some(meta))
    }
}
