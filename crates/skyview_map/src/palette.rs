use std::fs;
use std::path::Path;

use image::Rgba;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::warn;
use skyview_shared::block::BlockId;

use crate::error::PaletteError;

pub const DEFAULT_BACKGROUND: Rgba<u8> = Rgba([16, 16, 16, 255]);

#[derive(Debug, Deserialize)]
struct PaletteFile {
    #[serde(default = "default_background")]
    background: [u8; 4],
    #[serde(default)]
    entries: Vec<PaletteEntry>,
}

#[derive(Debug, Deserialize)]
struct PaletteEntry {
    block: u16,
    color: [u8; 4],
}

fn default_background() -> [u8; 4] {
    DEFAULT_BACKGROUND.0
}

/// Static lookup from block id to the colour drawn for it on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPalette {
    background: Rgba<u8>,
    colors: FxHashMap<BlockId, Rgba<u8>>,
}

impl MaterialPalette {
    pub fn new(background: Rgba<u8>) -> Self {
        Self {
            background,
            colors: FxHashMap::default(),
        }
    }

    pub fn with_color(mut self, block: BlockId, color: Rgba<u8>) -> Self {
        self.insert(block, color);
        self
    }

    /// Air stays uncoloured no matter what is configured for it.
    pub fn insert(&mut self, block: BlockId, color: Rgba<u8>) {
        if block.is_air() {
            return;
        }
        self.colors.insert(block, color);
    }

    pub fn color(&self, block: BlockId) -> Option<Rgba<u8>> {
        self.colors.get(&block).copied()
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn from_toml_str(src: &str) -> Result<Self, PaletteError> {
        let file: PaletteFile = toml::from_str(src)?;
        let mut palette = Self::new(Rgba(file.background));
        for entry in file.entries {
            let block = BlockId(entry.block);
            if block.name().is_none() {
                warn!("Palette entry for unregistered block id {}", entry.block);
            }
            palette.insert(block, Rgba(entry.color));
        }
        Ok(palette)
    }

    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let src = fs::read_to_string(path).map_err(|source| PaletteError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }
}

impl Default for MaterialPalette {
    fn default() -> Self {
        [
            (BlockId::BEDSTONE, [48, 48, 52, 255]),
            (BlockId::GRANITE, [125, 125, 125, 255]),
            (BlockId::LOAM, [134, 96, 67, 255]),
            (BlockId::VERDANT_TURF, [89, 145, 52, 255]),
            (BlockId::DUNE_SAND, [219, 207, 163, 255]),
            (BlockId::TIMBER_LOG, [102, 81, 51, 255]),
            (BlockId::HEWN_PLANK, [162, 130, 78, 255]),
            (BlockId::CANOPY_LEAVES, [48, 110, 36, 255]),
            (BlockId::STILL_WATER, [52, 88, 196, 255]),
            (BlockId::RUBBLESTONE, [110, 110, 110, 255]),
            (BlockId::GRAVEL_BED, [136, 126, 126, 255]),
            (BlockId::SNOWCAP, [240, 251, 251, 255]),
            (BlockId::LAVA_SOURCE, [207, 92, 20, 255]),
            (BlockId::OBSIDIAN, [20, 18, 29, 255]),
        ]
        .into_iter()
        .fold(Self::new(DEFAULT_BACKGROUND), |palette, (block, rgba)| {
            palette.with_color(block, Rgba(rgba))
        })
    }
}
