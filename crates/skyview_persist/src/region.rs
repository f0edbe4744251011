use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use skyview_shared::chunk::ChunkData;
use skyview_shared::coords::ChunkPos;

use crate::compression::{compress_zstd, decompress_zstd, DEFAULT_ZSTD_LEVEL};

/// Chunks per region edge; a region file holds `REGION_SPAN * REGION_SPAN` columns.
pub const REGION_SPAN: i32 = 16;

#[derive(Serialize, Deserialize)]
struct RegionDisk {
    format_version: u32,
    chunks: Vec<(ChunkPos, ChunkData)>,
}

pub struct RegionFile {
    path: PathBuf,
    chunks: FxHashMap<ChunkPos, ChunkData>,
    dirty: bool,
}

impl RegionFile {
    pub const MAGIC: [u8; 4] = *b"SKVR";
    pub const FORMAT_VERSION: u32 = 1;

    pub fn region_coords(pos: ChunkPos) -> (i32, i32) {
        (pos.x.div_euclid(REGION_SPAN), pos.z.div_euclid(REGION_SPAN))
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Ok(Self {
                path,
                chunks: FxHashMap::default(),
                dirty: false,
            });
        }

        let bytes = fs::read(&path)?;
        let chunks = if bytes.is_empty() {
            FxHashMap::default()
        } else {
            Self::decode(&bytes)?.chunks.into_iter().collect()
        };

        debug!("Loaded region {:?} with {} chunks", path, chunks.len());
        Ok(Self {
            path,
            chunks,
            dirty: false,
        })
    }

    fn decode(bytes: &[u8]) -> io::Result<RegionDisk> {
        let payload = bytes
            .strip_prefix(&Self::MAGIC[..])
            .ok_or_else(|| invalid_data("invalid region file magic; expected SKVR"))?;

        let decompressed = decompress_zstd(payload)
            .map_err(|err| invalid_data(format!("failed to decompress region payload: {err}")))?;
        let disk: RegionDisk = bincode::deserialize(&decompressed)
            .map_err(|err| invalid_data(format!("failed to decode region payload: {err}")))?;

        if disk.format_version != Self::FORMAT_VERSION {
            return Err(invalid_data(format!(
                "unsupported region format version {}; expected {}",
                disk.format_version,
                Self::FORMAT_VERSION
            )));
        }
        Ok(disk)
    }

    pub fn save_chunk(&mut self, pos: ChunkPos, chunk: &ChunkData) {
        self.chunks.insert(pos, chunk.clone());
        self.dirty = true;
    }

    pub fn load_chunk(&self, pos: ChunkPos) -> Option<ChunkData> {
        self.chunks.get(&pos).cloned()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut chunks: Vec<(ChunkPos, ChunkData)> = self
            .chunks
            .iter()
            .map(|(pos, chunk)| (*pos, chunk.clone()))
            .collect();
        chunks.sort_by_key(|(pos, _)| *pos);

        let disk = RegionDisk {
            format_version: Self::FORMAT_VERSION,
            chunks,
        };
        let encoded = bincode::serialize(&disk)
            .map_err(|err| invalid_data(format!("failed to encode region payload: {err}")))?;
        let compressed = compress_zstd(&encoded, DEFAULT_ZSTD_LEVEL)?;

        let mut bytes = Vec::with_capacity(Self::MAGIC.len() + compressed.len());
        bytes.extend_from_slice(&Self::MAGIC);
        bytes.extend_from_slice(&compressed);
        fs::write(&self.path, bytes)?;

        self.dirty = false;
        Ok(())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}
