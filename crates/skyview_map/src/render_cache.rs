use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use skyview_core::jobs::JobSystem;
use skyview_shared::coords::ChunkPos;

use crate::chunk_cache::CachedChunk;
use crate::palette::MaterialPalette;
use crate::rasterizer::render_chunk;

/// A chunk image at a given scale, tagged with the chunk revision it was
/// rendered from.
#[derive(Clone, Debug)]
pub struct RenderedChunk {
    pub image: Arc<RgbaImage>,
    pub scale: u32,
    pub revision: u64,
}

/// Scaled chunk images keyed by chunk position. This is what gets drawn.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: FxHashMap<ChunkPos, RenderedChunk>,
}

pub fn render_one(scale: u32, chunk: &CachedChunk, palette: &MaterialPalette) -> RenderedChunk {
    RenderedChunk {
        image: Arc::new(render_chunk(&chunk.data, palette, scale)),
        scale,
        revision: chunk.revision,
    }
}

/// Renders every chunk from scratch, spread over the job system's threads.
pub fn render_all(
    scale: u32,
    chunks: &[(ChunkPos, CachedChunk)],
    palette: &MaterialPalette,
    jobs: &JobSystem,
) -> FxHashMap<ChunkPos, RenderedChunk> {
    jobs.install(|| {
        chunks
            .par_iter()
            .map(|(pos, chunk)| (*pos, render_one(scale, chunk, palette)))
            .collect::<Vec<_>>()
    })
    .into_iter()
    .collect()
}

impl RenderCache {
    pub fn insert(&mut self, pos: ChunkPos, rendered: RenderedChunk) {
        self.entries.insert(pos, rendered);
    }

    /// Swaps in a full render made at `scale`. Entries rendered at `scale`
    /// from a newer chunk revision than the full render saw, or for chunks it
    /// did not see at all, were written by a targeted invalidation in the
    /// meantime and are kept.
    pub fn replace_all(&mut self, mut rendered: FxHashMap<ChunkPos, RenderedChunk>, scale: u32) {
        for (pos, existing) in self.entries.drain() {
            if existing.scale != scale {
                continue;
            }
            let newer = rendered
                .get(&pos)
                .map_or(true, |fresh| existing.revision > fresh.revision);
            if newer {
                rendered.insert(pos, existing);
            }
        }
        self.entries = rendered;
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&RenderedChunk> {
        self.entries.get(&pos)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positions(&self) -> Vec<ChunkPos> {
        self.entries.keys().copied().collect()
    }

    /// Number of entries rendered at some scale other than `scale`.
    pub fn stale_count(&self, scale: u32) -> usize {
        self.entries
            .values()
            .filter(|rendered| rendered.scale != scale)
            .count()
    }

    /// Image handles for every entry that is current at `scale`.
    pub fn drawable(&self, scale: u32) -> Vec<(ChunkPos, Arc<RgbaImage>)> {
        self.entries
            .iter()
            .filter(|(_, rendered)| rendered.scale == scale)
            .map(|(pos, rendered)| (*pos, Arc::clone(&rendered.image)))
            .collect()
    }
}
