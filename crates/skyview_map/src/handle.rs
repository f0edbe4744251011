use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use glam::DVec3;
use tracing::{debug, info};
use skyview_core::jobs::JobSystem;
use skyview_shared::coords::{world_to_chunk, ChunkPos};
use skyview_shared::world::{BlockChange, WorldEvent, WorldSource};

use crate::chunk_cache::ChunkCache;
use crate::lock;
use crate::palette::MaterialPalette;
use crate::players::PlayerTracker;
use crate::render_cache::{render_all, render_one, RenderCache, RenderedChunk};

/// State shared between the frame loop and notification handlers.
///
/// Lock order: `chunks` before `renders`, wherever both are held. The player
/// map has its own lock and is never taken together with the other two.
pub(crate) struct MapState {
    pub(crate) world: Arc<dyn WorldSource>,
    pub(crate) palette: MaterialPalette,
    pub(crate) chunks: Mutex<ChunkCache>,
    pub(crate) renders: Mutex<RenderCache>,
    pub(crate) players: PlayerTracker,
    pub(crate) scale: AtomicU32,
    pub(crate) jobs: Arc<JobSystem>,
}

impl MapState {
    pub(crate) fn new(
        world: Arc<dyn WorldSource>,
        palette: MaterialPalette,
        chunks: ChunkCache,
        scale: u32,
        jobs: Arc<JobSystem>,
    ) -> Self {
        Self {
            world,
            palette,
            chunks: Mutex::new(chunks),
            renders: Mutex::new(RenderCache::default()),
            players: PlayerTracker::default(),
            scale: AtomicU32::new(scale),
            jobs,
        }
    }

    pub(crate) fn scale(&self) -> u32 {
        self.scale.load(Ordering::Acquire)
    }

    pub(crate) fn set_scale(&self, scale: u32) {
        self.scale.store(scale, Ordering::Release);
    }

    /// Pulls the world's resident chunks into the cache.
    pub(crate) fn refresh_chunks(&self) -> usize {
        let snapshot = self.world.in_memory_snapshot();
        lock(&self.chunks).refresh(snapshot)
    }

    /// Re-renders every cached chunk at `scale`. Neither lock is held while
    /// images are being produced.
    pub(crate) fn rerender_all(&self, scale: u32) {
        let started = Instant::now();
        let chunks = lock(&self.chunks).entries();
        let rendered = render_all(scale, &chunks, &self.palette, &self.jobs);
        lock(&self.renders).replace_all(rendered, scale);
        info!(
            "Rendered {} chunks at scale {} in {:.1?}",
            chunks.len(),
            scale,
            started.elapsed()
        );
    }

    /// Refreshes the cache from the world and re-renders the chunk at `pos`
    /// alone. Returns `false` when the map does not know that chunk.
    pub(crate) fn invalidate(&self, pos: ChunkPos) -> bool {
        let snapshot = self.world.in_memory_snapshot();

        let mut chunks = lock(&self.chunks);
        let mut renders = lock(&self.renders);
        chunks.refresh(snapshot);
        let Some(cached) = chunks.get(pos) else {
            debug!("Ignoring invalidation of undiscovered chunk {:?}", pos);
            return false;
        };
        let scale = self.scale();
        renders.insert(pos, render_one(scale, cached, &self.palette));
        debug!("Re-rendered chunk {:?} at scale {}", pos, scale);
        true
    }
}

/// Cloneable entry point for world notifications; safe to call from any thread.
#[derive(Clone)]
pub struct MapHandle {
    pub(crate) state: Arc<MapState>,
}

impl MapHandle {
    /// Re-renders the chunk holding `change` if the edit touched its visible
    /// surface: the edited block was on top before the edit, or is on top now.
    pub fn on_block_changed(&self, change: BlockChange) -> bool {
        let position = change.position;
        let topmost_now =
            self.state.world.highest_non_empty_y(position.x, position.z) == Some(position.y);
        if !change.was_topmost && !topmost_now {
            return false;
        }
        let (chunk_pos, _) = world_to_chunk(position);
        self.state.invalidate(chunk_pos)
    }

    pub fn on_player_moved(&self, name: &str, position: DVec3) {
        self.state.players.set_position(name, position);
    }

    pub fn on_player_left(&self, name: &str) {
        if self.state.players.remove(name).is_some() {
            debug!("Player {} left the map", name);
        }
    }

    pub fn apply(&self, event: WorldEvent) {
        match event {
            WorldEvent::BlockChanged(change) => {
                self.on_block_changed(change);
            }
            WorldEvent::PlayerMoved { name, position } => self.on_player_moved(&name, position),
            WorldEvent::PlayerLeft { name } => self.on_player_left(&name),
        }
    }

    /// Refreshes and re-renders one chunk regardless of what changed in it.
    pub fn invalidate_chunk(&self, pos: ChunkPos) -> bool {
        self.state.invalidate(pos)
    }

    pub fn chunk_count(&self) -> usize {
        lock(&self.state.chunks).len()
    }

    pub fn render_count(&self) -> usize {
        lock(&self.state.renders).len()
    }

    pub fn rendered(&self, pos: ChunkPos) -> Option<RenderedChunk> {
        lock(&self.state.renders).get(pos).cloned()
    }

    pub fn player(&self, name: &str) -> Option<DVec3> {
        self.state.players.get(name)
    }

    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }
}
