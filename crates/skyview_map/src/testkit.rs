use std::sync::{Arc, Mutex, RwLock};

use glam::{DVec3, IVec3};
use rustc_hash::{FxHashMap, FxHashSet};
use skyview_shared::block::BlockId;
use skyview_shared::chunk::ChunkData;
use skyview_shared::coords::{world_to_chunk, ChunkPos, CHUNK_WIDTH};
use skyview_shared::world::{BlockChange, WorldError, WorldSource};

pub fn layered(block: BlockId, top: u16) -> ChunkData {
    ChunkData::new_layered(block, top)
}

/// In-memory world with separate "stored" and "resident" chunk sets, failing
/// positions, and per-position read counters.
pub struct MemoryWorld {
    spawn: DVec3,
    stored: FxHashMap<ChunkPos, Arc<ChunkData>>,
    resident: RwLock<FxHashMap<ChunkPos, Arc<ChunkData>>>,
    failing: FxHashSet<ChunkPos>,
    reads: Mutex<FxHashMap<ChunkPos, usize>>,
}

impl MemoryWorld {
    pub fn new(spawn: DVec3) -> Self {
        Self {
            spawn,
            stored: FxHashMap::default(),
            resident: RwLock::new(FxHashMap::default()),
            failing: FxHashSet::default(),
            reads: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn spawn(&self) -> DVec3 {
        self.spawn
    }

    pub fn with_stored(self, pos: ChunkPos, chunk: ChunkData) -> Self {
        self.with_stored_arc(pos, Arc::new(chunk))
    }

    pub fn with_stored_arc(mut self, pos: ChunkPos, chunk: Arc<ChunkData>) -> Self {
        self.stored.insert(pos, chunk);
        self
    }

    pub fn with_resident_arc(self, pos: ChunkPos, chunk: Arc<ChunkData>) -> Self {
        self.resident.write().unwrap().insert(pos, chunk);
        self
    }

    pub fn with_failing(mut self, pos: ChunkPos) -> Self {
        self.failing.insert(pos);
        self
    }

    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }

    pub fn reads(&self, pos: ChunkPos) -> usize {
        self.reads.lock().unwrap().get(&pos).copied().unwrap_or(0)
    }

    pub fn max_reads_per_position(&self) -> usize {
        self.reads.lock().unwrap().values().copied().max().unwrap_or(0)
    }

    /// Makes a stored chunk resident, the way a world loads a chunk a player walks into.
    pub fn make_resident(&self, pos: ChunkPos) {
        if let Some(chunk) = self.stored.get(&pos) {
            self.resident
                .write()
                .unwrap()
                .entry(pos)
                .or_insert_with(|| Arc::clone(chunk));
        }
    }

    /// Edits a block, replacing the resident chunk's `Arc`. The returned change
    /// is what the world would report once the edit is committed.
    pub fn set_block(&self, world_pos: IVec3, block: BlockId) -> Option<BlockChange> {
        let (chunk_pos, local) = world_to_chunk(world_pos);
        let local = local?;
        self.make_resident(chunk_pos);

        let mut resident = self.resident.write().unwrap();
        let entry = resident.get_mut(&chunk_pos)?;
        let was_topmost = entry.highest_block(local.x, local.z) == Some(local.y);
        Arc::make_mut(entry).set(local, block);
        Some(BlockChange {
            position: world_pos,
            was_topmost,
        })
    }
}

impl WorldSource for MemoryWorld {
    fn spawn_position(&self) -> DVec3 {
        self.spawn
    }

    fn in_memory_snapshot(&self) -> FxHashMap<ChunkPos, Arc<ChunkData>> {
        self.resident.read().unwrap().clone()
    }

    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Arc<ChunkData>>, WorldError> {
        *self.reads.lock().unwrap().entry(pos).or_insert(0) += 1;
        if self.failing.contains(&pos) {
            return Err(WorldError::Corrupt {
                pos,
                reason: "simulated read failure".to_string(),
            });
        }
        Ok(self.stored.get(&pos).cloned())
    }

    fn highest_non_empty_y(&self, x: i32, z: i32) -> Option<i32> {
        let width = CHUNK_WIDTH as i32;
        let pos = ChunkPos::new(x.div_euclid(width), z.div_euclid(width));
        let chunk = self
            .resident
            .read()
            .unwrap()
            .get(&pos)
            .cloned()
            .or_else(|| self.stored.get(&pos).cloned())?;
        chunk
            .highest_block(x.rem_euclid(width) as u8, z.rem_euclid(width) as u8)
            .map(i32::from)
    }
}
