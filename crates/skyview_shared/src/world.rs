use std::io;
use std::sync::Arc;

use glam::{DVec3, IVec3};
use rustc_hash::FxHashMap;

use crate::chunk::ChunkData;
use crate::coords::ChunkPos;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("chunk storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("chunk {pos:?} is corrupt: {reason}")]
    Corrupt { pos: ChunkPos, reason: String },
}

/// Everything the map needs from the world that owns the terrain.
///
/// Chunk data handed out here is a read snapshot: callers share the `Arc`
/// and never mutate through it.
pub trait WorldSource: Send + Sync {
    fn spawn_position(&self) -> DVec3;

    /// Chunks currently resident in memory.
    fn in_memory_snapshot(&self) -> FxHashMap<ChunkPos, Arc<ChunkData>>;

    /// Durable read. `Ok(None)` means the chunk has never existed.
    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Arc<ChunkData>>, WorldError>;

    /// Height of the topmost occupied block of the column containing (`x`, `z`).
    fn highest_non_empty_y(&self, x: i32, z: i32) -> Option<i32>;
}

/// A single block edit. Emitted only once the edit is visible through
/// [`WorldSource::in_memory_snapshot`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockChange {
    pub position: IVec3,
    /// Whether the edited block was the topmost one of its column before the edit.
    pub was_topmost: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    BlockChanged(BlockChange),
    PlayerMoved { name: String, position: DVec3 },
    PlayerLeft { name: String },
}
