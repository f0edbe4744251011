use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use glam::{DVec3, IVec3};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};
use skyview_core::events::EventSender;
use skyview_shared::block::BlockId;
use skyview_shared::chunk::ChunkData;
use skyview_shared::coords::{world_to_chunk, ChunkPos, CHUNK_WIDTH};
use skyview_shared::world::{BlockChange, WorldError, WorldEvent, WorldSource};

use crate::region::RegionFile;
use crate::world_meta::WorldMeta;

/// A world backed by region files on disk, with a set of chunks kept resident
/// in memory. Edits replace the resident chunk's `Arc`, so snapshots handed
/// out earlier stay untouched.
pub struct RegionWorld {
    world_dir: PathBuf,
    meta: WorldMeta,
    regions: Mutex<FxHashMap<(i32, i32), RegionFile>>,
    loaded: RwLock<FxHashMap<ChunkPos, Arc<ChunkData>>>,
    dirty: Mutex<FxHashSet<ChunkPos>>,
    events: Mutex<Option<EventSender<WorldEvent>>>,
}

impl RegionWorld {
    pub fn open(world_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(world_dir.join("region"))?;
        let meta = match WorldMeta::load(world_dir)? {
            Some(meta) => meta,
            None => {
                let meta = WorldMeta::default();
                meta.save(world_dir)?;
                meta
            }
        };

        info!(
            "Opened world {} (spawn {:?})",
            world_dir.display(),
            meta.spawn
        );
        Ok(Self {
            world_dir: world_dir.to_path_buf(),
            meta,
            regions: Mutex::new(FxHashMap::default()),
            loaded: RwLock::new(FxHashMap::default()),
            dirty: Mutex::new(FxHashSet::default()),
            events: Mutex::new(None),
        })
    }

    /// Block edits and player updates are reported on `events` from now on.
    pub fn with_events(self, events: EventSender<WorldEvent>) -> Self {
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
        self
    }

    /// Stops reporting events and drops the sender, so listeners see the
    /// stream end.
    pub fn close_events(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn meta(&self) -> &WorldMeta {
        &self.meta
    }

    pub fn resident_count(&self) -> usize {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Makes `chunk` resident at `pos`, replacing whatever was there.
    pub fn insert_chunk(&self, pos: ChunkPos, chunk: ChunkData) {
        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pos, Arc::new(chunk));
        self.mark_dirty(pos);
    }

    /// Loads a stored chunk into memory. Returns `false` when it does not exist.
    pub fn load_resident(&self, pos: ChunkPos) -> io::Result<bool> {
        if self.loaded.read().unwrap_or_else(PoisonError::into_inner).contains_key(&pos) {
            return Ok(true);
        }
        let Some(chunk) = self.read_stored(pos)? else {
            return Ok(false);
        };
        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(pos)
            .or_insert_with(|| Arc::new(chunk));
        Ok(true)
    }

    /// Drops a chunk from memory, staging it for the next save if it was edited.
    pub fn unload_chunk(&self, pos: ChunkPos) -> io::Result<()> {
        let removed = self
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pos);
        let Some(chunk) = removed else {
            return Ok(());
        };
        if self.dirty.lock().unwrap_or_else(PoisonError::into_inner).remove(&pos) {
            self.with_region(pos, |region| {
                region.save_chunk(pos, &chunk);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Applies a block edit to a resident (or stored) chunk and, once the edit
    /// is committed, reports it. Returns the previous block, or `None` when the
    /// position lies outside every existing chunk.
    pub fn set_block(&self, world_pos: IVec3, block: BlockId) -> io::Result<Option<BlockId>> {
        let (chunk_pos, local) = world_to_chunk(world_pos);
        let Some(local) = local else {
            return Ok(None);
        };
        if !self.load_resident(chunk_pos)? {
            return Ok(None);
        }

        let (previous, change) = {
            let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
            let Some(entry) = loaded.get_mut(&chunk_pos) else {
                return Ok(None);
            };
            let was_topmost = entry.highest_block(local.x, local.z) == Some(local.y);
            let chunk = Arc::make_mut(entry);
            let previous = chunk.get(local);
            chunk.set(local, block);
            (
                previous,
                BlockChange {
                    position: world_pos,
                    was_topmost,
                },
            )
        };
        self.mark_dirty(chunk_pos);
        self.emit(WorldEvent::BlockChanged(change));
        Ok(Some(previous))
    }

    pub fn move_player(&self, name: &str, position: DVec3) {
        self.emit(WorldEvent::PlayerMoved {
            name: name.to_string(),
            position,
        });
    }

    pub fn remove_player(&self, name: &str) {
        self.emit(WorldEvent::PlayerLeft {
            name: name.to_string(),
        });
    }

    /// Writes every edited resident chunk to its region file.
    pub fn save_dirty_chunks(&self) -> io::Result<usize> {
        let dirty: Vec<ChunkPos> = self
            .dirty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        let staged: Vec<(ChunkPos, Arc<ChunkData>)> = {
            let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
            dirty
                .iter()
                .filter_map(|pos| loaded.get(pos).map(|chunk| (*pos, Arc::clone(chunk))))
                .collect()
        };

        for (pos, chunk) in &staged {
            self.with_region(*pos, |region| {
                region.save_chunk(*pos, chunk);
                Ok(())
            })?;
        }

        let mut regions = self.regions.lock().unwrap_or_else(PoisonError::into_inner);
        for region in regions.values_mut() {
            if let Err(err) = region.flush() {
                warn!("Failed to flush region file: {}", err);
                return Err(err);
            }
        }
        debug!("Saved {} dirty chunks", staged.len());
        Ok(staged.len())
    }

    fn read_stored(&self, pos: ChunkPos) -> io::Result<Option<ChunkData>> {
        self.with_region(pos, |region| Ok(region.load_chunk(pos)))
    }

    fn with_region<T>(
        &self,
        pos: ChunkPos,
        op: impl FnOnce(&mut RegionFile) -> io::Result<T>,
    ) -> io::Result<T> {
        let coords = RegionFile::region_coords(pos);
        let mut regions = self.regions.lock().unwrap_or_else(PoisonError::into_inner);
        if !regions.contains_key(&coords) {
            let region = RegionFile::open(self.region_path(coords))?;
            regions.insert(coords, region);
        }
        let region = regions.get_mut(&coords).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "failed to access cached region file")
        })?;
        op(region)
    }

    fn region_path(&self, (rx, rz): (i32, i32)) -> PathBuf {
        self.world_dir.join("region").join(format!("r.{rx}.{rz}.svr"))
    }

    fn mark_dirty(&self, pos: ChunkPos) {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner).insert(pos);
    }

    fn emit(&self, event: WorldEvent) {
        if let Some(events) = self.events.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            if events.send(event).is_err() {
                debug!("World event dropped: no listener");
            }
        }
    }
}

impl WorldSource for RegionWorld {
    fn spawn_position(&self) -> DVec3 {
        self.meta.spawn_position()
    }

    fn in_memory_snapshot(&self) -> FxHashMap<ChunkPos, Arc<ChunkData>> {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Arc<ChunkData>>, WorldError> {
        if let Some(chunk) = self.loaded.read().unwrap_or_else(PoisonError::into_inner).get(&pos) {
            return Ok(Some(Arc::clone(chunk)));
        }
        Ok(self.read_stored(pos)?.map(Arc::new))
    }

    fn highest_non_empty_y(&self, x: i32, z: i32) -> Option<i32> {
        let width = CHUNK_WIDTH as i32;
        let pos = ChunkPos::new(x.div_euclid(width), z.div_euclid(width));
        let (local_x, local_z) = (x.rem_euclid(width) as u8, z.rem_euclid(width) as u8);
        let chunk = match self.load_chunk(pos) {
            Ok(chunk) => chunk?,
            Err(err) => {
                warn!("Failed to read chunk {:?} for height lookup: {}", pos, err);
                return None;
            }
        };
        chunk.highest_block(local_x, local_z).map(i32::from)
    }
}
