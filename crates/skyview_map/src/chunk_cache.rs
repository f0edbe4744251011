use std::sync::Arc;

use glam::DVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};
use skyview_shared::chunk::ChunkData;
use skyview_shared::coords::{chunk_containing, ChunkPos};
use skyview_shared::world::WorldSource;

/// A chunk as seen by the map. `revision` grows every time the entry is
/// replaced, so renders can tell which source they were built from.
#[derive(Clone, Debug)]
pub struct CachedChunk {
    pub data: Arc<ChunkData>,
    pub revision: u64,
}

/// Chunks discovered for this map, held as read snapshots of the world's data.
#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: FxHashMap<ChunkPos, CachedChunk>,
    next_revision: u64,
}

impl ChunkCache {
    /// Flood fills outward from the chunk containing `spawn` over edge-adjacent
    /// chunks, stopping along every branch where a chunk is missing or
    /// unreadable. Resident chunks are taken from the world's in-memory
    /// snapshot before falling back to a durable read.
    pub fn discover(world: &dyn WorldSource, spawn: DVec3) -> (ChunkPos, Self) {
        let center = chunk_containing(spawn);
        let resident = world.in_memory_snapshot();

        let mut cache = Self::default();
        let mut visited = FxHashSet::default();
        let mut pending = vec![center];
        let mut read_errors = 0usize;

        while let Some(pos) = pending.pop() {
            if !visited.insert(pos) {
                continue;
            }

            let chunk = match resident.get(&pos) {
                Some(chunk) => Arc::clone(chunk),
                None => match world.load_chunk(pos) {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("Failed to read chunk {:?} during discovery: {}", pos, err);
                        read_errors += 1;
                        continue;
                    }
                },
            };
            cache.insert(pos, chunk);

            pending.extend(
                pos.neighbors()
                    .into_iter()
                    .filter(|neighbor| !visited.contains(neighbor)),
            );
        }

        info!(
            "Discovered {} chunks around {:?} ({} visited, {} read errors)",
            cache.len(),
            center,
            visited.len(),
            read_errors
        );
        (center, cache)
    }

    /// Takes over every chunk in `snapshot`: entries already cached are
    /// replaced, chunks that became resident since discovery are added, and
    /// entries the snapshot does not mention are left alone. Returns how many
    /// entries changed.
    pub fn refresh(&mut self, snapshot: FxHashMap<ChunkPos, Arc<ChunkData>>) -> usize {
        let mut changed = 0;
        for (pos, chunk) in snapshot {
            if self.insert(pos, chunk) {
                changed += 1;
            }
        }
        changed
    }

    /// Stores `data` at `pos`. Returns `false` if the exact same snapshot was
    /// already cached there.
    pub fn insert(&mut self, pos: ChunkPos, data: Arc<ChunkData>) -> bool {
        if let Some(existing) = self.entries.get(&pos) {
            if Arc::ptr_eq(&existing.data, &data) {
                return false;
            }
        }
        self.next_revision += 1;
        self.entries.insert(
            pos,
            CachedChunk {
                data,
                revision: self.next_revision,
            },
        );
        true
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&CachedChunk> {
        self.entries.get(&pos)
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.entries.contains_key(&pos)
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

    /// Copies out every entry so rendering can proceed without the cache lock.
    pub fn entries(&self) -> Vec<(ChunkPos, CachedChunk)> {
        self.entries
            .iter()
            .map(|(pos, chunk)| (*pos, chunk.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::DVec3;
    use rustc_hash::{FxHashMap, FxHashSet};
    use skyview_shared::block::BlockId;
    use skyview_shared::chunk::ChunkData;
    use skyview_shared::coords::ChunkPos;

    use super::ChunkCache;
    use crate::testkit::{layered, MemoryWorld};

    fn spawn_in(pos: ChunkPos) -> DVec3 {
        DVec3::new(f64::from(pos.x * 16) + 8.0, 64.0, f64::from(pos.z * 16) + 8.0)
    }

    #[test]
    fn lone_spawn_chunk_is_the_only_discovery() {
        let world = MemoryWorld::new(spawn_in(ChunkPos::new(0, 0)))
            .with_stored(ChunkPos::new(0, 0), layered(BlockId::LOAM, 10));

        let (center, cache) = ChunkCache::discover(&world, world.spawn());
        assert_eq!(center, ChunkPos::new(0, 0));
        assert_eq!(cache.positions(), vec![ChunkPos::new(0, 0)]);
    }

    #[test]
    fn discovery_follows_edges_not_corners() {
        let world = MemoryWorld::new(spawn_in(ChunkPos::new(0, 0)))
            .with_stored(ChunkPos::new(0, 0), layered(BlockId::LOAM, 10))
            .with_stored(ChunkPos::new(0, 1), layered(BlockId::LOAM, 10))
            .with_stored(ChunkPos::new(1, 0), layered(BlockId::LOAM, 10))
            .with_stored(ChunkPos::new(2, 2), layered(BlockId::LOAM, 10));

        let (_, cache) = ChunkCache::discover(&world, world.spawn());
        let found: FxHashSet<ChunkPos> = cache.positions().into_iter().collect();
        let expected: FxHashSet<ChunkPos> =
            [ChunkPos::new(0, 0), ChunkPos::new(0, 1), ChunkPos::new(1, 0)]
                .into_iter()
                .collect();
        assert_eq!(found, expected);
        assert!(!cache.contains(ChunkPos::new(1, 1)));
        assert!(!cache.contains(ChunkPos::new(2, 2)));
    }

    #[test]
    fn no_position_is_read_twice_even_around_cycles() {
        let mut world = MemoryWorld::new(spawn_in(ChunkPos::new(0, 0)));
        // A ring of chunks around a hole forms a cycle in the neighbour graph.
        for x in -3i32..=3 {
            for z in -3i32..=3 {
                if x.abs() == 3 || z.abs() == 3 || (x, z) == (0, 0) || x == 0 {
                    world = world.with_stored(ChunkPos::new(x, z), layered(BlockId::GRANITE, 1));
                }
            }
        }

        let (_, cache) = ChunkCache::discover(&world, world.spawn());
        assert!(world.max_reads_per_position() <= 1);
        assert_eq!(cache.len(), world.stored_count());
    }

    #[test]
    fn large_connected_worlds_do_not_recurse() {
        let mut world = MemoryWorld::new(spawn_in(ChunkPos::new(0, 0)));
        let shared = Arc::new(layered(BlockId::DUNE_SAND, 0));
        for x in 0..200 {
            for z in 0..50 {
                world = world.with_stored_arc(ChunkPos::new(x, z), Arc::clone(&shared));
            }
        }

        let (_, cache) = ChunkCache::discover(&world, world.spawn());
        assert_eq!(cache.len(), 200 * 50);
    }

    #[test]
    fn resident_chunks_are_preferred_over_storage() {
        let resident = Arc::new(layered(BlockId::SNOWCAP, 90));
        let world = MemoryWorld::new(spawn_in(ChunkPos::new(0, 0)))
            .with_stored(ChunkPos::new(0, 0), layered(BlockId::LOAM, 10))
            .with_resident_arc(ChunkPos::new(0, 0), Arc::clone(&resident));

        let (_, cache) = ChunkCache::discover(&world, world.spawn());
        let cached = cache.get(ChunkPos::new(0, 0)).expect("spawn chunk");
        assert!(Arc::ptr_eq(&cached.data, &resident));
        assert_eq!(world.reads(ChunkPos::new(0, 0)), 0);
    }

    #[test]
    fn read_errors_stop_expansion_without_failing() {
        let world = MemoryWorld::new(spawn_in(ChunkPos::new(0, 0)))
            .with_stored(ChunkPos::new(0, 0), layered(BlockId::LOAM, 10))
            .with_stored(ChunkPos::new(1, 0), layered(BlockId::LOAM, 10))
            .with_stored(ChunkPos::new(2, 0), layered(BlockId::LOAM, 10))
            .with_failing(ChunkPos::new(1, 0));

        let (_, cache) = ChunkCache::discover(&world, world.spawn());
        assert_eq!(cache.positions(), vec![ChunkPos::new(0, 0)]);
    }

    #[test]
    fn refresh_replaces_and_adds_but_never_removes() {
        let mut cache = ChunkCache::default();
        let original = Arc::new(layered(BlockId::LOAM, 10));
        cache.insert(ChunkPos::new(0, 0), Arc::clone(&original));
        cache.insert(ChunkPos::new(5, 5), Arc::new(ChunkData::new_empty()));
        let untouched_revision = cache.get(ChunkPos::new(5, 5)).expect("entry").revision;

        let mut snapshot = FxHashMap::default();
        let edited = Arc::new(layered(BlockId::GRANITE, 12));
        snapshot.insert(ChunkPos::new(0, 0), Arc::clone(&edited));
        snapshot.insert(ChunkPos::new(0, 1), Arc::new(layered(BlockId::LOAM, 3)));

        assert_eq!(cache.refresh(snapshot), 2);
        assert_eq!(cache.len(), 3);
        assert!(Arc::ptr_eq(&cache.get(ChunkPos::new(0, 0)).expect("entry").data, &edited));
        assert_eq!(
            cache.get(ChunkPos::new(5, 5)).expect("entry").revision,
            untouched_revision
        );
    }

    #[test]
    fn refreshing_with_the_same_snapshot_is_a_no_op() {
        let mut cache = ChunkCache::default();
        let chunk = Arc::new(layered(BlockId::LOAM, 10));
        cache.insert(ChunkPos::new(0, 0), Arc::clone(&chunk));
        let revision = cache.get(ChunkPos::new(0, 0)).expect("entry").revision;

        let snapshot: FxHashMap<_, _> = [(ChunkPos::new(0, 0), chunk)].into_iter().collect();
        assert_eq!(cache.refresh(snapshot), 0);
        assert_eq!(cache.get(ChunkPos::new(0, 0)).expect("entry").revision, revision);
    }
}
