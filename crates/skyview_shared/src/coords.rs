use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

pub const CHUNK_WIDTH: usize = 16;
pub const SECTION_HEIGHT: usize = 16;
pub const SECTION_COUNT: usize = 16;
pub const WORLD_HEIGHT: usize = SECTION_HEIGHT * SECTION_COUNT;
pub const SECTION_VOLUME: usize = CHUNK_WIDTH * CHUNK_WIDTH * SECTION_HEIGHT;

/// Column of terrain in the world grid, addressed on the horizontal plane only.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u16,
    pub z: u8,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The four edge-sharing neighbours, in +z, -z, +x, -x order.
    pub fn neighbors(self) -> [ChunkPos; 4] {
        [
            ChunkPos::new(self.x, self.z + 1),
            ChunkPos::new(self.x, self.z - 1),
            ChunkPos::new(self.x + 1, self.z),
            ChunkPos::new(self.x - 1, self.z),
        ]
    }
}

fn div_rem_floor(value: i32, divisor: i32) -> (i32, i32) {
    (value.div_euclid(divisor), value.rem_euclid(divisor))
}

/// Splits a block position into its chunk column and the offset inside it.
/// Returns `None` for the local part when `y` lies outside the world height.
pub fn world_to_chunk(world_pos: IVec3) -> (ChunkPos, Option<LocalPos>) {
    let width = CHUNK_WIDTH as i32;

    let (chunk_x, local_x) = div_rem_floor(world_pos.x, width);
    let (chunk_z, local_z) = div_rem_floor(world_pos.z, width);
    let local = u16::try_from(world_pos.y)
        .ok()
        .filter(|y| usize::from(*y) < WORLD_HEIGHT)
        .map(|y| LocalPos {
            x: local_x as u8,
            y,
            z: local_z as u8,
        });

    (ChunkPos::new(chunk_x, chunk_z), local)
}

/// Chunk column containing a continuous world position, such as a spawn point.
pub fn chunk_containing(position: DVec3) -> ChunkPos {
    let width = CHUNK_WIDTH as i32;
    ChunkPos::new(
        (position.x.floor() as i32).div_euclid(width),
        (position.z.floor() as i32).div_euclid(width),
    )
}

/// Index of a block inside one section; `y` is taken relative to the section floor.
pub fn section_index(x: u8, y_in_section: u8, z: u8) -> usize {
    usize::from(x)
        + usize::from(z) * CHUNK_WIDTH
        + usize::from(y_in_section) * CHUNK_WIDTH * CHUNK_WIDTH
}
