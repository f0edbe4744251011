use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::block::BlockId;
use crate::coords::{section_index, LocalPos, CHUNK_WIDTH, SECTION_COUNT, SECTION_HEIGHT, SECTION_VOLUME};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSection {
    blocks: Box<[BlockId; SECTION_VOLUME]>,
}

impl ChunkSection {
    fn new_empty() -> Self {
        Self {
            blocks: Box::new([BlockId::AIR; SECTION_VOLUME]),
        }
    }

    fn is_all_air(&self) -> bool {
        self.blocks.iter().all(|block| block.is_air())
    }
}

/// Terrain for one 16x16 column of the world. Sections that hold nothing but
/// air are not stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkData {
    sections: [Option<ChunkSection>; SECTION_COUNT],
}

impl ChunkData {
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Builds a chunk whose every column is `block` from y = 0 up to and
    /// including `top`.
    pub fn new_layered(block: BlockId, top: u16) -> Self {
        let mut chunk = Self::new_empty();
        for y in 0..=top {
            for z in 0..CHUNK_WIDTH as u8 {
                for x in 0..CHUNK_WIDTH as u8 {
                    chunk.set(LocalPos { x, y, z }, block);
                }
            }
        }
        chunk
    }

    pub fn get(&self, local: LocalPos) -> BlockId {
        let (section, y_in_section) = split_height(local.y);
        self.sections
            .get(section)
            .and_then(Option::as_ref)
            .map_or(BlockId::AIR, |section| {
                section.blocks[section_index(local.x, y_in_section, local.z)]
            })
    }

    pub fn set(&mut self, local: LocalPos, block: BlockId) {
        let (section, y_in_section) = split_height(local.y);
        let Some(slot) = self.sections.get_mut(section) else {
            return;
        };

        if slot.is_none() && block.is_air() {
            return;
        }
        let data = slot.get_or_insert_with(ChunkSection::new_empty);
        data.blocks[section_index(local.x, y_in_section, local.z)] = block;

        if block.is_air() && data.is_all_air() {
            *slot = None;
        }
    }

    /// Height of the topmost non-air block in the column at (`x`, `z`).
    pub fn highest_block(&self, x: u8, z: u8) -> Option<u16> {
        self.surface_block(x, z).map(|(y, _)| y)
    }

    /// Topmost non-air block in the column at (`x`, `z`) together with its height.
    pub fn surface_block(&self, x: u8, z: u8) -> Option<(u16, BlockId)> {
        for (section_y, section) in self.sections.iter().enumerate().rev() {
            let Some(section) = section else {
                continue;
            };
            for y_in_section in (0..SECTION_HEIGHT as u8).rev() {
                let block = section.blocks[section_index(x, y_in_section, z)];
                if !block.is_air() {
                    let y = (section_y * SECTION_HEIGHT) as u16 + u16::from(y_in_section);
                    return Some((y, block));
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Option::is_none)
    }

    pub fn stored_sections(&self) -> usize {
        self.sections.iter().filter(|section| section.is_some()).count()
    }
}

fn split_height(y: u16) -> (usize, u8) {
    let y = usize::from(y);
    (y / SECTION_HEIGHT, (y % SECTION_HEIGHT) as u8)
}

impl Serialize for ChunkData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sections: Vec<Option<&[BlockId]>> = self
            .sections
            .iter()
            .map(|section| section.as_ref().map(|section| section.blocks.as_slice()))
            .collect();
        sections.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChunkData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sections = Vec::<Option<Vec<BlockId>>>::deserialize(deserializer)?;
        if sections.len() != SECTION_COUNT {
            return Err(de::Error::custom(format!(
                "expected {SECTION_COUNT} sections, got {}",
                sections.len()
            )));
        }

        let mut chunk = ChunkData::new_empty();
        for (slot, section) in chunk.sections.iter_mut().zip(sections) {
            let Some(blocks) = section else {
                continue;
            };
            if blocks.len() != SECTION_VOLUME {
                return Err(de::Error::custom(format!(
                    "expected {SECTION_VOLUME} blocks per section, got {}",
                    blocks.len()
                )));
            }
            let blocks: Box<[BlockId; SECTION_VOLUME]> = blocks
                .into_boxed_slice()
                .try_into()
                .map_err(|_| de::Error::custom("failed to deserialize chunk section"))?;
            *slot = Some(ChunkSection { blocks });
        }

        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkData;
    use crate::block::BlockId;
    use crate::coords::LocalPos;

    #[test]
    fn chunk_creation_and_get_set_work() {
        let mut chunk = ChunkData::new_empty();
        let pos = LocalPos { x: 3, y: 70, z: 11 };
        assert_eq!(chunk.get(pos), BlockId::AIR);

        chunk.set(pos, BlockId::GRANITE);
        assert_eq!(chunk.get(pos), BlockId::GRANITE);
        assert_eq!(chunk.stored_sections(), 1);
    }

    #[test]
    fn clearing_the_last_block_drops_the_section() {
        let mut chunk = ChunkData::new_empty();
        let pos = LocalPos { x: 0, y: 200, z: 0 };
        chunk.set(pos, BlockId::SNOWCAP);
        chunk.set(pos, BlockId::AIR);
        assert!(chunk.is_empty());
    }

    #[test]
    fn surface_block_finds_the_topmost_non_air_block() {
        let mut chunk = ChunkData::new_layered(BlockId::LOAM, 62);
        chunk.set(LocalPos { x: 4, y: 63, z: 9 }, BlockId::VERDANT_TURF);
        chunk.set(LocalPos { x: 4, y: 90, z: 9 }, BlockId::CANOPY_LEAVES);

        assert_eq!(chunk.surface_block(4, 9), Some((90, BlockId::CANOPY_LEAVES)));
        assert_eq!(chunk.highest_block(0, 0), Some(62));
        assert_eq!(ChunkData::new_empty().highest_block(0, 0), None);
    }

    #[test]
    fn chunk_bincode_round_trip_preserves_data() {
        let mut original = ChunkData::new_layered(BlockId::GRANITE, 3);
        original.set(LocalPos { x: 15, y: 255, z: 15 }, BlockId::OBSIDIAN);

        let encoded = bincode::serialize(&original).expect("serialize chunk");
        let decoded: ChunkData = bincode::deserialize(&encoded).expect("deserialize chunk");

        assert_eq!(decoded, original);
        assert_eq!(decoded.stored_sections(), 2);
    }
}
