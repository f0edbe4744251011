use serde::{Deserialize, Serialize};

#[repr(transparent)]
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: Self = Self(0);
    pub const BEDSTONE: Self = Self(1);
    pub const GRANITE: Self = Self(2);
    pub const LOAM: Self = Self(3);
    pub const VERDANT_TURF: Self = Self(4);
    pub const DUNE_SAND: Self = Self(5);
    pub const TIMBER_LOG: Self = Self(6);
    pub const HEWN_PLANK: Self = Self(7);
    pub const CANOPY_LEAVES: Self = Self(8);
    pub const STILL_WATER: Self = Self(9);
    pub const RUBBLESTONE: Self = Self(10);
    pub const GRAVEL_BED: Self = Self(14);
    pub const SNOWCAP: Self = Self(15);
    pub const LAVA_SOURCE: Self = Self(70);
    pub const OBSIDIAN: Self = Self(78);

    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Registered name of a default block, if it has one.
    pub fn name(self) -> Option<&'static str> {
        DEFAULT_BLOCKS
            .iter()
            .find(|(id, _)| *id == self)
            .map(|(_, name)| *name)
    }
}

pub const DEFAULT_BLOCKS: &[(BlockId, &str)] = &[
    (BlockId::AIR, "air"),
    (BlockId::BEDSTONE, "bedstone"),
    (BlockId::GRANITE, "granite"),
    (BlockId::LOAM, "loam"),
    (BlockId::VERDANT_TURF, "verdant_turf"),
    (BlockId::DUNE_SAND, "dune_sand"),
    (BlockId::TIMBER_LOG, "timber_log"),
    (BlockId::HEWN_PLANK, "hewn_plank"),
    (BlockId::CANOPY_LEAVES, "canopy_leaves"),
    (BlockId::STILL_WATER, "still_water"),
    (BlockId::RUBBLESTONE, "rubblestone"),
    (BlockId::GRAVEL_BED, "gravel_bed"),
    (BlockId::SNOWCAP, "snowcap"),
    (BlockId::LAVA_SOURCE, "lava_source"),
    (BlockId::OBSIDIAN, "obsidian"),
];
