pub mod compression;
pub mod region;
pub mod region_world;
pub mod world_meta;

pub use region_world::RegionWorld;
pub use world_meta::WorldMeta;
