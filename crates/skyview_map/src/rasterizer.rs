use image::imageops::{self, FilterType};
use image::RgbaImage;
use skyview_shared::chunk::ChunkData;
use skyview_shared::coords::CHUNK_WIDTH;

use crate::palette::MaterialPalette;

/// Edge length of an unscaled chunk raster: one pixel per block column.
pub const RASTER_SIZE: u32 = CHUNK_WIDTH as u32;

/// Top-down colour image of one chunk, always `RASTER_SIZE` square.
pub type Raster = RgbaImage;

/// Edge length in pixels of a chunk image drawn at `scale`.
pub fn scaled_size(scale: u32) -> u32 {
    scale.max(1) * RASTER_SIZE
}

/// Colours each column by the material of its topmost block. Columns that are
/// empty, or whose material has no colour, stay transparent.
pub fn rasterize(chunk: &ChunkData, palette: &MaterialPalette) -> Raster {
    let mut raster = Raster::new(RASTER_SIZE, RASTER_SIZE);
    for z in 0..CHUNK_WIDTH as u8 {
        for x in 0..CHUNK_WIDTH as u8 {
            let Some((_, block)) = chunk.surface_block(x, z) else {
                continue;
            };
            if let Some(color) = palette.color(block) {
                raster.put_pixel(u32::from(x), u32::from(z), color);
            }
        }
    }
    raster
}

/// Blows a raster up to `scale` pixels per block without interpolation.
pub fn scale_raster(raster: &Raster, scale: u32) -> RgbaImage {
    let size = scaled_size(scale);
    imageops::resize(raster, size, size, FilterType::Nearest)
}

pub fn render_chunk(chunk: &ChunkData, palette: &MaterialPalette, scale: u32) -> RgbaImage {
    scale_raster(&rasterize(chunk, palette), scale)
}

#[cfg(test)]
mod tests {
    use image::Rgba;
    use skyview_shared::block::BlockId;
    use skyview_shared::chunk::ChunkData;
    use skyview_shared::coords::LocalPos;

    use super::{rasterize, render_chunk, scale_raster, scaled_size, RASTER_SIZE};
    use crate::palette::MaterialPalette;

    fn palette() -> MaterialPalette {
        MaterialPalette::new(Rgba([0, 0, 0, 255]))
            .with_color(BlockId::LOAM, Rgba([134, 96, 67, 255]))
            .with_color(BlockId::VERDANT_TURF, Rgba([89, 145, 52, 255]))
    }

    fn sample_chunk() -> ChunkData {
        let mut chunk = ChunkData::new_layered(BlockId::LOAM, 40);
        chunk.set(LocalPos { x: 2, y: 41, z: 5 }, BlockId::VERDANT_TURF);
        chunk.set(LocalPos { x: 9, y: 80, z: 1 }, BlockId::OBSIDIAN);
        for y in 0..=40 {
            chunk.set(LocalPos { x: 15, y, z: 15 }, BlockId::AIR);
        }
        chunk
    }

    #[test]
    fn each_column_takes_its_surface_colour() {
        let raster = rasterize(&sample_chunk(), &palette());
        assert_eq!(raster.dimensions(), (RASTER_SIZE, RASTER_SIZE));
        assert_eq!(*raster.get_pixel(0, 0), Rgba([134, 96, 67, 255]));
        assert_eq!(*raster.get_pixel(2, 5), Rgba([89, 145, 52, 255]));
    }

    #[test]
    fn empty_columns_and_unknown_materials_stay_transparent() {
        let raster = rasterize(&sample_chunk(), &palette());
        // Obsidian has no colour in this palette.
        assert_eq!(*raster.get_pixel(9, 1), Rgba([0, 0, 0, 0]));
        assert_eq!(*raster.get_pixel(15, 15), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn rasterizing_is_deterministic() {
        let chunk = sample_chunk();
        let palette = palette();
        assert_eq!(rasterize(&chunk, &palette), rasterize(&chunk, &palette));
        assert_eq!(render_chunk(&chunk, &palette, 3), render_chunk(&chunk, &palette, 3));
    }

    #[test]
    fn scaling_repeats_each_block_as_a_sharp_square() {
        let raster = rasterize(&sample_chunk(), &palette());
        let scale = 4;
        let scaled = scale_raster(&raster, scale);
        assert_eq!(scaled.dimensions(), (scaled_size(scale), scaled_size(scale)));

        for z in 0..RASTER_SIZE {
            for x in 0..RASTER_SIZE {
                let source = raster.get_pixel(x, z);
                for dz in 0..scale {
                    for dx in 0..scale {
                        assert_eq!(scaled.get_pixel(x * scale + dx, z * scale + dz), source);
                    }
                }
            }
        }
    }

    #[test]
    fn scale_one_keeps_the_raster() {
        let raster = rasterize(&sample_chunk(), &palette());
        assert_eq!(scale_raster(&raster, 1), raster);
        assert_eq!(scaled_size(0), RASTER_SIZE);
    }
}
