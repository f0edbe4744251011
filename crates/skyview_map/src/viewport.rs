use std::sync::Arc;

use glam::{DVec2, UVec2};
use image::imageops;
use image::{Rgba, RgbaImage};
use tracing::debug;
use skyview_core::jobs::JobSystem;
use skyview_shared::coords::{ChunkPos, CHUNK_WIDTH};
use skyview_shared::world::WorldSource;

use crate::chunk_cache::ChunkCache;
use crate::config::MapConfig;
use crate::handle::{MapHandle, MapState};
use crate::input::{InputState, MapKey};
use crate::lock;
use crate::palette::MaterialPalette;
use crate::rasterizer::scaled_size;

/// Pan, zoom and centering state of the map view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Screen pixels per block.
    pub scale: u32,
    /// Pan offset in screen pixels.
    pub offset: DVec2,
    pub should_center: bool,
    /// Chunk shown in the middle of the screen after a recenter.
    pub center: ChunkPos,
}

impl ViewState {
    fn chunk_pixels(&self) -> f64 {
        f64::from(scaled_size(self.scale))
    }

    fn apply_recenter(&mut self) {
        if self.should_center {
            let chunk_px = self.chunk_pixels();
            self.offset = DVec2::new(f64::from(self.center.x), f64::from(self.center.z)) * chunk_px;
            self.should_center = false;
        }
    }
}

pub struct Viewport {
    state: Arc<MapState>,
    view: ViewState,
    drift: f64,
    marker_color: Rgba<u8>,
    rerender_pending: bool,
    frame: u64,
}

impl Viewport {
    /// Discovers the world around its spawn point and renders everything found.
    pub fn new(
        world: Arc<dyn WorldSource>,
        palette: MaterialPalette,
        config: &MapConfig,
        jobs: Arc<JobSystem>,
    ) -> Self {
        let scale = config.scale.max(1);
        let (center, chunks) = ChunkCache::discover(world.as_ref(), world.spawn_position());
        let state = Arc::new(MapState::new(world, palette, chunks, scale, jobs));
        state.rerender_all(scale);

        Self {
            state,
            view: ViewState {
                scale,
                offset: DVec2::ZERO,
                should_center: true,
                center,
            },
            drift: config.drift,
            marker_color: Rgba(config.marker_color),
            rerender_pending: false,
            frame: 0,
        }
    }

    /// Handle for feeding world notifications in from other threads.
    pub fn handle(&self) -> MapHandle {
        MapHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Makes `pos` the home chunk and centers on it at the next compose.
    pub fn recenter_on(&mut self, pos: ChunkPos) {
        self.view.center = pos;
        self.view.should_center = true;
    }

    pub fn request_rerender(&mut self) {
        self.rerender_pending = true;
    }

    /// Advances the view by one frame of input, re-rendering when the zoom
    /// changed or the render cache has fallen behind the chunk cache.
    pub fn step(&mut self, input: &InputState) {
        self.frame += 1;

        if input.is_pressed(MapKey::PanUp) {
            self.view.offset.y -= self.drift;
        }
        if input.is_pressed(MapKey::PanDown) {
            self.view.offset.y += self.drift;
        }
        if input.is_pressed(MapKey::PanLeft) {
            self.view.offset.x -= self.drift;
        }
        if input.is_pressed(MapKey::PanRight) {
            self.view.offset.x += self.drift;
        }

        if input.is_pressed(MapKey::Center) {
            self.view.should_center = true;
        }
        if input.is_pressed(MapKey::Refresh) {
            self.rerender_pending = true;
            let changed = self.state.refresh_chunks();
            debug!("Refresh picked up {} changed chunks", changed);
        }

        let old_scale = self.view.scale;
        if input.wheel_delta > 0.0 {
            self.view.scale = old_scale.saturating_add(1);
        } else if input.wheel_delta < 0.0 {
            self.view.scale = old_scale.saturating_sub(1).max(1);
        }

        let (chunk_count, render_count, stale) = {
            let chunks = lock(&self.state.chunks);
            let renders = lock(&self.state.renders);
            (chunks.len(), renders.len(), renders.stale_count(self.view.scale))
        };
        let scale_changed = self.view.scale != old_scale;
        if scale_changed || chunk_count != render_count || stale > 0 {
            self.rerender_pending = true;
        }
        if scale_changed {
            self.state.set_scale(self.view.scale);
            let old_px = f64::from(scaled_size(old_scale));
            self.view.offset = self.view.offset / old_px * self.view.chunk_pixels();
        }

        if self.rerender_pending {
            self.state.rerender_all(self.view.scale);
            self.rerender_pending = false;
        }
    }

    /// Draws the current frame: background, every chunk image current at the
    /// view scale, then one marker per tracked player.
    pub fn compose(&mut self, screen: UVec2) -> RgbaImage {
        self.view.apply_recenter();

        let scale = self.view.scale;
        let chunks = lock(&self.state.renders).drawable(scale);
        let players = self.state.players.snapshot();

        let mut frame = RgbaImage::from_pixel(screen.x, screen.y, self.state.palette.background());
        let origin = screen.as_dvec2() / 2.0;
        let chunk_px = self.view.chunk_pixels();
        let half = chunk_px / 2.0;

        for (pos, image) in &chunks {
            let at = origin + DVec2::new(f64::from(pos.x), f64::from(pos.z)) * chunk_px
                - half
                - self.view.offset;
            let at = at.floor();
            imageops::overlay(&mut frame, &**image, at.x as i64, at.y as i64);
        }

        let block_px = f64::from(scale);
        let bias = block_px * (CHUNK_WIDTH as f64 / 2.0);
        for (_, position) in &players {
            let at = origin + DVec2::new(position.x, position.z) * block_px
                - f64::from(scale / 2)
                - self.view.offset
                - bias;
            let at = at.floor();
            fill_square(&mut frame, at.x as i64, at.y as i64, scale, self.marker_color);
        }

        frame
    }
}

fn fill_square(frame: &mut RgbaImage, x: i64, y: i64, size: u32, color: Rgba<u8>) {
    let (width, height) = (i64::from(frame.width()), i64::from(frame.height()));
    let size = i64::from(size);
    for py in y.max(0)..(y + size).min(height) {
        for px in x.max(0)..(x + size).min(width) {
            frame.put_pixel(px as u32, py as u32, color);
        }
    }
}
