//! Virtualized tile rendering
//!
//! The waveform is cut into horizontal tiles no wider than the viewport.
//! When everything fits, every tile is drawn at once. When the content
//! scrolls, only the tile under the viewport and its neighbours are drawn,
//! and further tiles are drawn as scroll events come in. Once a lane holds
//! more than [`MAX_DRAWN_TILES`] tiles it is wiped and only the current
//! window is redrawn, which bounds memory on long recordings.
//!
//! Each lane is one channel (split-channel mode) or all channels together.
//! All widths here are CSS pixels; rasters are scaled by the pixel ratio.

pub mod draw;

use std::collections::BTreeSet;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use image::RgbaImage;

use crate::options::{LaneStyle, RenderFn};
use crate::surface::{DrawnTile, SharedSurface, TileKey};

/// Widest tile ever drawn
pub const MAX_TILE_WIDTH: f64 = 8000.0;

/// Drawn tiles a lane may hold before it is wiped and redrawn
pub const MAX_DRAWN_TILES: usize = 10;

/// How a lane's content width is cut into tiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayout {
    pub tile_width: f64,
    pub count: usize,
    pub total_width: f64,
}

impl TileLayout {
    /// Cut `total_width` for a viewport `client_width` wide
    ///
    /// With bars the tile width is snapped down to whole bar periods so
    /// bars never straddle a tile seam.
    pub fn new(total_width: f64, client_width: f64, style: &LaneStyle) -> Self {
        let mut tile_width = MAX_TILE_WIDTH.min(client_width).min(total_width);
        if style.uses_bars() {
            let period = style.effective_bar_width() + style.effective_bar_gap();
            if period > 0.0 && tile_width % period != 0.0 {
                tile_width = (tile_width / period).floor() * period;
            }
        }
        if tile_width <= 0.0 {
            // Viewport narrower than one bar, or zero-sized
            tile_width = total_width.min(MAX_TILE_WIDTH);
        }
        let count = if tile_width > 0.0 {
            (total_width / tile_width).ceil() as usize
        } else {
            0
        };
        Self {
            tile_width,
            count,
            total_width,
        }
    }

    /// CSS pixel span of tile `index`
    pub fn span(&self, index: usize) -> (f64, f64) {
        let start = index as f64 * self.tile_width;
        (start, (start + self.tile_width).min(self.total_width))
    }

    /// Tiles to draw for a scroll offset: the tile under it and one either side
    pub fn window(&self, scroll_left: f64) -> Range<usize> {
        if self.count == 0 {
            return 0..0;
        }
        let ratio = if self.total_width > 0.0 {
            (scroll_left / self.total_width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let index = ((ratio * self.count as f64).floor() as usize).min(self.count - 1);
        index.saturating_sub(1)..(index + 2).min(self.count)
    }
}

/// Everything a render pass needs besides the lane data
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub pixel_ratio: f64,
    /// Width of the scroll viewport
    pub client_width: f64,
    pub viewport_height: f64,
    pub scroll_left: f64,
    pub scrollable: bool,
    pub render_fn: Option<RenderFn>,
}

/// One lane to render
#[derive(Debug, Clone)]
pub struct LaneRequest {
    pub channels: Vec<Arc<[f32]>>,
    pub style: LaneStyle,
    /// Offset of the lane from the top of the content
    pub top: f64,
    /// Content width in CSS pixels
    pub total_width: f64,
}

#[derive(Debug)]
struct Lane {
    channels: Vec<Arc<[f32]>>,
    style: LaneStyle,
    layout: TileLayout,
    top: f64,
    height: f64,
    v_scale: f64,
    drawn: BTreeSet<usize>,
}

/// Draws lanes of tiles into a surface
pub struct TileRenderer {
    surface: SharedSurface,
    lanes: Vec<Lane>,
    context: Option<RenderContext>,
    /// Tiles attached to the surface, in draw order
    drawn_order: Vec<Rc<DrawnTile>>,
}

impl std::fmt::Debug for TileRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileRenderer")
            .field("lanes", &self.lanes.len())
            .field("drawn", &self.drawn_order.len())
            .finish()
    }
}

impl TileRenderer {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            surface,
            lanes: Vec::new(),
            context: None,
            drawn_order: Vec::new(),
        }
    }

    /// Remove every lane and tile
    pub fn clear(&mut self) {
        self.lanes.clear();
        self.drawn_order.clear();
        self.context = None;
        self.surface.borrow_mut().clear_tiles();
    }

    /// Start a render pass; previous tiles are discarded
    pub fn begin(&mut self, context: RenderContext) {
        self.clear();
        self.context = Some(context);
    }

    /// Add a lane and draw its initial tiles. Returns the lane height.
    pub fn render_lane(&mut self, request: LaneRequest) -> f64 {
        let Some(context) = self.context.clone() else {
            return 0.0;
        };
        let height = request.style.height.resolve(context.viewport_height);
        let layout = TileLayout::new(request.total_width, context.client_width, &request.style);

        let mut v_scale = request.style.bar_height.unwrap_or(1.0);
        if request.style.normalize {
            let max = request.channels.first().map_or(0.0, |c| draw::peak(c));
            if max > 0.0 {
                v_scale /= max as f64;
            }
        }

        let lane_index = self.lanes.len();
        log::debug!(
            "TileRenderer: lane {} width={:.0} tiles={}x{:.0}px",
            lane_index,
            layout.total_width,
            layout.count,
            layout.tile_width
        );
        self.lanes.push(Lane {
            channels: request.channels,
            style: request.style,
            layout,
            top: request.top,
            height,
            v_scale,
            drawn: BTreeSet::new(),
        });

        let indices = if context.scrollable {
            layout.window(context.scroll_left)
        } else {
            0..layout.count
        };
        for index in indices {
            self.draw_tile(lane_index, index);
        }
        height
    }

    /// Draw tiles newly scrolled into the window
    pub fn on_scroll(&mut self, scroll_left: f64) {
        let scrollable = self.context.as_ref().is_some_and(|c| c.scrollable);
        if !scrollable {
            return;
        }
        if let Some(context) = self.context.as_mut() {
            context.scroll_left = scroll_left;
        }

        for lane_index in 0..self.lanes.len() {
            if self.lanes[lane_index].drawn.len() > MAX_DRAWN_TILES {
                log::debug!("TileRenderer: lane {} over budget, redrawing window", lane_index);
                self.lanes[lane_index].drawn.clear();
                self.drawn_order.retain(|tile| tile.key.lane != lane_index);
                self.surface.borrow_mut().clear_lane(lane_index);
            }
            let window = self.lanes[lane_index].layout.window(scroll_left);
            for index in window {
                if !self.lanes[lane_index].drawn.contains(&index) {
                    self.draw_tile(lane_index, index);
                }
            }
        }
    }

    fn draw_tile(&mut self, lane_index: usize, index: usize) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        let Some(lane) = self.lanes.get(lane_index) else {
            return;
        };
        let Some(first) = lane.channels.first() else {
            return;
        };

        let (start, end) = lane.layout.span(index);
        let total = lane.layout.total_width;
        if end <= start || total <= 0.0 {
            return;
        }
        let len = first.len();
        let s0 = ((start / total) * len as f64).floor() as usize;
        let s1 = (((end / total) * len as f64).ceil() as usize).clamp(s0, len);
        let slices: Vec<&[f32]> = lane.channels.iter().map(|c| &c[s0.min(c.len())..s1.min(c.len())]).collect();

        let ratio = context.pixel_ratio;
        let width_px = ((end - start) * ratio).round().max(1.0) as u32;
        let height_px = (lane.height * ratio).round().max(1.0) as u32;

        let waveform = match &context.render_fn {
            Some(render) => {
                let mut raster = RgbaImage::new(width_px, height_px);
                (render.0)(&slices, &mut raster, &lane.style.wave_color);
                raster
            }
            None if lane.style.uses_bars() => {
                draw::bars(&slices, &lane.style, lane.v_scale, width_px, height_px, ratio)
                    .colorize(&lane.style.wave_color)
            }
            None => draw::line_envelope(&slices, lane.v_scale, width_px, height_px)
                .colorize(&lane.style.wave_color),
        };
        let progress = draw::source_in(&waveform, &lane.style.progress_color);

        let tile = Rc::new(DrawnTile {
            key: TileKey {
                lane: lane_index,
                index,
            },
            left: start,
            top: lane.top,
            width: end - start,
            height: lane.height,
            waveform,
            progress,
        });

        self.surface.borrow_mut().insert_tile(Rc::clone(&tile));
        self.drawn_order.push(tile);
        if let Some(lane) = self.lanes.get_mut(lane_index) {
            lane.drawn.insert(index);
        }
    }

    /// Tiles currently drawn, in draw order
    pub fn drawn_tiles(&self) -> &[Rc<DrawnTile>] {
        &self.drawn_order
    }

    /// Indices drawn in one lane
    pub fn drawn_indices(&self, lane: usize) -> Vec<usize> {
        self.lanes
            .get(lane)
            .map(|l| l.drawn.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn layout(&self, lane: usize) -> Option<TileLayout> {
        self.lanes.get(lane).map(|l| l.layout)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RenderOptions;
    use crate::surface::{Container, HeadlessSurface, SurfaceProvider};
    use crate::types::Rect;
    use std::cell::RefCell;

    fn line_style() -> LaneStyle {
        RenderOptions::default().lane_style(None)
    }

    fn setup() -> (Rc<RefCell<HeadlessSurface>>, TileRenderer) {
        let mut surface = HeadlessSurface::new(Rect::new(0.0, 0.0, 500.0, 128.0));
        surface.mount(&Container::from("#waveform")).unwrap();
        let surface = Rc::new(RefCell::new(surface));
        let shared: SharedSurface = surface.clone();
        (surface, TileRenderer::new(shared))
    }

    fn context(scrollable: bool, scroll_left: f64) -> RenderContext {
        RenderContext {
            pixel_ratio: 1.0,
            client_width: 500.0,
            viewport_height: 128.0,
            scroll_left,
            scrollable,
            render_fn: None,
        }
    }

    fn lane(total_width: f64) -> LaneRequest {
        let samples: Vec<f32> = (0..4000).map(|i| ((i as f32) * 0.01).sin()).collect();
        LaneRequest {
            channels: vec![Arc::from(samples)],
            style: line_style(),
            top: 0.0,
            total_width,
        }
    }

    #[test]
    fn test_layout_without_bars() {
        let layout = TileLayout::new(1000.0, 500.0, &line_style());
        assert_eq!(layout.tile_width, 500.0);
        assert_eq!(layout.count, 2);

        let layout = TileLayout::new(400.0, 500.0, &line_style());
        assert_eq!(layout.tile_width, 400.0);
        assert_eq!(layout.count, 1);
    }

    #[test]
    fn test_layout_snaps_to_bar_period() {
        let style = RenderOptions {
            bar_width: Some(3.0),
            bar_gap: Some(4.0),
            ..RenderOptions::default()
        }
        .lane_style(None);
        let layout = TileLayout::new(1000.0, 500.0, &style);
        assert_eq!(layout.tile_width, 497.0);
        assert_eq!(layout.count, 3);
        assert_eq!(layout.span(2), (994.0, 1000.0));
    }

    #[test]
    fn test_window_is_index_plus_minus_one() {
        let layout = TileLayout::new(10_000.0, 500.0, &line_style());
        assert_eq!(layout.window(0.0), 0..2);
        assert_eq!(layout.window(2600.0), 4..7);
        assert_eq!(layout.window(9_999.0), 18..20);
    }

    #[test]
    fn test_fitting_content_draws_everything() {
        let (surface, mut tiles) = setup();
        tiles.begin(context(false, 0.0));
        let height = tiles.render_lane(lane(400.0));
        assert_eq!(height, 128.0);
        assert_eq!(tiles.drawn_indices(0), vec![0]);
        assert_eq!(surface.borrow().tiles().len(), 1);
        assert_eq!(surface.borrow().tiles()[0].waveform.width(), 400);
    }

    #[test]
    fn test_scrolling_draws_lazily_and_stays_bounded() {
        let (surface, mut tiles) = setup();
        tiles.begin(context(true, 0.0));
        tiles.render_lane(lane(10_000.0));
        assert_eq!(tiles.drawn_indices(0), vec![0, 1]);

        let mut left = 0.0;
        while left < 9_500.0 {
            left += 250.0;
            tiles.on_scroll(left);
            let drawn = tiles.drawn_indices(0).len();
            assert!(drawn <= MAX_DRAWN_TILES + 3, "Drawn {drawn} tiles at {left}");
            assert_eq!(surface.borrow().tiles().len(), drawn);
            assert_eq!(tiles.drawn_tiles().len(), drawn);
        }
    }

    #[test]
    fn test_over_budget_redraws_exactly_the_window() {
        let (_surface, mut tiles) = setup();
        tiles.begin(context(true, 0.0));
        tiles.render_lane(lane(10_000.0));
        for step in 1..=9 {
            tiles.on_scroll(step as f64 * 500.0);
        }
        // Tiles 0..=10 drawn: over budget
        assert_eq!(tiles.drawn_indices(0).len(), 11);
        tiles.on_scroll(5_500.0);
        assert_eq!(tiles.drawn_indices(0), vec![10, 11, 12]);
    }

    #[test]
    fn test_begin_clears_previous_render() {
        let (surface, mut tiles) = setup();
        tiles.begin(context(false, 0.0));
        tiles.render_lane(lane(400.0));
        tiles.begin(context(false, 0.0));
        assert!(surface.borrow().tiles().is_empty());
        assert_eq!(tiles.lane_count(), 0);
    }

    #[test]
    fn test_custom_render_function_feeds_progress() {
        let (surface, mut tiles) = setup();
        let mut ctx = context(false, 0.0);
        ctx.render_fn = Some(RenderFn::new(|channels, raster, _fill| {
            assert_eq!(channels.len(), 1);
            raster.put_pixel(0, 0, image::Rgba([1, 2, 3, 255]));
        }));
        tiles.begin(ctx);
        tiles.render_lane(lane(400.0));

        let surface = surface.borrow();
        let tile = &surface.tiles()[0];
        assert_eq!(tile.waveform.get_pixel(0, 0).0, [1, 2, 3, 255]);
        assert_eq!(tile.progress.get_pixel(0, 0).0[3], 255);
        assert_eq!(tile.progress.get_pixel(1, 0).0[3], 0);
    }

    #[test]
    fn test_normalize_scales_to_peak() {
        let (_surface, mut tiles) = setup();
        tiles.begin(context(false, 0.0));
        let mut request = lane(400.0);
        request.channels = vec![Arc::from(vec![0.25f32; 400])];
        request.style.normalize = true;
        tiles.render_lane(request);

        let tile = &tiles.drawn_tiles()[0];
        assert_eq!(tile.waveform.get_pixel(10, 0).0[3], tile.waveform.get_pixel(10, 64).0[3]);
        assert!(tile.waveform.get_pixel(10, 0).0[3] > 0, "Normalized quiet signal reaches the top");
    }
}
