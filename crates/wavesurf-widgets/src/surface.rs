//! Surface provider backed by an iced canvas
//!
//! The canvas reports its bounds and pointer input here; the renderer writes
//! tiles, cursor and scroll state here; the canvas draws from it every frame.
//! Tile rasters are uploaded once as [`image::Handle`]s when inserted.

use std::rc::Rc;

use iced::widget::image;
use wavesurf_core::{
    Container, CursorStyle, DrawnTile, ElementId, EventBus, PointerEvent, Rect, Region,
    SurfaceProvider, WaveError, WaveResult, WrapperWidth,
};

/// A drawn tile with its uploaded rasters
#[derive(Debug, Clone)]
pub struct TileImage {
    pub tile: Rc<DrawnTile>,
    pub waveform: image::Handle,
    pub progress: image::Handle,
}

impl TileImage {
    fn upload(tile: Rc<DrawnTile>) -> Self {
        let waveform = image::Handle::from_rgba(
            tile.waveform.width(),
            tile.waveform.height(),
            tile.waveform.as_raw().clone(),
        );
        let progress = image::Handle::from_rgba(
            tile.progress.width(),
            tile.progress.height(),
            tile.progress.as_raw().clone(),
        );
        Self {
            tile,
            waveform,
            progress,
        }
    }
}

/// Canvas-backed surface
///
/// Mounts only into the host named at construction.
#[derive(Debug)]
pub struct IcedSurface {
    host: Container,
    mounted: bool,
    ids: (ElementId, ElementId),
    viewport: Rect,
    scroll_left: f64,
    wrapper_width: WrapperWidth,
    cursor: f64,
    progress: f64,
    cursor_style: CursorStyle,
    scrollbar_hidden: bool,
    content_height: f64,
    tiles: Vec<TileImage>,
    pointer: EventBus<PointerEvent>,
}

impl IcedSurface {
    pub fn new(host: impl Into<Container>) -> Self {
        Self {
            host: host.into(),
            mounted: false,
            ids: (ElementId(1), ElementId(2)),
            viewport: Rect::default(),
            scroll_left: 0.0,
            wrapper_width: WrapperWidth::Fill,
            cursor: 0.0,
            progress: 0.0,
            cursor_style: CursorStyle {
                color: wavesurf_core::Color::BLACK,
                width: 2.0,
            },
            scrollbar_hidden: false,
            content_height: 0.0,
            tiles: Vec::new(),
            pointer: EventBus::new(),
        }
    }

    /// Update the canvas bounds. Returns true when they changed.
    pub fn set_viewport(&mut self, viewport: Rect) -> bool {
        if self.viewport == viewport {
            return false;
        }
        self.viewport = viewport;
        let left = self.scroll_left;
        self.set_scroll_left(left);
        true
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Pointer bus the canvas feeds
    pub fn pointer_bus(&self) -> EventBus<PointerEvent> {
        self.pointer.clone()
    }

    pub fn content_width(&self) -> f64 {
        match self.wrapper_width {
            WrapperWidth::Fill => self.viewport.width,
            WrapperWidth::Px(width) => width,
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    pub fn scrollbar_hidden(&self) -> bool {
        self.scrollbar_hidden
    }

    pub fn content_height(&self) -> f64 {
        self.content_height
    }

    pub fn tiles(&self) -> &[TileImage] {
        &self.tiles
    }

    fn max_scroll(&self) -> f64 {
        (self.scroll_width() - self.viewport.width).max(0.0)
    }
}

impl SurfaceProvider for IcedSurface {
    fn mount(&mut self, container: &Container) -> WaveResult<()> {
        if *container != self.host {
            return Err(WaveError::ContainerNotFound(container.to_string()));
        }
        self.mounted = true;
        log::debug!("IcedSurface: mounted into {}", container);
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.tiles.clear();
        self.pointer.clear();
    }

    fn element_ids(&self) -> (ElementId, ElementId) {
        self.ids
    }

    fn rect(&self, region: Region) -> Rect {
        let wrapper = Rect::new(
            self.viewport.left - self.scroll_left,
            self.viewport.top,
            self.content_width(),
            self.viewport.height,
        );
        match region {
            Region::Scroll => self.viewport,
            Region::Wrapper => wrapper,
            Region::Progress => Rect::new(wrapper.left, wrapper.top, wrapper.width * self.progress, wrapper.height),
            Region::Cursor => Rect::new(
                wrapper.left + wrapper.width * self.cursor,
                wrapper.top,
                self.cursor_style.width,
                wrapper.height,
            ),
        }
    }

    /// Canvas coordinates are logical pixels. Sharper rasters on HiDPI
    /// screens come from `RenderOptions::pixel_ratio`.
    fn pixel_ratio(&self) -> f64 {
        1.0
    }

    fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    fn set_scroll_left(&mut self, left: f64) {
        self.scroll_left = left.clamp(0.0, self.max_scroll());
    }

    fn scroll_width(&self) -> f64 {
        self.content_width().max(self.viewport.width)
    }

    fn set_wrapper_width(&mut self, width: WrapperWidth) {
        self.wrapper_width = width;
        let left = self.scroll_left;
        self.set_scroll_left(left);
    }

    fn set_cursor(&mut self, progress: f64) {
        self.cursor = progress;
    }

    fn set_progress(&mut self, progress: f64) {
        self.progress = progress;
    }

    fn set_cursor_style(&mut self, style: CursorStyle) {
        self.cursor_style = style;
    }

    fn set_scrollbar_hidden(&mut self, hidden: bool) {
        self.scrollbar_hidden = hidden;
    }

    fn set_content_height(&mut self, height: f64) {
        self.content_height = height;
    }

    fn insert_tile(&mut self, tile: Rc<DrawnTile>) {
        self.tiles.push(TileImage::upload(tile));
    }

    fn clear_lane(&mut self, lane: usize) {
        self.tiles.retain(|t| t.tile.key.lane != lane);
    }

    fn clear_tiles(&mut self) {
        self.tiles.clear();
    }

    fn pointer_events(&self) -> Option<EventBus<PointerEvent>> {
        self.mounted.then(|| self.pointer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted() -> IcedSurface {
        let mut surface = IcedSurface::new("waveform");
        surface.mount(&"waveform".into()).unwrap();
        surface.set_viewport(Rect::new(10.0, 0.0, 400.0, 100.0));
        surface
    }

    #[test]
    fn test_mount_only_into_own_host() {
        let mut surface = IcedSurface::new("waveform");
        assert!(surface.mount(&"other".into()).is_err());
        assert!(surface.pointer_events().is_none());
        assert!(surface.mount(&"waveform".into()).is_ok());
        assert!(surface.pointer_events().is_some());
    }

    #[test]
    fn test_scroll_is_clamped_to_content() {
        let mut surface = mounted();
        surface.set_scroll_left(100.0);
        assert_eq!(surface.scroll_left(), 0.0);

        surface.set_wrapper_width(WrapperWidth::Px(1000.0));
        surface.set_scroll_left(900.0);
        assert_eq!(surface.scroll_left(), 600.0);
        assert_eq!(surface.rect(Region::Wrapper).left, -590.0);

        // Shrinking the content pulls the offset back in range
        surface.set_wrapper_width(WrapperWidth::Px(500.0));
        assert_eq!(surface.scroll_left(), 100.0);
    }

    #[test]
    fn test_viewport_change_is_reported_once() {
        let mut surface = mounted();
        assert!(!surface.set_viewport(Rect::new(10.0, 0.0, 400.0, 100.0)));
        assert!(surface.set_viewport(Rect::new(10.0, 0.0, 600.0, 100.0)));
    }
}
