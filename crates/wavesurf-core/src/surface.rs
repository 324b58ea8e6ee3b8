//! Rendering surface provider
//!
//! The renderer never talks to a concrete windowing or DOM API. It mounts
//! into a host through a [`SurfaceProvider`], which owns the isolated
//! rendering root and exposes a handful of regions:
//!
//! - `Scroll`: the viewport that clips and scrolls the content
//! - `Wrapper`: the content element (full waveform width)
//! - `Progress`: the progress overlay, left-aligned inside the wrapper
//! - `Cursor`: the playback cursor line
//!
//! Tiles are pushed into the surface as finished rasters. Pointer input comes
//! out of the surface on an [`EventBus`] of [`PointerEvent`]s.
//!
//! [`HeadlessSurface`] simulates the layout (wrapper shifted by the scroll
//! offset, progress rectangle growing with progress) and counts visual
//! writes, which is what the engine's tests observe.

use std::cell::RefCell;
use std::rc::Rc;

use image::RgbaImage;

use crate::color::Color;
use crate::drag::PointerEvent;
use crate::error::{WaveError, WaveResult};
use crate::events::EventBus;
use crate::types::Rect;

/// Identity of a host or mounted element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Where the renderer should mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// Host looked up by selector
    Selector(String),
    /// Host given directly
    Element(ElementId),
}

impl From<&str> for Container {
    fn from(selector: &str) -> Self {
        Container::Selector(selector.to_string())
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::Selector(selector) => write!(f, "{selector}"),
            Container::Element(id) => write!(f, "element #{}", id.0),
        }
    }
}

/// Regions of the mounted rendering root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Scroll,
    Wrapper,
    Progress,
    Cursor,
}

/// Width of the content element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WrapperWidth {
    /// Stretch to the viewport (only used when the content fits)
    Fill,
    /// Fixed CSS pixel width
    Px(f64),
}

/// Cursor line appearance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorStyle {
    pub color: Color,
    pub width: f64,
}

/// Lane and index of a drawn tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub lane: usize,
    pub index: usize,
}

/// A drawn tile: waveform raster plus its progress-colored copy
#[derive(Debug, Clone)]
pub struct DrawnTile {
    pub key: TileKey,
    /// Offset from the content's left edge, CSS pixels
    pub left: f64,
    /// Lane offset from the content's top edge, CSS pixels
    pub top: f64,
    /// CSS pixel size (rasters are this times the pixel ratio)
    pub width: f64,
    pub height: f64,
    pub waveform: RgbaImage,
    pub progress: RgbaImage,
}

/// Capability set the renderer needs from a platform
///
/// Implementations must not hold a mutable borrow of themselves while
/// emitting on their pointer bus: listeners measure the surface.
pub trait SurfaceProvider {
    /// Create the isolated rendering root inside `container`
    fn mount(&mut self, container: &Container) -> WaveResult<()>;

    /// Tear down everything created by `mount`
    fn unmount(&mut self);

    /// Identities of the scroll viewport and content element
    ///
    /// These change when the root is rebuilt.
    fn element_ids(&self) -> (ElementId, ElementId);

    /// Screen-space rectangle of a region
    fn rect(&self, region: Region) -> Rect;

    /// Device pixels per CSS pixel
    fn pixel_ratio(&self) -> f64;

    /// Current raw scroll offset of the viewport
    fn scroll_left(&self) -> f64;

    /// Set the raw scroll offset (clamped to the scrollable range)
    fn set_scroll_left(&mut self, left: f64);

    /// Scrollable width (content width, at least the viewport width)
    fn scroll_width(&self) -> f64;

    fn set_wrapper_width(&mut self, width: WrapperWidth);

    /// Position the cursor at `progress` of the content width
    fn set_cursor(&mut self, progress: f64);

    /// Resize the progress overlay to `progress` of the content width
    fn set_progress(&mut self, progress: f64);

    fn set_cursor_style(&mut self, style: CursorStyle);

    fn set_scrollbar_hidden(&mut self, hidden: bool);

    /// Minimum height of the tile area
    fn set_content_height(&mut self, height: f64);

    fn insert_tile(&mut self, tile: Rc<DrawnTile>);

    /// Drop every tile of one lane
    fn clear_lane(&mut self, lane: usize);

    /// Drop every tile
    fn clear_tiles(&mut self);

    /// Pointer events of the content element, `None` when nothing is mounted
    fn pointer_events(&self) -> Option<EventBus<PointerEvent>>;
}

/// Shared surface handle
pub type SharedSurface = Rc<RefCell<dyn SurfaceProvider>>;

// =============================================================================
// Headless surface
// =============================================================================

/// In-memory surface with a simulated layout
#[derive(Debug)]
pub struct HeadlessSurface {
    hosts: Vec<Container>,
    mounted: bool,
    next_element: u64,
    ids: (ElementId, ElementId),
    viewport: Rect,
    pixel_ratio: f64,
    scroll_left: f64,
    wrapper_width: WrapperWidth,
    cursor: f64,
    progress: f64,
    cursor_style: CursorStyle,
    scrollbar_hidden: bool,
    content_height: f64,
    tiles: Vec<Rc<DrawnTile>>,
    pointer: EventBus<PointerEvent>,
    /// Number of cursor position writes
    pub cursor_writes: usize,
    /// Number of progress overlay writes
    pub progress_writes: usize,
}

impl HeadlessSurface {
    /// Surface whose viewport occupies `viewport` on screen, hosted by `"#waveform"`
    pub fn new(viewport: Rect) -> Self {
        Self {
            hosts: vec![Container::from("#waveform")],
            mounted: false,
            next_element: 1,
            ids: (ElementId(0), ElementId(0)),
            viewport,
            pixel_ratio: 1.0,
            scroll_left: 0.0,
            wrapper_width: WrapperWidth::Fill,
            cursor: 0.0,
            progress: 0.0,
            cursor_style: CursorStyle {
                color: Color::BLACK,
                width: 2.0,
            },
            scrollbar_hidden: false,
            content_height: 0.0,
            tiles: Vec::new(),
            pointer: EventBus::new(),
            cursor_writes: 0,
            progress_writes: 0,
        }
    }

    /// Register an additional host the surface can mount into
    pub fn with_host(mut self, host: Container) -> Self {
        self.hosts.push(host);
        self
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio.max(1.0);
        self
    }

    /// Simulate a host resize
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
        let left = self.scroll_left;
        self.set_scroll_left(left);
    }

    /// Pointer bus the platform would feed; usable before mounting
    pub fn pointer_bus(&self) -> EventBus<PointerEvent> {
        self.pointer.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn wrapper_width(&self) -> WrapperWidth {
        self.wrapper_width
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

    /// Tiles currently attached, in insertion order
    pub fn tiles(&self) -> &[Rc<DrawnTile>] {
        &self.tiles
    }

    fn content_width(&self) -> f64 {
        match self.wrapper_width {
            WrapperWidth::Fill => self.viewport.width,
            WrapperWidth::Px(width) => width,
        }
    }

    fn max_scroll(&self) -> f64 {
        (self.scroll_width() - self.viewport.width).max(0.0)
    }
}

impl SurfaceProvider for HeadlessSurface {
    fn mount(&mut self, container: &Container) -> WaveResult<()> {
        if !self.hosts.contains(container) {
            return Err(WaveError::ContainerNotFound(container.to_string()));
        }
        let scroll_id = ElementId(self.next_element);
        let wrapper_id = ElementId(self.next_element + 1);
        self.next_element += 2;
        self.ids = (scroll_id, wrapper_id);
        self.mounted = true;
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
            Region::Progress => Rect::new(
                wrapper.left,
                wrapper.top,
                wrapper.width * self.progress,
                wrapper.height,
            ),
            Region::Cursor => Rect::new(
                wrapper.left + wrapper.width * self.cursor,
                wrapper.top,
                self.cursor_style.width,
                wrapper.height,
            ),
        }
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
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
        self.cursor_writes += 1;
    }

    fn set_progress(&mut self, progress: f64) {
        self.progress = progress;
        self.progress_writes += 1;
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
        self.tiles.push(tile);
    }

    fn clear_lane(&mut self, lane: usize) {
        self.tiles.retain(|tile| tile.key.lane != lane);
    }

    fn clear_tiles(&mut self) {
        self.tiles.clear();
    }

    fn pointer_events(&self) -> Option<EventBus<PointerEvent>> {
        self.mounted.then(|| self.pointer.clone())
    }
}
