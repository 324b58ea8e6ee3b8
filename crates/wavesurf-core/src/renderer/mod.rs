//! Viewport and cursor coordination
//!
//! [`Renderer`] wires the pieces together:
//!
//! - the tile renderer draws the waveform for the current zoom
//! - the drag tracker turns pointer input into seek gestures
//! - the inertial scroll controller owns the scroll offset
//! - the surface shows cursor and progress overlay
//!
//! Several signals can move the cursor: playback progress, drag moves,
//! auto-scroll ticks and momentum scroll ticks. While a drag is running the
//! drag is authoritative and playback progress is ignored. While edge
//! auto-scroll is running its tick recomputes the seek position from the last
//! pointer position against the live content rectangle; otherwise scroll
//! ticks do. A per-frame loop re-applies the latest progress while dragging.
//!
//! Everything is single-threaded. Callbacks capture `Weak` handles and never
//! hold a `RefCell` borrow while emitting events.

mod interaction;
mod state;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use crate::drag::{make_draggable, DragHandlers, DragSubscription, DragTarget, PointerEvent};
use crate::error::WaveResult;
use crate::events::{EventBus, ListenerId, RendererEvent};
use crate::export::{export_tiles, ExportType, ExportedImages};
use crate::options::{Height, RenderOptions};
use crate::scheduler::{SharedScheduler, TaskKind};
use crate::scroll::{InertialScroll, ScrollBinding, ScrollState, ScrollTick, ScrollToOptions};
use crate::surface::{Container, CursorStyle, Region, SharedSurface, SurfaceProvider, WrapperWidth};
use crate::tiles::{LaneRequest, RenderContext, TileRenderer};
use crate::types::{clamp_progress, AudioChannelData, AudioSource, Rect, ViewportGeometry};

pub use state::{
    edge_zone, round_half_pixel, AutoScroll, CursorState, DragPhase, DragSession,
    AUTO_CENTER_STEP, AUTO_SCROLL_MAX_SPEED, AUTO_SCROLL_RAMP_MAX, AUTO_SCROLL_RAMP_START,
    AUTO_SCROLL_RAMP_STEP, EDGE_ZONE_RATIO, INTERACTION_COOLDOWN, SCROLL_INTO_VIEW_BUFFER,
};

use state::State;

/// Drag target backed by the surface's content element
struct SurfaceTarget {
    surface: Weak<RefCell<dyn SurfaceProvider>>,
    bus: EventBus<PointerEvent>,
}

impl DragTarget for SurfaceTarget {
    fn rect(&self) -> Rect {
        self.surface
            .upgrade()
            .map(|surface| surface.borrow().rect(Region::Wrapper))
            .unwrap_or_default()
    }

    fn pointer_events(&self) -> EventBus<PointerEvent> {
        self.bus.clone()
    }
}

pub(crate) struct Shared {
    surface: SharedSurface,
    scheduler: SharedScheduler,
    events: EventBus<RendererEvent>,
    options: RefCell<RenderOptions>,
    state: RefCell<State>,
    tiles: RefCell<TileRenderer>,
    scroll: RefCell<Option<InertialScroll>>,
    drag: RefCell<Option<DragSubscription>>,
    pointer: RefCell<Option<(EventBus<PointerEvent>, ListenerId)>>,
    tile_listener: Cell<Option<ListenerId>>,
}

/// Waveform renderer mounted into a surface
///
/// Cloning yields another handle to the same renderer.
#[derive(Clone)]
pub struct Renderer {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Renderer")
            .field("geometry", &state.geometry)
            .field("drag", &state.drag)
            .field("is_interacting", &state.is_interacting)
            .finish()
    }
}

impl Renderer {
    /// Mount into `container` and wire up input handling
    ///
    /// Fails with [`crate::WaveError::ContainerNotFound`] when the surface
    /// cannot resolve the container.
    pub fn new(
        container: Container,
        options: RenderOptions,
        surface: SharedSurface,
        scheduler: SharedScheduler,
    ) -> WaveResult<Self> {
        surface.borrow_mut().mount(&container)?;
        log::info!("Renderer: mounted into {}", container);

        let inertial = options.inertial_scroll;
        let shared = Rc::new(Shared {
            tiles: RefCell::new(TileRenderer::new(Rc::clone(&surface))),
            surface,
            scheduler,
            events: EventBus::new(),
            options: RefCell::new(options),
            state: RefCell::new(State::default()),
            scroll: RefCell::new(None),
            drag: RefCell::new(None),
            pointer: RefCell::new(None),
            tile_listener: Cell::new(None),
        });

        shared.apply_styles();
        if inertial {
            shared.enable_scroll();
        }
        shared.attach_pointer();
        Ok(Self { shared })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────

    pub fn on(&self, listener: impl FnMut(&RendererEvent) + 'static) -> ListenerId {
        self.shared.events.on(listener)
    }

    pub fn once(&self, listener: impl FnMut(&RendererEvent) + 'static) -> ListenerId {
        self.shared.events.once(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.events.off(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────

    /// Draw `audio` for the current options, replacing any previous render
    pub fn render(&self, audio: &AudioChannelData) {
        self.shared.render(audio);
    }

    /// Render again, keeping the cursor at the same screen position
    pub fn re_render(&self) {
        self.shared.re_render();
    }

    /// Move the cursor and keep it in view
    pub fn render_progress(&self, progress: f64, is_playing: bool) {
        self.shared.render_progress(progress, is_playing);
    }

    /// Write cursor and progress overlay; repeated values are skipped
    pub fn update_cursor_position(&self, progress: f64) {
        self.shared.update_cursor_position(progress);
    }

    /// Scroll so that `progress` is visible
    pub fn scroll_into_view(&self, progress: f64, is_playing: bool) {
        self.shared.scroll_into_view(clamp_progress(progress), is_playing);
    }

    /// Replace the options and re-render
    pub fn set_options(&self, options: RenderOptions) {
        self.shared.set_options(options);
    }

    pub fn options(&self) -> RenderOptions {
        self.shared.options.borrow().clone()
    }

    /// Change the zoom level (pixels per second) and re-render
    pub fn zoom(&self, min_px_per_sec: f64) {
        self.shared.options.borrow_mut().min_px_per_sec = min_px_per_sec.max(0.0);
        if self.shared.state.borrow().audio.is_none() {
            log::warn!("Renderer: zoom before any audio was rendered");
            return;
        }
        self.shared.re_render();
    }

    /// Host notification that the viewport may have been resized
    pub fn on_resize(&self) {
        self.shared.on_resize();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scrolling and geometry
    // ─────────────────────────────────────────────────────────────────────

    /// Screen rectangle of the content element
    pub fn wrapper_rect(&self) -> Rect {
        self.shared.surface.borrow().rect(Region::Wrapper)
    }

    /// Visible width of the scroll viewport
    pub fn width(&self) -> f64 {
        self.shared.surface.borrow().rect(Region::Scroll).width
    }

    /// Current scroll offset
    pub fn scroll(&self) -> f64 {
        self.shared.surface.borrow().scroll_left()
    }

    /// Full scrollable width
    pub fn scroll_width(&self) -> f64 {
        self.shared.surface.borrow().scroll_width()
    }

    /// Jump to a scroll offset
    pub fn set_scroll(&self, left: f64) {
        self.shared.apply_scroll(left, ScrollToOptions::immediate());
    }

    /// Jump to a share of the scrollable width
    pub fn set_scroll_percentage(&self, percent: f64) {
        let width = self.scroll_width();
        self.set_scroll(width * clamp_progress(percent));
    }

    /// Feed a wheel delta to the scroll controller
    pub fn wheel(&self, delta: f64) {
        let handled = self.shared.scroll.borrow().as_ref().map(|scroll| scroll.wheel(delta)).is_some();
        if !handled {
            let left = self.scroll();
            self.set_scroll(left + delta);
        }
    }

    pub fn geometry(&self) -> ViewportGeometry {
        self.shared.state.borrow().geometry
    }

    pub fn is_scrollable(&self) -> bool {
        self.shared.state.borrow().geometry.is_scrollable
    }

    // ─────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────

    pub fn is_dragging(&self) -> bool {
        self.shared.state.borrow().is_dragging()
    }

    pub fn is_interacting(&self) -> bool {
        self.shared.state.borrow().is_interacting
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.shared.state.borrow().drag
    }

    pub fn cursor_state(&self) -> CursorState {
        self.shared.state.borrow().cursor
    }

    /// Running auto-scroll, if any
    pub fn auto_scroll(&self) -> Option<AutoScroll> {
        self.shared.state.borrow().auto_scroll
    }

    /// Latest progress written to the cursor
    pub fn progress(&self) -> f64 {
        self.shared.state.borrow().real_time_progress
    }

    /// Scroll controller state, `None` when inertial scrolling is off
    pub fn scroll_state(&self) -> Option<ScrollState> {
        self.shared.scroll.borrow().as_ref().map(InertialScroll::state)
    }

    /// Number of tiles currently drawn
    pub fn drawn_tile_count(&self) -> usize {
        self.shared.tiles.borrow().drawn_tiles().len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Export and teardown
    // ─────────────────────────────────────────────────────────────────────

    /// Encode every drawn tile
    pub fn export_image(&self, format: &str, quality: u8, kind: ExportType) -> WaveResult<ExportedImages> {
        export_tiles(self.shared.tiles.borrow().drawn_tiles(), format, quality, kind)
    }

    /// Cancel all pending work, detach input and unmount
    pub fn destroy(&self) {
        self.shared.destroy();
    }
}

impl Shared {
    fn apply_styles(&self) {
        let options = self.options.borrow();
        let viewport_height = self.surface.borrow().rect(Region::Scroll).height;
        let mut surface = self.surface.borrow_mut();
        surface.set_cursor_style(CursorStyle {
            color: options.cursor_color,
            width: options.cursor_width,
        });
        surface.set_scrollbar_hidden(options.hide_scrollbar);
        surface.set_content_height(options.height.resolve(viewport_height));
    }

    fn enable_scroll(self: &Rc<Self>) {
        let config = self.options.borrow().scroll.clone();
        let controller = InertialScroll::new(Rc::clone(&self.surface), Rc::clone(&self.scheduler), config);
        let weak = Rc::downgrade(self);
        controller.on_scroll(move |tick| {
            if let Some(shared) = weak.upgrade() {
                shared.on_scroll_tick(tick);
            }
        });
        *self.scroll.borrow_mut() = Some(controller);
    }

    fn disable_scroll(&self) {
        let controller = self.scroll.borrow_mut().take();
        if let Some(controller) = controller {
            controller.destroy();
        }
    }

    fn attach_pointer(self: &Rc<Self>) {
        let Some(bus) = self.surface.borrow().pointer_events() else {
            log::warn!("Renderer: surface has no pointer events, input disabled");
            return;
        };
        let options = self.options.borrow().clone();

        // The drag tracker listens first so it can consume post-drag clicks
        if options.drag_to_seek {
            let target: Rc<dyn DragTarget> = Rc::new(SurfaceTarget {
                surface: Rc::downgrade(&self.surface),
                bus: bus.clone(),
            });
            let (on_start, on_drag, on_end) = (Rc::downgrade(self), Rc::downgrade(self), Rc::downgrade(self));
            let handlers = DragHandlers::new(move |step| {
                if let Some(shared) = on_drag.upgrade() {
                    shared.on_drag(step);
                }
            })
            .on_start(move |x, y| {
                if let Some(shared) = on_start.upgrade() {
                    shared.on_drag_start(x, y);
                }
            })
            .on_end(move |x, y| {
                if let Some(shared) = on_end.upgrade() {
                    shared.on_drag_end(x, y);
                }
            });
            *self.drag.borrow_mut() = Some(make_draggable(Some(target), handlers, options.drag));
        }

        let weak = Rc::downgrade(self);
        let id = bus.on(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_pointer(event);
            }
        });
        *self.pointer.borrow_mut() = Some((bus, id));
    }

    fn detach_pointer(&self) {
        let subscription = self.drag.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        let pointer = self.pointer.borrow_mut().take();
        if let Some((bus, id)) = pointer {
            bus.off(id);
        }
    }

    fn update_cursor_position(&self, progress: f64) {
        let progress = clamp_progress(progress);
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed || state.cursor.last_rendered_progress == Some(progress) {
                return;
            }
            state.cursor.last_rendered_progress = Some(progress);
        }
        let mut surface = self.surface.borrow_mut();
        surface.set_cursor(progress);
        surface.set_progress(progress);
    }

    /// Move the scroll offset through the controller, or directly without one
    fn apply_scroll(&self, left: f64, options: ScrollToOptions) {
        let handled = match self.scroll.borrow().as_ref() {
            Some(scroll) => {
                scroll.scroll_to(left, options);
                true
            }
            None => false,
        };
        if !handled {
            self.surface.borrow_mut().set_scroll_left(left);
            let tick = ScrollTick::measure(&*self.surface.borrow());
            self.on_scroll_tick(&tick);
        }
    }

    fn on_scroll_tick(&self, tick: &ScrollTick) {
        self.events.emit(&RendererEvent::Scroll {
            start: tick.start_ratio,
            end: tick.end_ratio,
            left: tick.left,
            right: tick.right,
        });

        // Auto-scroll recomputes progress itself
        let follow = {
            let state = self.state.borrow();
            match (state.drag.session(), state.auto_scroll) {
                (Some(session), None) => session.last_pointer_client_x,
                _ => None,
            }
        };
        if let Some(client_x) = follow {
            self.track_pointer(client_x);
        }
    }

    fn render(self: &Rc<Self>, audio: &AudioChannelData) {
        // Nothing scheduled for the previous render may run. A pending
        // cool-down ends here; a live drag is resumed after layout.
        let (previous, cooled_down) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            let cooled_down = state.interaction_timer.is_some();
            if cooled_down {
                state.is_interacting = false;
            }
            (state.take_handles(), cooled_down)
        };
        for handle in previous {
            self.scheduler.cancel(handle);
        }
        if cooled_down && !self.state.borrow().is_dragging() {
            if let Some(scroll) = self.scroll.borrow().as_ref() {
                scroll.start();
            }
        }
        if let Some(id) = self.tile_listener.take() {
            self.events.off(id);
        }

        let options = self.options.borrow().clone();
        let (viewport, surface_ratio, ids) = {
            let surface = self.surface.borrow();
            (surface.rect(Region::Scroll), surface.pixel_ratio(), surface.element_ids())
        };
        if viewport.width <= 0.0 {
            log::warn!("Renderer: viewport has no width, waveform will be empty");
        }

        let pixel_ratio = options.pixel_ratio.unwrap_or(surface_ratio).max(1.0);
        let geometry = ViewportGeometry::new(audio.duration(), options.min_px_per_sec, viewport.width, pixel_ratio);
        let fill = options.fill_parent && !geometry.is_scrollable;
        let content_width = if fill {
            viewport.width
        } else {
            geometry.total_content_width
        };

        {
            let mut surface = self.surface.borrow_mut();
            surface.set_wrapper_width(if fill {
                WrapperWidth::Fill
            } else {
                WrapperWidth::Px(content_width)
            });
        }
        self.apply_styles();

        let scroll_left = self.surface.borrow().scroll_left();
        let content_height = {
            let mut tiles = self.tiles.borrow_mut();
            tiles.begin(RenderContext {
                pixel_ratio,
                client_width: viewport.width,
                viewport_height: viewport.height,
                scroll_left,
                scrollable: geometry.is_scrollable,
                render_fn: options.render_function.clone(),
            });
            render_lanes(&mut tiles, audio, &options, content_width)
        };
        self.surface.borrow_mut().set_content_height(content_height);

        let progress = {
            let mut state = self.state.borrow_mut();
            state.audio = Some(audio.clone());
            state.geometry = geometry;
            state.last_width = viewport.width;
            state.cursor.last_rendered_progress = None;
            state.real_time_progress
        };
        log::debug!(
            "Renderer: render {:.2}s at {} px/s, width={:.0} scrollable={}",
            audio.duration(),
            options.min_px_per_sec,
            content_width,
            geometry.is_scrollable
        );

        if let Some(scroll) = self.scroll.borrow().as_ref() {
            scroll.configure(ScrollBinding {
                ids,
                config: options.scroll.clone(),
            });
        }
        self.update_cursor_position(progress);

        let weak = Rc::downgrade(self);
        let id = self.events.on(move |event| {
            if let RendererEvent::Scroll { left, .. } = event {
                if let Some(shared) = weak.upgrade() {
                    if let Ok(mut tiles) = shared.tiles.try_borrow_mut() {
                        tiles.on_scroll(*left);
                    }
                }
            }
        });
        self.tile_listener.set(Some(id));
        self.resume_drag();

        self.events.emit(&RendererEvent::Render);

        let weak = Rc::downgrade(self);
        let handle = self.scheduler.schedule(
            TaskKind::Timeout(Duration::ZERO),
            Box::new(move || {
                let Some(shared) = weak.upgrade() else { return };
                let live = {
                    let mut state = shared.state.borrow_mut();
                    state.rendered_task = None;
                    !state.destroyed
                };
                if live {
                    shared.events.emit(&RendererEvent::Rendered);
                }
            }),
        );
        self.state.borrow_mut().rendered_task = Some(handle);
    }

    fn re_render(self: &Rc<Self>) {
        let audio = self.state.borrow().audio.clone();
        let Some(audio) = audio else { return };

        let (old_width, old_right) = {
            let surface = self.surface.borrow();
            (surface.scroll_width(), surface.rect(Region::Progress).right())
        };

        self.render(&audio);

        let (new_width, new_right, left) = {
            let surface = self.surface.borrow();
            (
                surface.scroll_width(),
                surface.rect(Region::Progress).right(),
                surface.scroll_left(),
            )
        };
        if new_width != old_width {
            let delta = round_half_pixel(new_right - old_right);
            if delta != 0.0 {
                log::debug!("Renderer: width {:.0} -> {:.0}, shifting scroll by {}", old_width, new_width, delta);
                self.apply_scroll(left + delta, ScrollToOptions::immediate());
            }
        }
    }

    fn render_progress(&self, progress: f64, is_playing: bool) {
        let progress = clamp_progress(progress);
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed || state.is_dragging() {
                return;
            }
            state.real_time_progress = progress;
        }
        self.update_cursor_position(progress);

        let auto_scroll = self.options.borrow().auto_scroll;
        let scrollable = self.state.borrow().geometry.is_scrollable;
        if auto_scroll && scrollable {
            self.scroll_into_view(progress, is_playing);
        }
    }

    fn scroll_into_view(&self, progress: f64, is_playing: bool) {
        let (interacting, dragging) = {
            let state = self.state.borrow();
            (state.is_interacting, state.is_dragging())
        };
        if interacting && !is_playing {
            return;
        }

        let (left, scroll_width, client_width) = {
            let surface = self.surface.borrow();
            (
                surface.scroll_left(),
                surface.scroll_width(),
                surface.rect(Region::Scroll).width,
            )
        };
        let target = progress * scroll_width;
        let right = left + client_width;

        if dragging {
            if target > right + SCROLL_INTO_VIEW_BUFFER {
                self.apply_scroll(target - client_width + SCROLL_INTO_VIEW_BUFFER, ScrollToOptions::immediate());
            } else if target < left - SCROLL_INTO_VIEW_BUFFER {
                self.apply_scroll(target - SCROLL_INTO_VIEW_BUFFER, ScrollToOptions::immediate());
            }
            return;
        }

        let auto_center = self.options.borrow().auto_center;
        let middle = client_width / 2.0;
        if target < left || target > right {
            let offset = if auto_center { middle } else { 0.0 };
            self.apply_scroll(target - offset, ScrollToOptions::default());
            return;
        }

        let center = target - left - middle;
        if is_playing && auto_center && center > 0.0 {
            self.apply_scroll(left + center.min(AUTO_CENTER_STEP), ScrollToOptions::immediate());
        }
    }

    fn set_options(self: &Rc<Self>, options: RenderOptions) {
        let previous = std::mem::replace(&mut *self.options.borrow_mut(), options.clone());
        self.apply_styles();

        if previous.inertial_scroll != options.inertial_scroll {
            if options.inertial_scroll {
                self.enable_scroll();
            } else {
                self.disable_scroll();
            }
        }
        if previous.drag_to_seek != options.drag_to_seek || previous.drag != options.drag {
            self.detach_pointer();
            self.attach_pointer();
        }

        let has_audio = self.state.borrow().audio.is_some();
        if has_audio {
            self.re_render();
        }
    }

    fn on_resize(self: &Rc<Self>) {
        let previous = self.state.borrow_mut().resize_task.take();
        if let Some(handle) = previous {
            self.scheduler.cancel(handle);
        }
        let weak = Rc::downgrade(self);
        let handle = self.scheduler.schedule(
            TaskKind::Idle,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_resize();
                }
            }),
        );
        self.state.borrow_mut().resize_task = Some(handle);
    }

    fn handle_resize(self: &Rc<Self>) {
        let width = self.surface.borrow().rect(Region::Scroll).width;
        let auto_height = self.options.borrow().height == Height::Auto;
        let (unchanged, has_audio) = {
            let mut state = self.state.borrow_mut();
            state.resize_task = None;
            if state.destroyed {
                return;
            }
            (state.last_width == width, state.audio.is_some())
        };
        if unchanged && !auto_height {
            return;
        }
        if !has_audio {
            self.state.borrow_mut().last_width = width;
            return;
        }
        self.re_render();
        self.events.emit(&RendererEvent::Resize);
    }

    fn destroy(&self) {
        let handles = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.drag = DragPhase::Idle;
            state.cursor.is_dragging = false;
            state.take_handles()
        };
        for handle in handles {
            self.scheduler.cancel(handle);
        }

        self.detach_pointer();
        self.disable_scroll();
        if let Some(id) = self.tile_listener.take() {
            self.events.off(id);
        }
        self.tiles.borrow_mut().clear();
        self.events.clear();
        self.surface.borrow_mut().unmount();
        log::info!("Renderer: destroyed");
    }
}

/// Hand every lane of `audio` to the tile renderer. Returns the content height.
fn render_lanes(tiles: &mut TileRenderer, audio: &AudioChannelData, options: &RenderOptions, total_width: f64) -> f64 {
    let channels: Vec<Arc<[f32]>> = (0..audio.channel_count())
        .filter_map(|i| audio.channel_arc(i))
        .collect();
    if channels.is_empty() {
        return 0.0;
    }

    let Some(split) = &options.split_channels else {
        return tiles.render_lane(LaneRequest {
            channels,
            style: options.lane_style(None),
            top: 0.0,
            total_width,
        });
    };

    let mut next_top: f64 = 0.0;
    let mut previous_top = 0.0;
    for (index, channel) in channels.into_iter().enumerate() {
        let overrides = split.get(index);
        let overlay = index > 0 && overrides.is_some_and(|o| o.overlay);
        let top = if overlay { previous_top } else { next_top };
        let height = tiles.render_lane(LaneRequest {
            channels: vec![channel],
            style: options.lane_style(overrides),
            top,
            total_width,
        });
        previous_top = top;
        next_top = next_top.max(top + height);
    }
    next_top
}
