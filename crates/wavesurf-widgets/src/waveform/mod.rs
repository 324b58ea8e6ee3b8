//! Waveform widget: a [`Renderer`] hosted in an iced canvas
//!
//! [`WaveformView`] owns the engine side (renderer, scheduler, surface). The
//! application keeps it in its state, routes [`WaveformMessage`]s from the
//! canvas into [`WaveformView::handle`] and calls [`WaveformView::tick`] from
//! a frame subscription. Renderer events are queued and drained with
//! [`WaveformView::take_events`].

mod canvas;
mod view;

pub use canvas::{CanvasInteraction, WaveformCanvas};
pub use view::waveform_view;

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use iced::Rectangle;
use wavesurf_core::{
    AudioChannelData, CooperativeScheduler, EventBus, ExportType, ExportedImages, Height, PointerButton,
    PointerEvent, PointerKind, Rect, RenderOptions, Renderer, RendererEvent, SharedSurface, WaveResult,
};

use crate::surface::IcedSurface;

/// Host name the renderer mounts into
pub const HOST: &str = "waveform";

/// One pointer event as seen by the canvas, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
    pub button: PointerButton,
}

/// Messages produced by the waveform canvas
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformMessage {
    /// Canvas bounds changed
    Bounds(Rectangle),
    /// Pointer events in delivery order
    Pointer {
        bounds: Rectangle,
        events: Vec<PointerInput>,
    },
    /// Wheel delta in pixels (positive scrolls right)
    Wheel(f32),
}

fn to_rect(bounds: Rectangle) -> Rect {
    Rect::new(
        bounds.x as f64,
        bounds.y as f64,
        bounds.width as f64,
        bounds.height as f64,
    )
}

/// Engine state behind one waveform canvas
pub struct WaveformView {
    surface: Rc<RefCell<IcedSurface>>,
    scheduler: CooperativeScheduler,
    renderer: Renderer,
    pointer: EventBus<PointerEvent>,
    epoch: Instant,
    last_tick: Option<Instant>,
    queued: Rc<RefCell<Vec<RendererEvent>>>,
}

impl std::fmt::Debug for WaveformView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformView")
            .field("renderer", &self.renderer)
            .field("queued", &self.queued.borrow().len())
            .finish()
    }
}

impl WaveformView {
    pub fn new(options: RenderOptions) -> WaveResult<Self> {
        let surface = Rc::new(RefCell::new(IcedSurface::new(HOST)));
        let scheduler = CooperativeScheduler::new();
        let shared: SharedSurface = surface.clone();
        let renderer = Renderer::new(HOST.into(), options, shared, Rc::new(scheduler.clone()))?;
        let pointer = surface.borrow().pointer_bus();

        let queued = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&queued);
        renderer.on(move |event| sink.borrow_mut().push(*event));

        Ok(Self {
            surface,
            scheduler,
            renderer,
            pointer,
            epoch: Instant::now(),
            last_tick: None,
            queued,
        })
    }

    /// Render new audio
    pub fn load(&self, audio: &AudioChannelData) {
        self.renderer.render(audio);
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Surface state for drawing
    pub fn surface(&self) -> Ref<'_, IcedSurface> {
        self.surface.borrow()
    }

    /// Playback progress from the player
    pub fn set_progress(&self, progress: f64, is_playing: bool) {
        self.renderer.render_progress(progress, is_playing);
    }

    pub fn zoom(&self, px_per_sec: f64) {
        self.renderer.zoom(px_per_sec);
    }

    pub fn export(&self, format: &str, quality: u8, kind: ExportType) -> WaveResult<ExportedImages> {
        self.renderer.export_image(format, quality, kind)
    }

    /// Widget height for the current options
    ///
    /// `None` means the widget should fill its parent.
    pub fn height(&self) -> Option<f32> {
        if self.renderer.options().height == Height::Auto {
            return None;
        }
        let surface = self.surface.borrow();
        let content = surface.content_height().max(1.0) as f32;
        let scrollbar = if surface.scrollbar_hidden() || !self.renderer.is_scrollable() {
            0.0
        } else {
            crate::theme::SCROLLBAR_HEIGHT
        };
        Some(content + scrollbar)
    }

    /// Advance timers and run one frame of engine work
    pub fn tick(&mut self, now: Instant) {
        let dt = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_tick = Some(now);
        self.scheduler.tick(dt);
    }

    /// Apply a canvas message
    pub fn handle(&mut self, message: WaveformMessage) {
        match message {
            WaveformMessage::Bounds(bounds) => self.apply_bounds(bounds),
            WaveformMessage::Pointer { bounds, events } => {
                self.apply_bounds(bounds);
                let timestamp_ms = self.epoch.elapsed().as_secs_f64() * 1000.0;
                for input in events {
                    let event = PointerEvent::new(input.kind, input.x as f64, input.y as f64, timestamp_ms)
                        .with_button(input.button);
                    self.pointer.emit(&event);
                }
            }
            WaveformMessage::Wheel(delta) => self.renderer.wheel(delta as f64),
        }
    }

    fn apply_bounds(&mut self, bounds: Rectangle) {
        let changed = self.surface.borrow_mut().set_viewport(to_rect(bounds));
        if changed {
            log::debug!("WaveformView: bounds {:?}", bounds);
            self.renderer.on_resize();
        }
    }

    /// Renderer events since the last call
    pub fn take_events(&self) -> Vec<RendererEvent> {
        std::mem::take(&mut *self.queued.borrow_mut())
    }
}

impl Drop for WaveformView {
    fn drop(&mut self) {
        self.renderer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> WaveformView {
        let options = RenderOptions {
            min_px_per_sec: 100.0,
            ..RenderOptions::default()
        };
        let mut view = WaveformView::new(options).unwrap();
        view.handle(WaveformMessage::Bounds(Rectangle::new(
            iced::Point::new(0.0, 0.0),
            iced::Size::new(500.0, 128.0),
        )));
        view.load(&AudioChannelData::new(vec![vec![0.5; 1000]], 10.0));
        view
    }

    #[test]
    fn test_render_reaches_the_canvas_surface() {
        let view = loaded();
        assert!(view.renderer().is_scrollable());
        assert_eq!(view.surface().content_width(), 1000.0);
        assert!(!view.surface().tiles().is_empty());
        assert_eq!(view.take_events(), vec![RendererEvent::Render]);
        assert!(view.take_events().is_empty());
    }

    #[test]
    fn test_pointer_batch_drives_seek() {
        let mut view = loaded();
        let bounds = view.surface().viewport();
        let bounds = Rectangle::new(
            iced::Point::new(bounds.left as f32, bounds.top as f32),
            iced::Size::new(bounds.width as f32, bounds.height as f32),
        );
        let input = |kind, x| PointerInput {
            kind,
            x,
            y: 10.0,
            button: PointerButton::Primary,
        };
        view.handle(WaveformMessage::Pointer {
            bounds,
            events: vec![input(PointerKind::Down, 200.0), input(PointerKind::Move, 300.0)],
        });
        assert!(view.renderer().is_dragging());
        assert_eq!(view.surface().cursor(), 0.3);
    }

    #[test]
    fn test_resize_rerenders_on_tick() {
        let mut view = loaded();
        view.take_events();
        view.handle(WaveformMessage::Bounds(Rectangle::new(
            iced::Point::new(0.0, 0.0),
            iced::Size::new(800.0, 128.0),
        )));
        view.tick(Instant::now());
        assert!(view.take_events().contains(&RendererEvent::Resize));
        assert_eq!(view.renderer().width(), 800.0);
    }

    #[test]
    fn test_pixel_ratio_option_sharpens_tiles() {
        let options = RenderOptions {
            min_px_per_sec: 100.0,
            pixel_ratio: Some(2.0),
            ..RenderOptions::default()
        };
        let mut view = WaveformView::new(options).unwrap();
        view.handle(WaveformMessage::Bounds(Rectangle::new(
            iced::Point::new(0.0, 0.0),
            iced::Size::new(500.0, 128.0),
        )));
        view.load(&AudioChannelData::new(vec![vec![0.5; 1000]], 10.0));
        let surface = view.surface();
        let tile = &surface.tiles()[0].tile;
        assert!((tile.waveform.width() as f64 - tile.width * 2.0).abs() <= 1.0);
    }

    #[test]
    fn test_fixed_height_includes_scrollbar() {
        let view = loaded();
        assert_eq!(view.height(), Some(128.0 + crate::theme::SCROLLBAR_HEIGHT));
    }
}
