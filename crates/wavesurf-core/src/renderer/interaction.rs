//! Pointer input: clicks, drag-to-seek and edge auto-scroll

use std::ops::ControlFlow;
use std::rc::Rc;

use super::state::{
    edge_zone, AutoScroll, DragPhase, DragSession, AUTO_SCROLL_MAX_SPEED, AUTO_SCROLL_RAMP_MAX,
    AUTO_SCROLL_RAMP_START, AUTO_SCROLL_RAMP_STEP, INTERACTION_COOLDOWN,
};
use super::Shared;
use crate::drag::{DragMove, PointerEvent, PointerKind};
use crate::events::RendererEvent;
use crate::scheduler::TaskKind;
use crate::scroll::ScrollToOptions;
use crate::surface::Region;
use crate::types::clamp_progress;

/// Position of `client` inside a span starting at `start`, as a ratio
fn relative(client: f64, start: f64, length: f64) -> f64 {
    if length > 0.0 {
        clamp_progress((client - start) / length)
    } else {
        0.0
    }
}

impl Shared {
    pub(super) fn on_pointer(self: &Rc<Self>, event: &PointerEvent) {
        match event.kind {
            PointerKind::Down => {
                if event.button != self.options.borrow().drag.button {
                    return;
                }
                let timer = {
                    let mut state = self.state.borrow_mut();
                    state.is_interacting = true;
                    if state.drag == DragPhase::Idle {
                        state.drag = DragPhase::Pending;
                    }
                    state.interaction_timer.take()
                };
                if let Some(handle) = timer {
                    self.scheduler.cancel(handle);
                }
            }
            PointerKind::Up | PointerKind::Cancel | PointerKind::Leave => {
                let (interacting, previous) = {
                    let mut state = self.state.borrow_mut();
                    if state.drag == DragPhase::Pending {
                        state.drag = DragPhase::Idle;
                    }
                    (state.is_interacting, state.interaction_timer.take())
                };
                if let Some(handle) = previous {
                    self.scheduler.cancel(handle);
                }
                if interacting {
                    self.schedule_interaction_end();
                }
            }
            PointerKind::Click | PointerKind::DoubleClick => {
                if event.is_consumed() {
                    return;
                }
                let wrapper = self.surface.borrow().rect(Region::Wrapper);
                let x = relative(event.client_x, wrapper.left, wrapper.width);
                let y = relative(event.client_y, wrapper.top, wrapper.height);
                let out = if event.kind == PointerKind::Click {
                    RendererEvent::Click { x, y }
                } else {
                    RendererEvent::DoubleClick { x, y }
                };
                self.events.emit(&out);
            }
            PointerKind::Move => {}
        }
    }

    fn schedule_interaction_end(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let handle = self.scheduler.schedule(
            TaskKind::Timeout(INTERACTION_COOLDOWN),
            Box::new(move || {
                let Some(shared) = weak.upgrade() else { return };
                let dragging = {
                    let mut state = shared.state.borrow_mut();
                    state.interaction_timer = None;
                    state.is_interacting = false;
                    state.is_dragging()
                };
                if !dragging {
                    if let Some(scroll) = shared.scroll.borrow().as_ref() {
                        scroll.start();
                    }
                }
            }),
        );
        self.state.borrow_mut().interaction_timer = Some(handle);
    }

    pub(super) fn on_drag_start(self: &Rc<Self>, x: f64, y: f64) {
        let (wrapper, viewport) = {
            let surface = self.surface.borrow();
            (surface.rect(Region::Wrapper), surface.rect(Region::Scroll))
        };
        let progress = relative(x, 0.0, wrapper.width);
        {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.drag = DragPhase::Dragging(DragSession {
                origin_x: x,
                origin_y: y,
                current_progress: progress,
                last_pointer_client_x: Some(wrapper.left + x),
                velocity: 0.0,
                wrapper,
                viewport,
                active: true,
            });
            state.cursor.is_dragging = true;
            state.is_interacting = true;
            state.real_time_progress = progress;
        }
        log::debug!("Renderer: seek drag started at {:.3}", progress);

        if let Some(scroll) = self.scroll.borrow().as_ref() {
            scroll.stop();
        }
        self.update_cursor_position(progress);
        self.events.emit(&RendererEvent::DragStart(progress));
    }

    pub(super) fn on_drag(self: &Rc<Self>, step: DragMove) {
        let progress = {
            let mut state = self.state.borrow_mut();
            let Some(session) = state.drag.session_mut() else {
                return;
            };
            let progress = relative(step.x, 0.0, session.wrapper.width);
            session.current_progress = progress;
            session.last_pointer_client_x = Some(step.client_x);
            session.velocity = step.velocity;
            state.real_time_progress = progress;
            progress
        };

        self.update_cursor_position(progress);
        self.ensure_cursor_loop();
        self.events.emit(&RendererEvent::Drag(progress));
        self.update_auto_scroll(step.client_x);
    }

    pub(super) fn on_drag_end(self: &Rc<Self>, x: f64, _y: f64) {
        let (progress, handles) = {
            let mut state = self.state.borrow_mut();
            let Some(session) = state.drag.session() else {
                return;
            };
            let progress = relative(x, 0.0, session.wrapper.width);
            state.drag = DragPhase::Idle;
            state.cursor.is_dragging = false;
            state.real_time_progress = progress;
            let handles = [state.cursor_loop.take(), state.auto_scroll.take().map(|a| a.handle)];
            (progress, handles)
        };
        for handle in handles.into_iter().flatten() {
            self.scheduler.cancel(handle);
        }
        log::debug!("Renderer: seek drag ended at {:.3}", progress);

        self.update_cursor_position(progress);
        self.events.emit(&RendererEvent::DragEnd(progress));
    }

    /// Rebind a drag that outlived a render to the new layout
    pub(super) fn resume_drag(self: &Rc<Self>) {
        let (wrapper, viewport) = {
            let surface = self.surface.borrow();
            (surface.rect(Region::Wrapper), surface.rect(Region::Scroll))
        };
        let client_x = {
            let mut state = self.state.borrow_mut();
            let Some(session) = state.drag.session_mut() else {
                return;
            };
            session.wrapper = wrapper;
            session.viewport = viewport;
            session.last_pointer_client_x
        };
        self.ensure_cursor_loop();
        if let Some(client_x) = client_x {
            self.update_auto_scroll(client_x);
        }
    }

    /// Re-apply the latest progress once per frame while dragging
    fn ensure_cursor_loop(self: &Rc<Self>) {
        if self.state.borrow().cursor_loop.is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let handle = self.scheduler.schedule_repeating(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            let progress = {
                let mut state = shared.state.borrow_mut();
                if !state.is_dragging() || state.destroyed {
                    state.cursor_loop = None;
                    return ControlFlow::Break(());
                }
                state.real_time_progress
            };
            shared.update_cursor_position(progress);
            ControlFlow::Continue(())
        }));
        self.state.borrow_mut().cursor_loop = Some(handle);
    }

    /// Start, retarget or stop edge auto-scroll for a pointer at `client_x`
    fn update_auto_scroll(self: &Rc<Self>, client_x: f64) {
        let zone = {
            let state = self.state.borrow();
            match state.drag.session() {
                Some(session) if state.geometry.is_scrollable => edge_zone(session.viewport, client_x),
                _ => None,
            }
        };

        let Some((direction, proximity)) = zone else {
            self.stop_auto_scroll();
            return;
        };

        {
            let mut state = self.state.borrow_mut();
            if let Some(auto) = state.auto_scroll.as_mut() {
                if auto.direction == direction {
                    auto.proximity = proximity;
                    return;
                }
            }
        }
        self.stop_auto_scroll();

        let weak = Rc::downgrade(self);
        let handle = self.scheduler.schedule_repeating(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            shared.auto_scroll_frame()
        }));
        log::debug!("Renderer: auto-scroll {}", if direction < 0.0 { "left" } else { "right" });
        self.state.borrow_mut().auto_scroll = Some(AutoScroll {
            handle,
            direction,
            proximity,
            speed_factor: AUTO_SCROLL_RAMP_START,
        });
    }

    fn stop_auto_scroll(&self) {
        let previous = self.state.borrow_mut().auto_scroll.take();
        if let Some(auto) = previous {
            self.scheduler.cancel(auto.handle);
        }
    }

    fn auto_scroll_frame(&self) -> ControlFlow<()> {
        let (step, client_x) = {
            let mut state = self.state.borrow_mut();
            let client_x = state.drag.session().and_then(|s| s.last_pointer_client_x);
            let (Some(client_x), false) = (client_x, state.destroyed) else {
                state.auto_scroll = None;
                return ControlFlow::Break(());
            };
            let Some(auto) = state.auto_scroll.as_mut() else {
                return ControlFlow::Break(());
            };
            let speed = (AUTO_SCROLL_MAX_SPEED * auto.proximity * auto.speed_factor).max(1.0);
            auto.speed_factor = (auto.speed_factor + AUTO_SCROLL_RAMP_STEP).min(AUTO_SCROLL_RAMP_MAX);
            (auto.direction * speed, client_x)
        };

        let left = self.surface.borrow().scroll_left();
        self.apply_scroll(left + step, ScrollToOptions::immediate());
        self.track_pointer(client_x);
        ControlFlow::Continue(())
    }

    /// Recompute the seek position of a pointer held still while content moves
    pub(super) fn track_pointer(&self, client_x: f64) {
        let wrapper = self.surface.borrow().rect(Region::Wrapper);
        if wrapper.width <= 0.0 {
            return;
        }
        let progress = relative(client_x, wrapper.left, wrapper.width);
        let changed = {
            let mut state = self.state.borrow_mut();
            let Some(session) = state.drag.session_mut() else {
                return;
            };
            let changed = session.current_progress != progress;
            session.current_progress = progress;
            state.real_time_progress = progress;
            changed
        };
        self.update_cursor_position(progress);
        if changed {
            self.events.emit(&RendererEvent::Drag(progress));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    use crate::events::EventBus;
    use crate::options::RenderOptions;
    use crate::renderer::Renderer;
    use crate::scheduler::CooperativeScheduler;
    use crate::surface::{HeadlessSurface, SharedSurface, SurfaceProvider};
    use crate::types::{AudioChannelData, Rect};

    struct Harness {
        surface: Rc<RefCell<HeadlessSurface>>,
        scheduler: CooperativeScheduler,
        renderer: Renderer,
        pointer: EventBus<PointerEvent>,
        events: Rc<RefCell<Vec<RendererEvent>>>,
    }

    impl Harness {
        /// Ten seconds of audio at `px_per_sec` in a 500px viewport
        fn new(px_per_sec: f64) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let surface = Rc::new(RefCell::new(HeadlessSurface::new(Rect::new(0.0, 0.0, 500.0, 128.0))));
            let scheduler = CooperativeScheduler::new();
            let shared: SharedSurface = surface.clone();
            let options = RenderOptions {
                min_px_per_sec: px_per_sec,
                ..RenderOptions::default()
            };
            let renderer = Renderer::new("#waveform".into(), options, shared, Rc::new(scheduler.clone())).unwrap();
            let samples = (0..10_000).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
            renderer.render(&AudioChannelData::new(vec![samples], 10.0));

            let events = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&events);
            renderer.on(move |event| sink.borrow_mut().push(*event));
            let pointer = surface.borrow().pointer_bus();
            Self {
                surface,
                scheduler,
                renderer,
                pointer,
                events,
            }
        }

        fn send(&self, kind: PointerKind, x: f64, t: f64) {
            self.pointer.emit(&PointerEvent::new(kind, x, 64.0, t));
        }

        fn scroll_left(&self) -> f64 {
            self.surface.borrow().scroll_left()
        }

        fn cursor_screen_x(&self) -> f64 {
            self.surface.borrow().rect(Region::Cursor).left
        }

        /// Drag-related events seen so far
        fn drags(&self) -> Vec<RendererEvent> {
            self.events
                .borrow()
                .iter()
                .copied()
                .filter(|e| {
                    matches!(
                        e,
                        RendererEvent::DragStart(_) | RendererEvent::Drag(_) | RendererEvent::DragEnd(_)
                    )
                })
                .collect()
        }
    }

    #[test]
    fn test_relative_is_clamped() {
        assert_eq!(relative(150.0, 100.0, 200.0), 0.25);
        assert_eq!(relative(50.0, 100.0, 200.0), 0.0);
        assert_eq!(relative(400.0, 100.0, 200.0), 1.0);
        assert_eq!(relative(150.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn test_drag_seeks_relative_to_scrolled_content() {
        let h = Harness::new(100.0);
        assert_eq!(h.renderer.geometry().total_content_width, 1000.0);
        assert!(h.renderer.is_scrollable());

        h.renderer.set_scroll(250.0);
        assert_eq!(h.scroll_left(), 250.0);

        h.send(PointerKind::Down, 200.0, 0.0);
        assert_eq!(h.renderer.drag_phase(), DragPhase::Pending);
        h.send(PointerKind::Move, 250.0, 20.0);
        assert!(h.renderer.is_dragging());
        assert_eq!(h.drags(), vec![RendererEvent::DragStart(0.45), RendererEvent::Drag(0.5)]);
        assert_eq!(h.surface.borrow().cursor(), 0.5);

        h.send(PointerKind::Up, 250.0, 40.0);
        assert!(!h.renderer.is_dragging());
        assert_eq!(h.drags().last(), Some(&RendererEvent::DragEnd(0.5)));
        assert!(h.renderer.auto_scroll().is_none());
    }

    #[test]
    fn test_click_reports_relative_position() {
        let h = Harness::new(40.0);
        h.send(PointerKind::Click, 100.0, 0.0);
        assert_eq!(h.events.borrow().last(), Some(&RendererEvent::Click { x: 0.2, y: 0.5 }));

        h.send(PointerKind::DoubleClick, 500.0, 0.0);
        assert_eq!(h.events.borrow().last(), Some(&RendererEvent::DoubleClick { x: 1.0, y: 0.5 }));
    }

    #[test]
    fn test_click_right_after_drag_is_swallowed() {
        let h = Harness::new(40.0);
        h.send(PointerKind::Down, 100.0, 0.0);
        h.send(PointerKind::Move, 200.0, 20.0);
        h.send(PointerKind::Up, 200.0, 40.0);
        h.send(PointerKind::Click, 200.0, 45.0);
        let clicks = h
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, RendererEvent::Click { .. }))
            .count();
        assert_eq!(clicks, 0);
    }

    #[test]
    fn test_interaction_cools_down_after_release() {
        let h = Harness::new(100.0);
        h.send(PointerKind::Down, 200.0, 0.0);
        assert!(h.renderer.is_interacting());
        h.send(PointerKind::Up, 200.0, 10.0);
        assert!(h.renderer.is_interacting());
        assert_eq!(h.renderer.drag_phase(), DragPhase::Idle);

        h.scheduler.advance(Duration::from_millis(499));
        assert!(h.renderer.is_interacting());
        h.scheduler.advance(Duration::from_millis(2));
        assert!(!h.renderer.is_interacting());
    }

    #[test]
    fn test_progress_does_not_scroll_while_interacting() {
        let h = Harness::new(100.0);
        h.send(PointerKind::Down, 200.0, 0.0);
        h.renderer.render_progress(0.9, false);
        h.scheduler.run_frames(30);
        assert_eq!(h.scroll_left(), 0.0);
        assert_eq!(h.surface.borrow().cursor(), 0.9);
    }

    #[test]
    fn test_edge_auto_scroll_starts_and_stops() {
        let h = Harness::new(100.0);
        h.renderer.set_scroll(250.0);
        h.send(PointerKind::Down, 200.0, 0.0);
        h.send(PointerKind::Move, 50.0, 20.0);

        let auto = h.renderer.auto_scroll().expect("auto-scroll running");
        assert_eq!(auto.direction, -1.0);
        assert_eq!(auto.proximity, 0.5);

        h.scheduler.run_frame();
        // 20 px * proximity 0.5 * initial ramp 0.3
        assert_eq!(h.scroll_left(), 247.0);
        let seek = h.renderer.progress();
        assert_eq!(seek, (50.0 + 247.0) / 1000.0);
        assert_eq!(h.drags().last(), Some(&RendererEvent::Drag(seek)));

        h.scheduler.run_frames(4);
        assert!(h.scroll_left() < 247.0);

        h.send(PointerKind::Move, 250.0, 200.0);
        assert!(h.renderer.auto_scroll().is_none());
        let settled = h.scroll_left();
        h.scheduler.run_frames(5);
        assert_eq!(h.scroll_left(), settled);
    }

    #[test]
    fn test_auto_scroll_ramps_toward_full_speed() {
        let h = Harness::new(100.0);
        h.renderer.set_scroll(500.0);
        h.send(PointerKind::Down, 200.0, 0.0);
        h.send(PointerKind::Move, 0.0, 20.0);

        h.scheduler.run_frame();
        let first = 500.0 - h.scroll_left();
        h.scheduler.run_frames(20);
        let before = h.scroll_left();
        h.scheduler.run_frame();
        let later = before - h.scroll_left();
        assert_eq!(first, AUTO_SCROLL_MAX_SPEED * AUTO_SCROLL_RAMP_START);
        assert!(later > first);
        assert!(later <= AUTO_SCROLL_MAX_SPEED);
    }

    #[test]
    fn test_no_auto_scroll_when_content_fits() {
        let h = Harness::new(40.0);
        assert!(!h.renderer.is_scrollable());
        h.send(PointerKind::Down, 200.0, 0.0);
        h.send(PointerKind::Move, 20.0, 20.0);
        assert!(h.renderer.is_dragging());
        assert!(h.renderer.auto_scroll().is_none());
        h.scheduler.run_frames(3);
        assert_eq!(h.scroll_left(), 0.0);
    }

    #[test]
    fn test_zoom_keeps_cursor_on_screen_position() {
        let h = Harness::new(100.0);
        h.renderer.set_scroll(200.0);
        h.renderer.render_progress(0.3, false);
        let before = h.cursor_screen_x();
        assert_eq!(before, 100.0);

        h.renderer.zoom(200.0);
        assert_eq!(h.renderer.scroll_width(), 2000.0);
        assert!((h.cursor_screen_x() - before).abs() <= 1.0);

        h.renderer.zoom(100.0);
        assert_eq!(h.renderer.scroll_width(), 1000.0);
        assert!((h.cursor_screen_x() - before).abs() <= 1.0);
    }

    #[test]
    fn test_cursor_loop_ends_with_drag() {
        let h = Harness::new(100.0);
        let baseline = h.scheduler.repeating_count();
        h.send(PointerKind::Down, 200.0, 0.0);
        h.send(PointerKind::Move, 250.0, 20.0);
        assert_eq!(h.scheduler.repeating_count(), baseline + 1);
        h.send(PointerKind::Up, 250.0, 40.0);
        assert_eq!(h.scheduler.repeating_count(), baseline);
    }

    #[test]
    fn test_export_covers_drawn_tiles() {
        let h = Harness::new(100.0);
        let images = h
            .renderer
            .export_image("image/png", 100, crate::export::ExportType::Blob)
            .unwrap();
        assert_eq!(images.len(), h.renderer.drawn_tile_count());
        assert!(!images.is_empty());

        h.renderer.destroy();
        let err = h
            .renderer
            .export_image("image/png", 100, crate::export::ExportType::Blob)
            .unwrap_err();
        assert!(matches!(err, crate::WaveError::NoData));
    }
}
