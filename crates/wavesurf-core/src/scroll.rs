//! Inertial scroll controller
//!
//! Owns the horizontal scroll offset of the surface. Two offsets are kept:
//!
//! - the **target** (immediate) offset, where scrolling is heading
//! - the **current** (animated) offset, what is actually on screen
//!
//! A per-frame loop advances current toward target, either by a fixed lerp
//! factor per frame (`current += (target - current) * lerp`) or by a
//! time-based ease-out-expo tween, writes the result to the surface and
//! publishes a [`ScrollTick`] whenever the visible offset moved.
//!
//! Immediate jumps bypass the easing and are written straight away, which is
//! what auto-scroll during a drag relies on: it moves the content and then
//! measures the live wrapper rectangle in the same frame.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::{EventBus, ListenerId};
use crate::scheduler::{Scheduler, SharedScheduler, TaskHandle};
use crate::surface::{ElementId, Region, SharedSurface, SurfaceProvider};

/// Offsets closer than this to their target snap onto it
const SETTLE_EPSILON: f64 = 0.5;

/// Scroll easing tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Fraction of the remaining distance covered per frame
    pub lerp: f64,
    /// Scale applied to wheel deltas
    pub wheel_multiplier: f64,
    /// When set, eased scrolls use a tween of this length instead of lerp
    pub duration_ms: Option<u64>,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            lerp: 0.1,
            wheel_multiplier: 1.0,
            duration_ms: None,
        }
    }
}

/// How a single `scroll_to` call should move
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollToOptions {
    pub lerp: Option<f64>,
    pub duration: Option<Duration>,
    /// Jump without easing (applies even while stopped)
    pub immediate: bool,
}

impl ScrollToOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn with_lerp(lerp: f64) -> Self {
        Self {
            lerp: Some(lerp),
            ..Self::default()
        }
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }
}

/// Published on every frame that moved the visible offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTick {
    /// Left edge as a ratio of the scrollable width
    pub start_ratio: f64,
    /// Right edge as a ratio of the scrollable width
    pub end_ratio: f64,
    /// Left edge in pixels
    pub left: f64,
    /// Right edge in pixels
    pub right: f64,
}

impl ScrollTick {
    pub(crate) fn measure(surface: &dyn SurfaceProvider) -> Self {
        let left = surface.scroll_left();
        let visible = surface.rect(Region::Scroll).width;
        let width = surface.scroll_width();
        let (start_ratio, end_ratio) = if width > 0.0 {
            (left / width, (left + visible) / width)
        } else {
            (0.0, 1.0)
        };
        Self {
            start_ratio,
            end_ratio,
            left,
            right: left + visible,
        }
    }
}

/// Snapshot of the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    pub immediate_offset: f64,
    pub animated_offset: f64,
    pub is_user_interacting: bool,
    pub is_animating: bool,
}

// =============================================================================
// InertialOffset
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Animation {
    Idle,
    Lerp(f64),
    Tween {
        from: f64,
        start: Duration,
        duration: Duration,
    },
}

/// Target offset plus an eased current offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertialOffset {
    target: f64,
    current: f64,
    animation: Animation,
}

/// Exponential ease-out, `t` in [0, 1]
fn ease_out_expo(t: f64) -> f64 {
    if t >= 1.0 {
        1.0
    } else {
        1.0 - 2f64.powf(-10.0 * t)
    }
}

impl InertialOffset {
    pub fn new(offset: f64) -> Self {
        Self {
            target: offset,
            current: offset,
            animation: Animation::Idle,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn is_animating(&self) -> bool {
        self.animation != Animation::Idle
    }

    /// Jump to `offset`, cancelling any animation
    pub fn snap(&mut self, offset: f64) {
        self.target = offset;
        self.current = offset;
        self.animation = Animation::Idle;
    }

    /// Ease toward `target` by `lerp` per frame
    pub fn ease_to(&mut self, target: f64, lerp: f64) {
        self.target = target;
        self.animation = Animation::Lerp(lerp.clamp(f64::EPSILON, 1.0));
    }

    /// Tween toward `target`, starting at `now`
    pub fn tween_to(&mut self, target: f64, now: Duration, duration: Duration) {
        self.target = target;
        self.animation = Animation::Tween {
            from: self.current,
            start: now,
            duration: duration.max(Duration::from_millis(1)),
        };
    }

    /// Keep the target inside `[0, max]`
    pub fn clamp_target(&mut self, max: f64) {
        self.target = self.target.clamp(0.0, max.max(0.0));
    }

    /// Advance one frame. Returns true when the current offset moved.
    pub fn update(&mut self, now: Duration) -> bool {
        let before = self.current;
        match self.animation {
            Animation::Idle => {}
            Animation::Lerp(lerp) => {
                self.current += (self.target - self.current) * lerp;
                if (self.target - self.current).abs() < SETTLE_EPSILON {
                    self.current = self.target;
                    self.animation = Animation::Idle;
                }
            }
            Animation::Tween {
                from,
                start,
                duration,
            } => {
                let t = now.saturating_sub(start).as_secs_f64() / duration.as_secs_f64();
                self.current = from + (self.target - from) * ease_out_expo(t);
                if t >= 1.0 || (self.target - self.current).abs() < SETTLE_EPSILON {
                    self.current = self.target;
                    self.animation = Animation::Idle;
                }
            }
        }
        self.current != before
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Identity of what a controller is bound to
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollBinding {
    /// Scroll viewport and content element
    pub ids: (ElementId, ElementId),
    pub config: ScrollConfig,
}

impl ScrollBinding {
    fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.ids.hash(&mut hasher);
        self.config.lerp.to_bits().hash(&mut hasher);
        self.config.wheel_multiplier.to_bits().hash(&mut hasher);
        self.config.duration_ms.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug)]
struct ScrollInner {
    offset: InertialOffset,
    config: ScrollConfig,
    running: bool,
    user_interacting: bool,
    binding_hash: u64,
    last_emitted: Option<f64>,
    /// Offset this controller last wrote to the surface
    last_written: f64,
    loop_handle: Option<TaskHandle>,
    destroyed: bool,
}

/// Eased scroll offset bound to a surface
pub struct InertialScroll {
    inner: Rc<RefCell<ScrollInner>>,
    surface: SharedSurface,
    scheduler: SharedScheduler,
    ticks: EventBus<ScrollTick>,
}

impl std::fmt::Debug for InertialScroll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InertialScroll")
            .field("state", &self.state())
            .finish()
    }
}

fn max_scroll(surface: &dyn SurfaceProvider) -> f64 {
    (surface.scroll_width() - surface.rect(Region::Scroll).width).max(0.0)
}

impl InertialScroll {
    /// Bind to the surface's current scroll offset and start the frame loop
    pub fn new(surface: SharedSurface, scheduler: SharedScheduler, config: ScrollConfig) -> Self {
        let (left, ids) = {
            let s = surface.borrow();
            (s.scroll_left(), s.element_ids())
        };
        let binding = ScrollBinding {
            ids,
            config: config.clone(),
        };
        let controller = Self {
            inner: Rc::new(RefCell::new(ScrollInner {
                offset: InertialOffset::new(left),
                config,
                running: true,
                user_interacting: false,
                binding_hash: binding.content_hash(),
                last_emitted: Some(left),
                last_written: left,
                loop_handle: None,
                destroyed: false,
            })),
            surface,
            scheduler,
            ticks: EventBus::new(),
        };
        controller.start_loop();
        controller
    }

    fn start_loop(&self) {
        let inner = Rc::downgrade(&self.inner);
        let surface = Rc::clone(&self.surface);
        let scheduler: Weak<dyn Scheduler> = Rc::downgrade(&self.scheduler);
        let ticks = self.ticks.clone();

        let handle = self.scheduler.schedule_repeating(Box::new(move || {
            let (Some(inner), Some(scheduler)) = (inner.upgrade(), scheduler.upgrade()) else {
                return ControlFlow::Break(());
            };
            frame(&inner, &surface, scheduler.now(), &ticks)
        }));
        self.inner.borrow_mut().loop_handle = Some(handle);
    }

    /// Move toward `target` (pixels), clamped to the scrollable range
    pub fn scroll_to(&self, target: f64, options: ScrollToOptions) {
        let max = max_scroll(&*self.surface.borrow());
        let target = target.clamp(0.0, max);
        let now = self.scheduler.now();

        let snapped = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return;
            }
            if options.immediate {
                inner.offset.snap(target);
                true
            } else {
                let duration = options
                    .duration
                    .or_else(|| inner.config.duration_ms.map(Duration::from_millis));
                match (options.lerp, duration) {
                    (Some(lerp), _) => inner.offset.ease_to(target, lerp),
                    (None, Some(duration)) => inner.offset.tween_to(target, now, duration),
                    (None, None) => {
                        let lerp = inner.config.lerp;
                        inner.offset.ease_to(target, lerp);
                    }
                }
                false
            }
        };

        if snapped {
            let written = {
                let mut s = self.surface.borrow_mut();
                s.set_scroll_left(target);
                s.scroll_left()
            };
            self.inner.borrow_mut().last_written = written;
        }
    }

    /// Add a wheel delta to the target offset
    pub fn wheel(&self, delta: f64) {
        let max = max_scroll(&*self.surface.borrow());
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed {
            return;
        }
        let target = (inner.offset.target() + delta * inner.config.wheel_multiplier).clamp(0.0, max);
        let lerp = inner.config.lerp;
        inner.offset.ease_to(target, lerp);
        inner.user_interacting = true;
    }

    /// Pause easing. The target is kept.
    pub fn stop(&self) {
        self.inner.borrow_mut().running = false;
    }

    /// Resume easing toward the kept target
    pub fn start(&self) {
        self.inner.borrow_mut().running = true;
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    /// Offset currently on screen
    pub fn animated_offset(&self) -> f64 {
        self.inner.borrow().offset.current()
    }

    pub fn state(&self) -> ScrollState {
        let inner = self.inner.borrow();
        ScrollState {
            immediate_offset: inner.offset.target(),
            animated_offset: inner.offset.current(),
            is_user_interacting: inner.user_interacting,
            is_animating: inner.offset.is_animating(),
        }
    }

    pub fn on_scroll(&self, listener: impl FnMut(&ScrollTick) + 'static) -> ListenerId {
        self.ticks.on(listener)
    }

    pub fn off_scroll(&self, id: ListenerId) -> bool {
        self.ticks.off(id)
    }

    /// Rebind after the surface or config changed
    ///
    /// Returns false (and keeps any in-flight animation) when neither the
    /// element identities nor the config differ from the current binding.
    pub fn configure(&self, binding: ScrollBinding) -> bool {
        let hash = binding.content_hash();
        let left = self.surface.borrow().scroll_left();
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed || inner.binding_hash == hash {
            return false;
        }
        log::debug!("InertialScroll: rebinding to {:?}", binding.ids);
        inner.binding_hash = hash;
        inner.config = binding.config;
        inner.offset = InertialOffset::new(left);
        inner.last_emitted = Some(left);
        inner.last_written = left;
        inner.user_interacting = false;
        true
    }

    /// Cancel the frame loop and drop all listeners
    pub fn destroy(&self) {
        let handle = {
            let mut inner = self.inner.borrow_mut();
            inner.destroyed = true;
            inner.loop_handle.take()
        };
        if let Some(handle) = handle {
            self.scheduler.cancel(handle);
        }
        self.ticks.clear();
    }
}

/// One frame of the scroll loop
fn frame(
    inner: &RefCell<ScrollInner>,
    surface: &SharedSurface,
    now: Duration,
    ticks: &EventBus<ScrollTick>,
) -> ControlFlow<()> {
    let (live_left, max) = {
        let s = surface.borrow();
        (s.scroll_left(), max_scroll(&*s))
    };

    let moved_to = {
        let mut state = inner.borrow_mut();
        if state.destroyed {
            return ControlFlow::Break(());
        }
        // Adopt offsets changed behind our back (surface clamping, scrollbar)
        if (live_left - state.last_written).abs() > SETTLE_EPSILON {
            state.offset.snap(live_left);
            state.last_written = live_left;
        }
        state.offset.clamp_target(max);
        if state.running {
            state.offset.update(now);
        }
        if !state.offset.is_animating() {
            state.user_interacting = false;
        }
        let current = state.offset.current();
        if state.last_emitted == Some(current) {
            None
        } else {
            state.last_emitted = Some(current);
            Some(current)
        }
    };

    if let Some(left) = moved_to {
        let tick = {
            let mut s = surface.borrow_mut();
            s.set_scroll_left(left);
            inner.borrow_mut().last_written = s.scroll_left();
            ScrollTick::measure(&*s)
        };
        ticks.emit(&tick);
    }
    ControlFlow::Continue(())
}
