//! Pointer drag tracking
//!
//! Turns raw pointer-down/move/up events on a target into a damped,
//! threshold-gated drag stream:
//!
//! 1. **Pending**: after pointer-down nothing is reported until the pointer
//!    moves further than `threshold` from the origin on either axis.
//! 2. **Dragging**: `on_start` fires once with the origin (relative to the
//!    target), then moves are sampled at most once per
//!    `min_sample_interval_ms`, damped, accumulated, and flushed to
//!    `on_drag` once the accumulated movement reaches `min_movement`.
//! 3. Pointer-up, cancel, or leaving the tracked tree ends the gesture;
//!    `on_end` fires only if dragging had started.
//!
//! Damping has two parts: a constant factor, and an edge factor that falls
//! towards `min_edge_factor` as the pointer nears the left or right side of
//! the target. Skipped samples are not lost: the next accepted sample
//! measures its displacement from the last accepted one.
//!
//! The horizontal velocity (px/ms, signed) is a mean over the last
//! `velocity_window` samples and rides along with every drag callback.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::events::{EventBus, ListenerId};
use crate::types::Rect;

// =============================================================================
// Pointer input
// =============================================================================

/// Pointer button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// Kind of pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
    /// Pointer left the tracked surface for something outside its tree
    Leave,
    Click,
    DoubleClick,
}

/// One pointer event in screen (client) coordinates
#[derive(Debug, Clone)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub client_x: f64,
    pub client_y: f64,
    pub button: PointerButton,
    /// Host clock in milliseconds
    pub timestamp_ms: f64,
    consumed: Cell<bool>,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, client_x: f64, client_y: f64, timestamp_ms: f64) -> Self {
        Self {
            kind,
            client_x,
            client_y,
            button: PointerButton::Primary,
            timestamp_ms,
            consumed: Cell::new(false),
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    /// Mark the event as handled; later listeners should ignore it
    pub fn consume(&self) {
        self.consumed.set(true);
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed.get()
    }
}

/// Something a drag can be attached to
pub trait DragTarget {
    /// Current screen-space rectangle of the target
    fn rect(&self) -> Rect;

    /// Pointer events delivered to the target
    fn pointer_events(&self) -> EventBus<PointerEvent>;
}

// =============================================================================
// Configuration
// =============================================================================

/// Drag tracker tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Distance (px, either axis) before a press becomes a drag
    pub threshold: f64,
    /// Only presses of this button start a drag
    pub button: PointerButton,
    /// Minimum time between accepted samples
    pub min_sample_interval_ms: f64,
    /// Constant damping applied to every displacement
    pub damping: f64,
    /// Width of the zone along the left/right sides where edge damping applies
    pub edge_threshold: f64,
    /// Edge damping factor at (or beyond) the target's side
    pub min_edge_factor: f64,
    /// Accumulated movement (px) required before `on_drag` fires
    pub min_movement: f64,
    /// Number of samples averaged for the velocity estimate
    pub velocity_window: usize,
    /// How long after a drag a click is swallowed
    pub click_suppress_ms: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            button: PointerButton::Primary,
            min_sample_interval_ms: 8.0,
            damping: 0.85,
            edge_threshold: 24.0,
            min_edge_factor: 0.2,
            min_movement: 1.0,
            velocity_window: 5,
            click_suppress_ms: 10.0,
        }
    }
}

impl DragConfig {
    /// Edge damping factor for a pointer at `x` inside a target `width` wide
    fn edge_factor(&self, x: f64, width: f64) -> f64 {
        if width <= 0.0 || self.edge_threshold <= 0.0 {
            return 1.0;
        }
        let distance = x.min(width - x);
        let t = (distance / self.edge_threshold).clamp(0.0, 1.0);
        self.min_edge_factor + (1.0 - self.min_edge_factor) * t
    }
}

// =============================================================================
// Callbacks
// =============================================================================

/// One flushed drag step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragMove {
    /// Damped displacement since the previous flush
    pub dx: f64,
    pub dy: f64,
    /// Pointer position relative to the target
    pub x: f64,
    pub y: f64,
    /// Pointer position in screen coordinates
    pub client_x: f64,
    pub client_y: f64,
    /// Smoothed horizontal velocity in px/ms
    pub velocity: f64,
}

/// Callbacks of one draggable target
pub struct DragHandlers {
    on_start: Box<dyn FnMut(f64, f64)>,
    on_drag: Box<dyn FnMut(DragMove)>,
    on_end: Box<dyn FnMut(f64, f64)>,
}

impl DragHandlers {
    pub fn new(on_drag: impl FnMut(DragMove) + 'static) -> Self {
        Self {
            on_start: Box::new(|_, _| {}),
            on_drag: Box::new(on_drag),
            on_end: Box::new(|_, _| {}),
        }
    }

    pub fn on_start(mut self, f: impl FnMut(f64, f64) + 'static) -> Self {
        self.on_start = Box::new(f);
        self
    }

    pub fn on_end(mut self, f: impl FnMut(f64, f64) + 'static) -> Self {
        self.on_end = Box::new(f);
        self
    }
}

// =============================================================================
// Tracker state machine
// =============================================================================

#[derive(Debug)]
struct Session {
    last_x: f64,
    last_y: f64,
    last_sample_ms: f64,
    acc_dx: f64,
    acc_dy: f64,
    velocities: VecDeque<f64>,
}

#[derive(Debug)]
enum Gesture {
    Idle,
    Pending {
        origin_x: f64,
        origin_y: f64,
        down_ms: f64,
    },
    Dragging(Session),
}

/// Callbacks owed for one pointer event
#[derive(Debug, Default)]
struct Outcome {
    start: Option<(f64, f64)>,
    drag: Option<DragMove>,
    end: Option<(f64, f64)>,
}

#[derive(Debug)]
struct Tracker {
    config: DragConfig,
    gesture: Gesture,
    suppress_click_until: Option<f64>,
}

impl Tracker {
    fn new(config: DragConfig) -> Self {
        Self {
            config,
            gesture: Gesture::Idle,
            suppress_click_until: None,
        }
    }

    fn handle(&mut self, event: &PointerEvent, measure: impl Fn() -> Rect) -> Outcome {
        let mut outcome = Outcome::default();
        match event.kind {
            PointerKind::Down => {
                if event.button == self.config.button && matches!(self.gesture, Gesture::Idle) {
                    self.gesture = Gesture::Pending {
                        origin_x: event.client_x,
                        origin_y: event.client_y,
                        down_ms: event.timestamp_ms,
                    };
                }
            }
            PointerKind::Move => self.handle_move(event, &measure, &mut outcome),
            PointerKind::Up | PointerKind::Cancel | PointerKind::Leave => {
                let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
                if let Gesture::Dragging(_) = gesture {
                    let rect = measure();
                    outcome.end = Some((event.client_x - rect.left, event.client_y - rect.top));
                    self.suppress_click_until =
                        Some(event.timestamp_ms + self.config.click_suppress_ms);
                }
            }
            PointerKind::Click | PointerKind::DoubleClick => {
                if let Some(until) = self.suppress_click_until.take() {
                    if event.timestamp_ms <= until {
                        event.consume();
                    }
                }
            }
        }
        outcome
    }

    fn handle_move(&mut self, event: &PointerEvent, measure: &impl Fn() -> Rect, outcome: &mut Outcome) {
        let (x, y, now) = (event.client_x, event.client_y, event.timestamp_ms);

        if let Gesture::Pending {
            origin_x,
            origin_y,
            down_ms,
        } = self.gesture
        {
            let threshold = self.config.threshold;
            if (x - origin_x).abs() <= threshold && (y - origin_y).abs() <= threshold {
                return;
            }
            let rect = measure();
            outcome.start = Some((origin_x - rect.left, origin_y - rect.top));
            self.gesture = Gesture::Dragging(Session {
                last_x: origin_x,
                last_y: origin_y,
                last_sample_ms: down_ms,
                acc_dx: 0.0,
                acc_dy: 0.0,
                velocities: VecDeque::with_capacity(self.config.velocity_window),
            });
            // The crossing move is the first sample, whatever its timing
            self.sample(x, y, now, measure, outcome, true);
            return;
        }

        if matches!(self.gesture, Gesture::Dragging(_)) {
            self.sample(x, y, now, measure, outcome, false);
        }
    }

    fn sample(
        &mut self,
        x: f64,
        y: f64,
        now: f64,
        measure: &impl Fn() -> Rect,
        outcome: &mut Outcome,
        force: bool,
    ) {
        let config = &self.config;
        let Gesture::Dragging(session) = &mut self.gesture else {
            return;
        };

        let dt = now - session.last_sample_ms;
        if !force && dt < config.min_sample_interval_ms {
            return;
        }

        let raw_dx = x - session.last_x;
        let raw_dy = y - session.last_y;
        if dt > 0.0 {
            if session.velocities.len() >= config.velocity_window.max(1) {
                session.velocities.pop_front();
            }
            session.velocities.push_back(raw_dx / dt);
        }

        let rect = measure();
        let rel_x = x - rect.left;
        let rel_y = y - rect.top;
        let factor = config.damping * config.edge_factor(rel_x, rect.width);

        session.acc_dx += raw_dx * factor;
        session.acc_dy += raw_dy * factor;
        session.last_x = x;
        session.last_y = y;
        session.last_sample_ms = now;

        if session.acc_dx.hypot(session.acc_dy) >= config.min_movement {
            let velocity = if session.velocities.is_empty() {
                0.0
            } else {
                session.velocities.iter().sum::<f64>() / session.velocities.len() as f64
            };
            outcome.drag = Some(DragMove {
                dx: session.acc_dx,
                dy: session.acc_dy,
                x: rel_x,
                y: rel_y,
                client_x: x,
                client_y: y,
                velocity,
            });
            session.acc_dx = 0.0;
            session.acc_dy = 0.0;
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Keeps a draggable alive; dropping it detaches the tracker
pub struct DragSubscription {
    bus: Option<EventBus<PointerEvent>>,
    id: Cell<Option<ListenerId>>,
}

impl DragSubscription {
    fn inert() -> Self {
        Self {
            bus: None,
            id: Cell::new(None),
        }
    }

    /// Detach from the target. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let (Some(bus), Some(id)) = (&self.bus, self.id.take()) {
            bus.off(id);
        }
    }

    /// True while the tracker is still attached
    pub fn is_active(&self) -> bool {
        self.id.get().is_some()
    }
}

impl Drop for DragSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for DragSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Attach a drag tracker to `target`
///
/// An absent target yields an inert subscription.
pub fn make_draggable(
    target: Option<Rc<dyn DragTarget>>,
    handlers: DragHandlers,
    config: DragConfig,
) -> DragSubscription {
    let Some(target) = target else {
        return DragSubscription::inert();
    };

    let bus = target.pointer_events();
    let tracker = RefCell::new(Tracker::new(config));
    let handlers = RefCell::new(handlers);

    let id = bus.on(move |event: &PointerEvent| {
        let outcome = tracker.borrow_mut().handle(event, || target.rect());

        let Ok(mut handlers) = handlers.try_borrow_mut() else {
            return;
        };
        if let Some((x, y)) = outcome.start {
            log::debug!("drag: start at ({:.1}, {:.1})", x, y);
            (handlers.on_start)(x, y);
        }
        if let Some(step) = outcome.drag {
            (handlers.on_drag)(step);
        }
        if let Some((x, y)) = outcome.end {
            log::debug!("drag: end at ({:.1}, {:.1})", x, y);
            (handlers.on_end)(x, y);
        }
    });

    DragSubscription {
        bus: Some(bus),
        id: Cell::new(Some(id)),
    }
}
