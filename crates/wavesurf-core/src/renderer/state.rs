//! Mutable state of the coordinator

use std::time::Duration;

use crate::scheduler::TaskHandle;
use crate::types::{AudioChannelData, Rect, ViewportGeometry};

/// How long after pointer-up the user still counts as interacting
pub const INTERACTION_COOLDOWN: Duration = Duration::from_millis(500);

/// Width of each auto-scroll edge zone as a share of the viewport
pub const EDGE_ZONE_RATIO: f64 = 0.2;

/// Auto-scroll speed at full proximity and full ramp, px per frame
pub const AUTO_SCROLL_MAX_SPEED: f64 = 20.0;

/// Auto-scroll speed ramp: start, per-frame step, cap
pub const AUTO_SCROLL_RAMP_START: f64 = 0.3;
pub const AUTO_SCROLL_RAMP_STEP: f64 = 0.05;
pub const AUTO_SCROLL_RAMP_MAX: f64 = 1.0;

/// Dead-zone around the viewport while dragging
pub const SCROLL_INTO_VIEW_BUFFER: f64 = 80.0;

/// Largest forward nudge per call while following playback
pub const AUTO_CENTER_STEP: f64 = 10.0;

/// Idempotence cache for cursor writes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorState {
    pub last_rendered_progress: Option<f64>,
    pub is_dragging: bool,
}

/// One drag-to-seek gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Press position relative to the content
    pub origin_x: f64,
    pub origin_y: f64,
    pub current_progress: f64,
    pub last_pointer_client_x: Option<f64>,
    /// px/ms, from the drag tracker
    pub velocity: f64,
    /// Content rectangle when the drag started
    pub wrapper: Rect,
    /// Scroll viewport rectangle when the drag started
    pub viewport: Rect,
    pub active: bool,
}

/// Seek gesture state machine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DragPhase {
    #[default]
    Idle,
    /// Pointer is down, movement still under the drag threshold
    Pending,
    Dragging(DragSession),
}

impl DragPhase {
    pub fn session(&self) -> Option<&DragSession> {
        match self {
            DragPhase::Dragging(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut DragSession> {
        match self {
            DragPhase::Dragging(session) => Some(session),
            _ => None,
        }
    }
}

/// Running edge auto-scroll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoScroll {
    pub handle: TaskHandle,
    /// -1 = left, 1 = right
    pub direction: f64,
    /// How deep into the edge zone the pointer is, in [0, 1]
    pub proximity: f64,
    pub speed_factor: f64,
}

/// Where the pointer sits relative to the auto-scroll edge zones
pub fn edge_zone(viewport: Rect, client_x: f64) -> Option<(f64, f64)> {
    let zone = viewport.width * EDGE_ZONE_RATIO;
    if zone <= 0.0 {
        return None;
    }
    if client_x < viewport.left + zone {
        let proximity = 1.0 - (client_x - viewport.left) / zone;
        Some((-1.0, proximity.clamp(0.0, 1.0)))
    } else if client_x > viewport.right() - zone {
        let proximity = 1.0 - (viewport.right() - client_x) / zone;
        Some((1.0, proximity.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// Round away from zero at half-pixel precision
pub fn round_half_pixel(delta: f64) -> f64 {
    let doubled = delta * 2.0;
    let rounded = if doubled < 0.0 { doubled.floor() } else { doubled.ceil() };
    rounded / 2.0
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub audio: Option<AudioChannelData>,
    pub geometry: ViewportGeometry,
    pub cursor: CursorState,
    pub drag: DragPhase,
    pub is_interacting: bool,
    pub interaction_timer: Option<TaskHandle>,
    pub cursor_loop: Option<TaskHandle>,
    pub auto_scroll: Option<AutoScroll>,
    pub resize_task: Option<TaskHandle>,
    pub rendered_task: Option<TaskHandle>,
    /// Viewport width of the last render
    pub last_width: f64,
    /// Latest progress written by any source
    pub real_time_progress: f64,
    pub destroyed: bool,
}

impl State {
    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragPhase::Dragging(_))
    }

    /// Every scheduler handle currently held, emptied out
    pub fn take_handles(&mut self) -> Vec<TaskHandle> {
        [
            self.interaction_timer.take(),
            self.cursor_loop.take(),
            self.auto_scroll.take().map(|a| a.handle),
            self.resize_task.take(),
            self.rendered_task.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_zone_sides() {
        let viewport = Rect::new(100.0, 0.0, 500.0, 128.0);
        assert_eq!(edge_zone(viewport, 100.0), Some((-1.0, 1.0)));
        assert_eq!(edge_zone(viewport, 150.0), Some((-1.0, 0.5)));
        assert_eq!(edge_zone(viewport, 350.0), None);
        assert_eq!(edge_zone(viewport, 550.0), Some((1.0, 0.5)));
        // Beyond the viewport still counts, at full proximity
        assert_eq!(edge_zone(viewport, 700.0), Some((1.0, 1.0)));
    }

    #[test]
    fn test_round_half_pixel_away_from_zero() {
        assert_eq!(round_half_pixel(1.2), 1.5);
        assert_eq!(round_half_pixel(-1.2), -1.5);
        assert_eq!(round_half_pixel(2.0), 2.0);
        assert_eq!(round_half_pixel(-0.1), -0.5);
        assert_eq!(round_half_pixel(0.0), 0.0);
    }
}
