//! Cooperative scheduling capability
//!
//! The engine never touches a platform timer or animation-frame API directly.
//! Everything that has to happen "later" goes through a [`Scheduler`]:
//!
//! - one-shot timeouts (interaction cool-down, deferred `Rendered` event)
//! - one-shot frame callbacks
//! - idle callbacks (resize debouncing)
//! - repeating per-frame callbacks (scroll easing, cursor follow, auto-scroll)
//!
//! Repeating callbacks return [`ControlFlow::Break`] to stop themselves, which
//! is how the drag loops self-terminate once the gesture ends.
//!
//! [`CooperativeScheduler`] is the in-tree implementation. It has no clock of
//! its own: the host drives it (tests with synthetic time, the iced binding
//! from its tick subscription).

use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Duration;

/// Frame interval assumed by [`CooperativeScheduler::run_frame`] (~60 fps)
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Handle for cancelling a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// When a one-shot task should run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskKind {
    /// After the given delay (zero = next task turn)
    Timeout(Duration),
    /// On the next animation frame
    Frame,
    /// When the host is idle
    Idle,
}

/// Per-frame callback that decides whether it keeps running
pub type RepeatingTask = Box<dyn FnMut() -> ControlFlow<()>>;

/// Deferred-callback capability injected into every engine component
pub trait Scheduler {
    /// Host time since the scheduler started
    fn now(&self) -> Duration;

    /// Run `task` once, at the moment described by `kind`
    fn schedule(&self, kind: TaskKind, task: Box<dyn FnOnce()>) -> TaskHandle;

    /// Run `task` on every frame until it breaks or is cancelled
    fn schedule_repeating(&self, task: RepeatingTask) -> TaskHandle;

    /// Cancel a pending task. Unknown or finished handles are ignored.
    fn cancel(&self, handle: TaskHandle);
}

/// Shared scheduler handle
pub type SharedScheduler = Rc<dyn Scheduler>;

struct Timeout {
    due: Duration,
    id: u64,
    task: Box<dyn FnOnce()>,
}

struct Inner {
    now: Duration,
    next_id: u64,
    timeouts: Vec<Timeout>,
    frames: Vec<(u64, Box<dyn FnOnce()>)>,
    idle: Vec<(u64, Box<dyn FnOnce()>)>,
    /// `None` while the task is executing
    repeating: Vec<(u64, Option<RepeatingTask>)>,
    /// Repeating tasks cancelled while they were executing
    cancelled_running: HashSet<u64>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Host-driven scheduler
///
/// Callbacks always run with no internal borrow held, so they are free to
/// schedule or cancel further work.
#[derive(Clone)]
pub struct CooperativeScheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Default for CooperativeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CooperativeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("CooperativeScheduler")
            .field("now", &inner.now)
            .field("timeouts", &inner.timeouts.len())
            .field("frames", &inner.frames.len())
            .field("idle", &inner.idle.len())
            .field("repeating", &inner.repeating.len())
            .finish()
    }
}

impl CooperativeScheduler {
    /// Create a scheduler at time zero
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                now: Duration::ZERO,
                next_id: 0,
                timeouts: Vec::new(),
                frames: Vec::new(),
                idle: Vec::new(),
                repeating: Vec::new(),
                cancelled_running: HashSet::new(),
            })),
        }
    }

    /// Move the clock forward, running every timeout that falls due
    pub fn advance(&self, dt: Duration) {
        let target = self.inner.borrow().now + dt;
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let earliest = inner
                    .timeouts
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);
                earliest.map(|i| {
                    let timeout = inner.timeouts.remove(i);
                    if timeout.due > inner.now {
                        inner.now = timeout.due;
                    }
                    timeout.task
                })
            };
            match next {
                Some(task) => task(),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }

    /// Advance one frame interval, then run frame callbacks and repeating tasks
    ///
    /// Frame callbacks scheduled while this frame runs wait for the next one.
    pub fn run_frame(&self) {
        self.advance(FRAME_INTERVAL);
        self.fire_frame();
    }

    /// Frame callbacks and repeating tasks at the current time
    fn fire_frame(&self) {
        let frames = std::mem::take(&mut self.inner.borrow_mut().frames);
        for (_, task) in frames {
            task();
        }

        let ids: Vec<u64> = self
            .inner
            .borrow()
            .repeating
            .iter()
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let task = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .repeating
                    .iter_mut()
                    .find(|(rid, _)| *rid == id)
                    .and_then(|(_, slot)| slot.take())
            };
            let Some(mut task) = task else { continue };

            let flow = task();

            let mut inner = self.inner.borrow_mut();
            let cancelled = inner.cancelled_running.remove(&id);
            if flow.is_continue() && !cancelled {
                if let Some((_, slot)) = inner.repeating.iter_mut().find(|(rid, _)| *rid == id) {
                    *slot = Some(task);
                }
            } else {
                inner.repeating.retain(|(rid, _)| *rid != id);
            }
        }
    }

    /// Run `count` frames back to back
    pub fn run_frames(&self, count: usize) {
        for _ in 0..count {
            self.run_frame();
        }
    }

    /// Run every pending idle callback
    pub fn run_idle(&self) {
        let idle = std::mem::take(&mut self.inner.borrow_mut().idle);
        for (_, task) in idle {
            task();
        }
    }

    /// One host tick: timers for `dt`, one frame, then idle work
    ///
    /// The clock moves by exactly `dt`, so it follows the host's wall time.
    pub fn tick(&self, dt: Duration) {
        self.advance(dt);
        self.fire_frame();
        self.run_idle();
    }

    /// Number of repeating tasks still alive
    pub fn repeating_count(&self) -> usize {
        self.inner.borrow().repeating.len()
    }

    /// Number of one-shot tasks still pending (timeouts, frames and idle)
    pub fn pending_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.timeouts.len() + inner.frames.len() + inner.idle.len()
    }
}

impl Scheduler for CooperativeScheduler {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn schedule(&self, kind: TaskKind, task: Box<dyn FnOnce()>) -> TaskHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        match kind {
            TaskKind::Timeout(delay) => {
                let due = inner.now + delay;
                inner.timeouts.push(Timeout { due, id, task });
            }
            TaskKind::Frame => inner.frames.push((id, task)),
            TaskKind::Idle => inner.idle.push((id, task)),
        }
        TaskHandle(id)
    }

    fn schedule_repeating(&self, task: RepeatingTask) -> TaskHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id();
        inner.repeating.push((id, Some(task)));
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        let id = handle.0;
        let mut inner = self.inner.borrow_mut();
        inner.timeouts.retain(|t| t.id != id);
        inner.frames.retain(|(fid, _)| *fid != id);
        inner.idle.retain(|(iid, _)| *iid != id);

        let running = inner
            .repeating
            .iter()
            .any(|(rid, slot)| *rid == id && slot.is_none());
        if running {
            inner.cancelled_running.insert(id);
        } else {
            inner.repeating.retain(|(rid, _)| *rid != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_timeouts_run_in_due_order() {
        let scheduler = CooperativeScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        scheduler.schedule(TaskKind::Timeout(Duration::from_millis(20)), Box::new(move || l.borrow_mut().push(20)));
        let l = Rc::clone(&log);
        scheduler.schedule(TaskKind::Timeout(Duration::from_millis(5)), Box::new(move || l.borrow_mut().push(5)));

        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec![5]);
        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec![5, 20]);
    }

    #[test]
    fn test_clock_reads_due_time_inside_timeout() {
        let scheduler = CooperativeScheduler::new();
        let seen = Rc::new(Cell::new(Duration::ZERO));
        let s = scheduler.clone();
        let seen_clone = Rc::clone(&seen);
        scheduler.schedule(
            TaskKind::Timeout(Duration::from_millis(7)),
            Box::new(move || seen_clone.set(s.now())),
        );
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(seen.get(), Duration::from_millis(7));
        assert_eq!(scheduler.now(), Duration::from_millis(50));
    }

    #[test]
    fn test_cancelled_timeout_never_runs() {
        let scheduler = CooperativeScheduler::new();
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        let handle = scheduler.schedule(TaskKind::Timeout(Duration::ZERO), Box::new(move || f.set(true)));
        scheduler.cancel(handle);
        scheduler.advance(Duration::from_millis(1));
        assert!(!fired.get());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_repeating_task_stops_on_break() {
        let scheduler = CooperativeScheduler::new();
        let runs = Rc::new(Cell::new(0));
        let r = Rc::clone(&runs);
        scheduler.schedule_repeating(Box::new(move || {
            r.set(r.get() + 1);
            if r.get() == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }));

        scheduler.run_frames(5);
        assert_eq!(runs.get(), 3);
        assert_eq!(scheduler.repeating_count(), 0);
    }

    #[test]
    fn test_repeating_task_can_cancel_itself() {
        let scheduler = CooperativeScheduler::new();
        let runs = Rc::new(Cell::new(0));
        let handle: Rc<Cell<Option<TaskHandle>>> = Rc::new(Cell::new(None));

        let s = scheduler.clone();
        let r = Rc::clone(&runs);
        let h = Rc::clone(&handle);
        let id = scheduler.schedule_repeating(Box::new(move || {
            r.set(r.get() + 1);
            if let Some(handle) = h.get() {
                s.cancel(handle);
            }
            ControlFlow::Continue(())
        }));
        handle.set(Some(id));

        scheduler.run_frames(3);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_frame_scheduled_during_frame_waits() {
        let scheduler = CooperativeScheduler::new();
        let runs = Rc::new(Cell::new(0));
        let s = scheduler.clone();
        let r = Rc::clone(&runs);
        scheduler.schedule(
            TaskKind::Frame,
            Box::new(move || {
                r.set(r.get() + 1);
                let r = Rc::clone(&r);
                s.schedule(TaskKind::Frame, Box::new(move || r.set(r.get() + 1)));
            }),
        );

        scheduler.run_frame();
        assert_eq!(runs.get(), 1);
        scheduler.run_frame();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_tick_follows_host_time() {
        let scheduler = CooperativeScheduler::new();
        let frames = Rc::new(Cell::new(0));
        let f = Rc::clone(&frames);
        scheduler.schedule_repeating(Box::new(move || {
            f.set(f.get() + 1);
            ControlFlow::Continue(())
        }));
        let fired = Rc::new(Cell::new(false));
        let t = Rc::clone(&fired);
        scheduler.schedule(TaskKind::Timeout(Duration::from_millis(500)), Box::new(move || t.set(true)));

        for _ in 0..31 {
            scheduler.tick(Duration::from_millis(16));
        }
        assert_eq!(scheduler.now(), Duration::from_millis(496));
        assert_eq!(frames.get(), 31);
        assert!(!fired.get(), "Timer must not run ahead of the host clock");

        scheduler.tick(Duration::from_millis(16));
        assert!(fired.get());
    }

    #[test]
    fn test_idle_runs_only_when_asked() {
        let scheduler = CooperativeScheduler::new();
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        scheduler.schedule(TaskKind::Idle, Box::new(move || f.set(true)));
        scheduler.run_frame();
        assert!(!fired.get());
        scheduler.run_idle();
        assert!(fired.get());
    }
}
