//! Minimal typed publish/subscribe
//!
//! Every component of the engine reports through an [`EventBus`]: the drag
//! tracker listens to pointer events on one, the scroll controller publishes
//! its ticks on one, and the renderer exposes [`RendererEvent`]s to the
//! player layer on another.
//!
//! Listeners run in subscription order. Emission works on a snapshot of the
//! listener list, so a listener may subscribe or unsubscribe (itself or
//! others) while an event is being delivered.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifies one listener on one bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Entry<E> {
    id: ListenerId,
    once: bool,
    listener: Listener<E>,
}

struct BusInner<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
}

/// Typed event bus
///
/// Cloning is cheap and yields a handle to the same bus.
pub struct EventBus<E> {
    inner: Rc<RefCell<BusInner<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E> EventBus<E> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    fn push(&self, once: bool, listener: Listener<E>) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push(Entry { id, once, listener });
        id
    }

    /// Subscribe to every event
    pub fn on(&self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        self.push(false, Rc::new(RefCell::new(listener)))
    }

    /// Subscribe to the next event only
    pub fn once(&self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        self.push(true, Rc::new(RefCell::new(listener)))
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.id != id);
        inner.entries.len() != before
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Deliver an event to all listeners subscribed at the time of the call
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(ListenerId, bool, Listener<E>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|entry| (entry.id, entry.once, Rc::clone(&entry.listener)))
            .collect();

        for (id, once, listener) in snapshot {
            // Skip listeners removed by an earlier listener in this round
            if !self.is_subscribed(id) {
                continue;
            }
            if once {
                self.off(id);
            }
            // A listener re-emitting on its own bus would need a second
            // mutable borrow of itself; drop that nested delivery instead
            // of panicking.
            if let Ok(mut callback) = listener.try_borrow_mut() {
                callback(event);
            } else {
                log::warn!("EventBus: skipped re-entrant delivery to listener {:?}", id);
            }
        }
    }

    fn is_subscribed(&self, id: ListenerId) -> bool {
        self.inner.borrow().entries.iter().any(|entry| entry.id == id)
    }
}

/// Events published by the renderer for the player layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RendererEvent {
    /// Click at a position relative to the content (both in [0, 1])
    Click { x: f64, y: f64 },
    /// Double click at a relative position
    DoubleClick { x: f64, y: f64 },
    /// Seek position while dragging
    Drag(f64),
    /// Seek position when a drag begins
    DragStart(f64),
    /// Seek position when a drag ends
    DragEnd(f64),
    /// Visible window changed: ratios of content width and pixel edges
    Scroll {
        start: f64,
        end: f64,
        left: f64,
        right: f64,
    },
    /// Viewport width changed and the waveform was re-rendered
    Resize,
    /// Tiles for a new render generation are being drawn
    Render,
    /// Emitted on a later task than [`RendererEvent::Render`]
    Rendered,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let bus = EventBus::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        bus.on(move |v| l1.borrow_mut().push(("a", *v)));
        let l2 = Rc::clone(&log);
        bus.on(move |v| l2.borrow_mut().push(("b", *v)));

        bus.emit(&7);
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::<()>::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        bus.once(move |_| c.set(c.get() + 1));

        bus.emit(&());
        bus.emit(&());
        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_off_is_idempotent() {
        let bus = EventBus::<()>::new();
        let id = bus.on(|_| {});
        assert!(bus.off(id));
        assert!(!bus.off(id));
    }

    #[test]
    fn test_listener_can_unsubscribe_a_later_listener() {
        let bus = EventBus::<()>::new();
        let fired = Rc::new(Cell::new(false));

        let later: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let bus_clone = bus.clone();
        let later_clone = Rc::clone(&later);
        bus.on(move |_| {
            if let Some(id) = later_clone.get() {
                bus_clone.off(id);
            }
        });
        let f = Rc::clone(&fired);
        later.set(Some(bus.on(move |_| f.set(true))));

        bus.emit(&());
        assert!(!fired.get(), "Listener removed mid-emit must not run");
    }

    #[test]
    fn test_subscribe_during_emit_waits_for_next_event() {
        let bus = EventBus::<()>::new();
        let count = Rc::new(Cell::new(0));
        let bus_clone = bus.clone();
        let c = Rc::clone(&count);
        bus.once(move |_| {
            let c = Rc::clone(&c);
            bus_clone.on(move |_| c.set(c.get() + 1));
        });

        bus.emit(&());
        assert_eq!(count.get(), 0);
        bus.emit(&());
        assert_eq!(count.get(), 1);
    }
}
