//! One-shot notification events.
//!
//! # Why this exists
//!
//! Every suspension in the kernel is built from the same primitive: a
//! one-shot event that is pending until the scheduler (or a rendezvous)
//! resolves it.  A process waits by polling [`Event::wait`]; the event stores
//! the process's waker and releases it on resolution.
//!
//! An event resolves exactly once, to one of two terminal states:
//!
//! - **Triggered** — the normal completion path.
//! - **Aborted** — cooperative cancellation, used when a sibling in a select
//!   group wins the rendezvous first.
//!
//! Triggering an already-aborted event is a no-op, not an error: the
//! scheduler may still hold a queue entry for an event that a select group
//! cancelled in the meantime.  Events are never reused after resolution.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use csp_core::EventId;

// ── Event ─────────────────────────────────────────────────────────────────────

/// Resolution state of an [`Event`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EventState {
    Pending,
    Triggered,
    Aborted,
}

struct EventInner {
    id:      EventId,
    state:   Cell<EventState>,
    waiters: RefCell<Vec<Waker>>,
}

/// A one-shot notification, cheap to clone (shared handle).
///
/// Created through [`Env::event`][crate::Env::event] or
/// [`Env::timeout`][crate::Env::timeout]; resolved by the scheduler run loop
/// or by channel rendezvous internals.
#[derive(Clone)]
pub struct Event {
    inner: Rc<EventInner>,
}

impl Event {
    pub(crate) fn new(id: EventId) -> Event {
        Event {
            inner: Rc::new(EventInner {
                id,
                state:   Cell::new(EventState::Pending),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> EventId {
        self.inner.id
    }

    pub fn state(&self) -> EventState {
        self.inner.state.get()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == EventState::Pending
    }

    pub fn is_triggered(&self) -> bool {
        self.state() == EventState::Triggered
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == EventState::Aborted
    }

    /// Two handles to the same underlying event?
    pub fn same_as(&self, other: &Event) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolve to `Triggered` and release all waiters.
    ///
    /// Returns `false` (and does nothing) if the event was already resolved.
    pub fn trigger(&self) -> bool {
        if self.inner.state.get() != EventState::Pending {
            return false;
        }
        self.inner.state.set(EventState::Triggered);
        self.wake_all();
        true
    }

    /// Resolve to `Aborted` and release all waiters.
    ///
    /// Returns `false` (and does nothing) if the event was already resolved.
    /// Waiters are released so no process can hang on a cancelled event.
    pub fn abort(&self) -> bool {
        if self.inner.state.get() != EventState::Pending {
            return false;
        }
        self.inner.state.set(EventState::Aborted);
        self.wake_all();
        true
    }

    /// Suspend until this event resolves; yields the terminal state.
    pub fn wait(&self) -> Wait {
        Wait {
            event: self.clone(),
        }
    }

    /// Store `waker` to be woken when this event resolves.  Fires it
    /// immediately if the event has already resolved.  Building block for
    /// custom combinators over events.
    pub fn register_waker(&self, waker: Waker) {
        if self.is_pending() {
            self.inner.waiters.borrow_mut().push(waker);
        } else {
            waker.wake();
        }
    }

    fn wake_all(&self) {
        for waker in self.inner.waiters.borrow_mut().drain(..) {
            waker.wake();
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

// ── Wait ──────────────────────────────────────────────────────────────────────

/// Future returned by [`Event::wait`].
pub struct Wait {
    event: Event,
}

impl Future for Wait {
    type Output = EventState;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<EventState> {
        match self.event.state() {
            EventState::Pending => {
                self.event.register_waker(cx.waker().clone());
                Poll::Pending
            }
            terminal => Poll::Ready(terminal),
        }
    }
}

// ── AnyOf ─────────────────────────────────────────────────────────────────────

/// Resolves when the first of a group of events resolves.
///
/// Yields the index of the first resolved event (scan order breaks exact
/// ties), or `None` for an empty group, which resolves immediately.
pub struct AnyOf {
    events: Vec<Event>,
}

impl AnyOf {
    pub fn new(events: Vec<Event>) -> AnyOf {
        AnyOf { events }
    }
}

impl Future for AnyOf {
    type Output = Option<usize>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<usize>> {
        if self.events.is_empty() {
            return Poll::Ready(None);
        }
        if let Some(i) = self.events.iter().position(|e| !e.is_pending()) {
            return Poll::Ready(Some(i));
        }
        for event in &self.events {
            event.register_waker(cx.waker().clone());
        }
        Poll::Pending
    }
}
