//! Communication events: one side of a potential rendezvous.
//!
//! A [`Sender`] or [`Receiver`] is produced unarmed by a channel factory and
//! becomes live only when *armed* — directly (`communicate`/`execute`) or as
//! one branch of a [`select`][crate::select].  Arming is one-shot: reusing an
//! event is a contract violation.
//!
//! # Lifecycle
//!
//! ```text
//! Unarmed ──arm──▶ Waiting ──pairing──▶ Matched   (completion triggers)
//!    │                │
//!    └───cancel───────┴──▶ Aborted               (completion aborts)
//! ```
//!
//! Cancellation is cooperative: it only prevents future matches and is a
//! no-op on an event that has already matched.
//!
//! The typed core is shared between the public handle, the channel's wait
//! set, and — type-erased — the sibling sets of a select group, which may
//! span channels carrying different entity types.  Sibling references are
//! weak so an abandoned select group cannot keep itself alive.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use csp_core::{CspError, CspResult, EventId};
use csp_kernel::{Env, Event, EventState};

use crate::channel::{ChanState, try_communication};

// ── States and roles ──────────────────────────────────────────────────────────

/// Lifecycle state of a communication event.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CommState {
    /// Factory-fresh; not yet registered anywhere.
    Unarmed,
    /// Armed and registered in its channel's wait set.
    Waiting,
    /// Chosen by the pairing algorithm; its completion is on the queue.
    Matched,
    /// Cancelled before matching; its completion was aborted.
    Aborted,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Role {
    Sender,
    Receiver,
}

// ── Typed core ────────────────────────────────────────────────────────────────

pub(crate) struct CommCore<T> {
    pub(crate) env:        Env,
    pub(crate) chan:       Rc<RefCell<ChanState<T>>>,
    pub(crate) role:       Role,
    /// Private one-shot event resolved when this side's rendezvous ends.
    pub(crate) completion: Event,
    pub(crate) state:      Cell<CommState>,
    /// Outgoing entity for a sender; incoming entity for a matched receiver.
    pub(crate) slot:       RefCell<Option<T>>,
    /// Mutually exclusive events of this one's select group (empty outside
    /// a select).
    pub(crate) siblings:   RefCell<Vec<Weak<dyn CommControl>>>,
    /// Position in the channel wait set while `Waiting`.
    pub(crate) wait_index: Cell<Option<usize>>,
}

impl<T: 'static> CommCore<T> {
    pub(crate) fn new(
        env:    Env,
        chan:   Rc<RefCell<ChanState<T>>>,
        role:   Role,
        entity: Option<T>,
    ) -> Rc<Self> {
        let completion = env.event();
        Rc::new(CommCore {
            env,
            chan,
            role,
            completion,
            state:      Cell::new(CommState::Unarmed),
            slot:       RefCell::new(entity),
            siblings:   RefCell::new(Vec::new()),
            wait_index: Cell::new(None),
        })
    }

    /// Cancel every sibling that has not already matched.
    pub(crate) fn cancel_siblings(&self) {
        for sibling in self.siblings.borrow().iter() {
            if let Some(ctl) = sibling.upgrade() {
                ctl.cancel();
            }
        }
    }
}

// ── Type-erased control plane ─────────────────────────────────────────────────

/// Object-safe view of a communication event, used by [`Comm`] and the
/// sibling sets (one select group may mix channels of different entity
/// types).
pub(crate) trait CommControl {
    fn env(&self) -> &Env;
    fn completion(&self) -> &Event;
    fn state(&self) -> CommState;

    /// One-shot arming: register with the channel and attempt a rendezvous.
    fn arm(self: Rc<Self>) -> CspResult<()>;

    /// Cooperative cancellation; a no-op once matched or already aborted.
    fn cancel(self: Rc<Self>);

    fn set_siblings(&self, siblings: Vec<Weak<dyn CommControl>>);
    fn clear_siblings(&self);

    /// Is the event with completion-ID `id` in this event's sibling set?
    fn has_sibling(&self, id: EventId) -> bool;
}

impl<T: 'static> CommControl for CommCore<T> {
    fn env(&self) -> &Env {
        &self.env
    }

    fn completion(&self) -> &Event {
        &self.completion
    }

    fn state(&self) -> CommState {
        self.state.get()
    }

    fn arm(self: Rc<Self>) -> CspResult<()> {
        if self.state.get() != CommState::Unarmed {
            return Err(CspError::AlreadyArmed);
        }
        self.state.set(CommState::Waiting);
        {
            let mut chan = self.chan.borrow_mut();
            match self.role {
                Role::Sender => chan.senders.insert(self.clone()),
                Role::Receiver => chan.receivers.insert(self.clone()),
            }
        }
        try_communication(&self.env, &self.chan)
    }

    fn cancel(self: Rc<Self>) {
        match self.state.get() {
            CommState::Unarmed => {
                // Not registered anywhere yet; just close the door.
                self.state.set(CommState::Aborted);
                self.completion.abort();
            }
            CommState::Waiting => {
                self.state.set(CommState::Aborted);
                {
                    let mut chan = self.chan.borrow_mut();
                    match self.role {
                        Role::Sender => chan.senders.remove(&self),
                        Role::Receiver => chan.receivers.remove(&self),
                    };
                }
                self.completion.abort();
            }
            // A completed hand-off is never rolled back.
            CommState::Matched | CommState::Aborted => {}
        }
    }

    fn set_siblings(&self, siblings: Vec<Weak<dyn CommControl>>) {
        *self.siblings.borrow_mut() = siblings;
    }

    fn clear_siblings(&self) {
        self.siblings.borrow_mut().clear();
    }

    fn has_sibling(&self, id: EventId) -> bool {
        self.siblings
            .borrow()
            .iter()
            .any(|s| s.upgrade().is_some_and(|ctl| ctl.completion().id() == id))
    }
}

// ── Public handles ────────────────────────────────────────────────────────────

/// A type-erased communication event handle — the currency of
/// [`select`][crate::select] and [`execute`][crate::execute].
pub struct Comm {
    pub(crate) ctl: Rc<dyn CommControl>,
}

impl Clone for Comm {
    fn clone(&self) -> Comm {
        Comm {
            ctl: self.ctl.clone(),
        }
    }
}

impl Comm {
    /// Did this event win its rendezvous?
    pub fn selected(&self) -> bool {
        self.ctl.completion().is_triggered()
    }

    pub fn state(&self) -> CommState {
        self.ctl.state()
    }

    /// Arm this event and return its completion event without suspending —
    /// for explicit compositions such as racing a receive against a
    /// [`timeout`][csp_kernel::Env::timeout] with
    /// [`AnyOf`][csp_kernel::AnyOf].
    pub fn start(&self) -> CspResult<Event> {
        self.ctl.clone().arm()?;
        Ok(self.ctl.completion().clone())
    }

    /// Cooperatively cancel this event.  A no-op once it has matched.
    /// An owner suspended on the event observes [`CspError::Cancelled`].
    pub fn cancel(&self) {
        self.ctl.clone().cancel();
    }
}

/// The sending side of a potential rendezvous, carrying the outgoing entity.
pub struct Sender<T> {
    pub(crate) core: Rc<CommCore<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Sender<T> {
        Sender {
            core: self.core.clone(),
        }
    }
}

impl<T: 'static> Sender<T> {
    /// Type-erased handle for `select`/`execute`.
    pub fn comm(&self) -> Comm {
        Comm {
            ctl: self.core.clone(),
        }
    }

    pub fn selected(&self) -> bool {
        self.core.completion.is_triggered()
    }

    pub fn is_aborted(&self) -> bool {
        self.core.state.get() == CommState::Aborted
    }

    /// Arm without suspending; see [`Comm::start`].
    pub fn start(&self) -> CspResult<Event> {
        self.comm().start()
    }

    /// Arm and suspend until the entity has been handed to a receiver.
    ///
    /// Yields [`CspError::Cancelled`] if the event is withdrawn (via
    /// [`Comm::cancel`] on any clone of the handle) while suspended — the
    /// entity was handed to nobody.
    pub async fn communicate(&self) -> CspResult<()> {
        match self.start()?.wait().await {
            EventState::Triggered => Ok(()),
            _ => Err(CspError::Cancelled),
        }
    }
}

/// The receiving side of a potential rendezvous.
pub struct Receiver<T> {
    pub(crate) core: Rc<CommCore<T>>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Receiver<T> {
        Receiver {
            core: self.core.clone(),
        }
    }
}

impl<T: 'static> Receiver<T> {
    /// Type-erased handle for `select`/`execute`.
    pub fn comm(&self) -> Comm {
        Comm {
            ctl: self.core.clone(),
        }
    }

    pub fn selected(&self) -> bool {
        self.core.completion.is_triggered()
    }

    pub fn is_aborted(&self) -> bool {
        self.core.state.get() == CommState::Aborted
    }

    /// Arm without suspending; see [`Comm::start`].
    pub fn start(&self) -> CspResult<Event> {
        self.comm().start()
    }

    /// Arm and suspend until a sender's entity arrives.
    ///
    /// Yields [`CspError::Cancelled`] if the event is withdrawn (via
    /// [`Comm::cancel`] on any clone of the handle) while suspended.
    pub async fn communicate(&self) -> CspResult<T> {
        match self.start()?.wait().await {
            EventState::Triggered => match self.core.slot.borrow_mut().take() {
                Some(entity) => Ok(entity),
                None => unreachable!("receiver completed without an entity"),
            },
            _ => Err(CspError::Cancelled),
        }
    }

    /// Take the received entity after this receiver won a select.
    /// `None` if it lost, or if the entity was already taken.
    pub fn entity(&self) -> Option<T> {
        self.core.slot.borrow_mut().take()
    }
}
