//! Rendezvous channels and the pairing algorithm.
//!
//! A channel holds no buffer — only the sets of currently waiting senders
//! and receivers.  Communication happens at the instant both sides are
//! willing: whenever an arming leaves both wait sets non-empty, one sender
//! and one receiver are chosen uniformly at random and their hand-off is
//! resolved at the current virtual time.
//!
//! The random choice is the fairness guarantee: among multiple equally
//! eligible waiters nobody is favored by registration order, and with a
//! fixed environment seed the choice is still fully reproducible.

use std::cell::RefCell;
use std::rc::Rc;

use csp_core::{CspError, CspResult};
use csp_kernel::Env;

use crate::comm::{CommControl, CommCore, CommState, Receiver, Role, Sender};
use crate::waitset::WaitSet;

// ── Channel ───────────────────────────────────────────────────────────────────

pub(crate) struct ChanState<T> {
    pub(crate) senders:   WaitSet<T>,
    pub(crate) receivers: WaitSet<T>,
}

/// A rendezvous point through which processes exchange entities of type `T`.
///
/// Cheap to clone; all clones refer to the same channel.
///
/// # Example
///
/// ```rust,ignore
/// let chan: Channel<u32> = Channel::new(&env);
/// // In one process:
/// chan.send(5).communicate().await?;
/// // In another:
/// let value = chan.receive().communicate().await?;
/// ```
pub struct Channel<T> {
    env:   Env,
    state: Rc<RefCell<ChanState<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Channel<T> {
        Channel {
            env:   self.env.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T: 'static> Channel<T> {
    pub fn new(env: &Env) -> Channel<T> {
        Channel {
            env:   env.clone(),
            state: Rc::new(RefCell::new(ChanState {
                senders:   WaitSet::new(),
                receivers: WaitSet::new(),
            })),
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// An unarmed sender carrying `entity`.  Pure factory: the channel's
    /// wait sets are untouched until the event is armed.
    pub fn send(&self, entity: T) -> Sender<T> {
        Sender {
            core: CommCore::new(
                self.env.clone(),
                self.state.clone(),
                Role::Sender,
                Some(entity),
            ),
        }
    }

    /// An unarmed receiver.  Pure factory, like [`send`][Channel::send].
    pub fn receive(&self) -> Receiver<T> {
        Receiver {
            core: CommCore::new(self.env.clone(), self.state.clone(), Role::Receiver, None),
        }
    }

    /// Number of senders currently waiting for a peer.
    pub fn waiting_senders(&self) -> usize {
        self.state.borrow().senders.len()
    }

    /// Number of receivers currently waiting for a peer.
    pub fn waiting_receivers(&self) -> usize {
        self.state.borrow().receivers.len()
    }
}

// ── Pairing ───────────────────────────────────────────────────────────────────

/// Attempt one rendezvous on `chan`; called after every arming.
///
/// If both wait sets are non-empty, one sender and one receiver are drawn
/// uniformly at random.  A draw that pairs two siblings of one select group
/// is a process trying to communicate with itself — rejected as
/// [`CspError::SelfCommunication`], never silently allowed.
///
/// On a valid draw both sides leave their wait sets, every *other* sibling
/// of each is cancelled, the entity moves into the receiver, and the two
/// completions are scheduled as zero-delay entries: the sender's first, the
/// receiver's second.  The queue's same-time FIFO order therefore resolves
/// the sender strictly before the receiver's value becomes visible, even
/// though both complete at the identical virtual time.
pub(crate) fn try_communication<T: 'static>(
    env:  &Env,
    chan: &Rc<RefCell<ChanState<T>>>,
) -> CspResult<()> {
    let (sender, receiver) = {
        let mut state = chan.borrow_mut();
        if state.senders.is_empty() || state.receivers.is_empty() {
            return Ok(());
        }

        let si = env.with_rng(|rng| rng.gen_range(0..state.senders.len()));
        let ri = env.with_rng(|rng| rng.gen_range(0..state.receivers.len()));
        let sender = state.senders.get(si).clone();
        let receiver = state.receivers.get(ri).clone();

        if sender.has_sibling(receiver.completion.id())
            || receiver.has_sibling(sender.completion.id())
        {
            return Err(CspError::SelfCommunication);
        }

        state.senders.remove(&sender);
        state.receivers.remove(&receiver);
        (sender, receiver)
    };
    // The chan borrow is released: sibling cancellation below may re-enter
    // this channel's wait sets.

    sender.state.set(CommState::Matched);
    receiver.state.set(CommState::Matched);
    sender.cancel_siblings();
    receiver.cancel_siblings();

    // The entity moves now, but the receiving process can only observe it
    // once its completion fires — strictly after the sender's.
    let entity = sender.slot.borrow_mut().take();
    *receiver.slot.borrow_mut() = entity;

    env.schedule(&sender.completion, 0.0)?;
    env.schedule(&receiver.completion, 0.0)?;
    Ok(())
}
