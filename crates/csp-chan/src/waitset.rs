//! `WaitSet` — a channel side's collection of waiting communication events.
//!
//! # Why this exists
//!
//! The pairing algorithm needs three operations on each side of a channel:
//! uniform random indexing (fairness), removal of an arbitrary member (a
//! match or a sibling cancellation), and insertion.  A plain list makes
//! removal a linear scan; a map makes uniform indexing awkward.
//!
//! `WaitSet` is a `Vec` arena with back-pointers: every member caches its
//! own position, insertion pushes, and removal swap-removes and patches the
//! moved member's cached index.  All three operations are O(1).
//!
//! Membership is exclusive: a communication event is in at most one wait set
//! at a time, so a single cached index per event suffices.

use std::rc::Rc;

use crate::comm::CommCore;

pub(crate) struct WaitSet<T> {
    items: Vec<Rc<CommCore<T>>>,
}

impl<T> WaitSet<T> {
    pub(crate) fn new() -> Self {
        WaitSet { items: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> &Rc<CommCore<T>> {
        &self.items[index]
    }

    pub(crate) fn insert(&mut self, comm: Rc<CommCore<T>>) {
        debug_assert!(
            comm.wait_index.get().is_none(),
            "communication event already in a wait set"
        );
        comm.wait_index.set(Some(self.items.len()));
        self.items.push(comm);
    }

    /// Remove `comm`, patching the index of whichever member is swapped into
    /// its slot.  Returns `false` if `comm` was not a member.
    pub(crate) fn remove(&mut self, comm: &CommCore<T>) -> bool {
        let Some(index) = comm.wait_index.take() else {
            return false;
        };
        self.items.swap_remove(index);
        if let Some(moved) = self.items.get(index) {
            moved.wait_index.set(Some(index));
        }
        true
    }
}
