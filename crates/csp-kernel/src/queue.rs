//! `EventQueue` — the time-ordered queue of pending event triggers.
//!
//! # Why this exists
//!
//! The run loop needs two guarantees from its priority structure:
//!
//! 1. Earliest due time first (that is what advances the virtual clock).
//! 2. Deterministic FIFO order among entries due at the *same* time.
//!
//! The second is load-bearing: a rendezvous hand-off is modeled as two
//! zero-delay entries at the same timestamp — the sender's completion and
//! then the receiver's — and they must resolve in exactly that order.  A
//! monotonically increasing sequence number breaks ties, so the heap order
//! is total and independent of insertion accidents.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use csp_core::Time;

use crate::Event;

// ── Scheduled entry ───────────────────────────────────────────────────────────

struct Scheduled {
    due:   Time,
    seq:   u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Scheduled) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Scheduled) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Scheduled) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

/// Min-queue of `(due time, sequence)`-keyed event triggers.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    seq:  u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `event` to trigger at `due`.  Entries pushed for the same
    /// time pop in push order.
    pub fn push(&mut self, due: Time, event: Event) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Reverse(Scheduled { due, seq, event }));
    }

    /// Remove and return the earliest-due entry.
    pub fn pop(&mut self) -> Option<(Time, Event)> {
        let Reverse(entry) = self.heap.pop()?;
        Some((entry.due, entry.event))
    }

    /// The earliest due time currently enqueued, or `None` if empty.
    pub fn next_due(&self) -> Option<Time> {
        self.heap.peek().map(|Reverse(e)| e.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
