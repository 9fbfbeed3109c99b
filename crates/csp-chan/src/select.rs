//! `select` — atomic non-deterministic choice among communication events —
//! plus the direct `execute` combinator and the `selected` outcome query.

use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use csp_core::{CspError, CspResult};
use csp_kernel::{Event, EventState};

use crate::comm::{Comm, CommControl, CommState};

// ── execute ───────────────────────────────────────────────────────────────────

/// Arm a single communication event and suspend until it completes.
///
/// For a receiver, the received entity is afterwards available through
/// [`Receiver::entity`][crate::Receiver::entity]; the typed
/// `communicate` methods on [`Sender`][crate::Sender] and
/// [`Receiver`][crate::Receiver] are usually more convenient.
///
/// Yields [`CspError::Cancelled`] if the event is withdrawn while
/// suspended.
pub async fn execute(comm: &Comm) -> CspResult<()> {
    match comm.start()?.wait().await {
        EventState::Triggered => Ok(()),
        _ => Err(CspError::Cancelled),
    }
}

// ── selected ──────────────────────────────────────────────────────────────────

/// Post-select outcome query: did this branch win?
///
/// `None` is the placeholder for a branch whose guard evaluated false and
/// always yields `false`.
pub fn selected(comm: Option<&Comm>) -> bool {
    match comm {
        None => false,
        Some(c) => c.selected(),
    }
}

// ── select ────────────────────────────────────────────────────────────────────

/// Arm several communication events as one atomic choice: exactly one may
/// complete, and all others are cancelled before this returns.
///
/// Branches are `Option<Comm>` so guarded alternatives can pass `None` for
/// a false guard; those are dropped before processing.  Returns the winning
/// branch's index in `branches`, or `None` when every guard was false (an
/// empty choice resolves immediately).
///
/// # Errors
///
/// - [`CspError::MixedEnvironments`] — branches from different environments.
/// - [`CspError::AlreadyArmed`] — a branch was armed before the call.
/// - [`CspError::SelfCommunication`] — arming paired two branches of this
///   group with each other.
///
/// # Liveness
///
/// A select with no peer ever appearing deadlocks its process; deadline
/// behavior is explicit composition with
/// [`Env::timeout`][csp_kernel::Env::timeout].
pub async fn select(branches: Vec<Option<Comm>>) -> CspResult<Option<usize>> {
    // Drop branches whose guard evaluated false.
    let present: Vec<(usize, Comm)> = branches
        .into_iter()
        .enumerate()
        .filter_map(|(i, b)| b.map(|c| (i, c)))
        .collect();
    if present.is_empty() {
        return Ok(None);
    }

    let env = present[0].1.ctl.env().clone();
    for (_, comm) in &present {
        if !env.same_env(comm.ctl.env()) {
            return Err(CspError::MixedEnvironments);
        }
        if comm.ctl.state() != CommState::Unarmed {
            return Err(CspError::AlreadyArmed);
        }
    }

    // Full mutual-exclusion graph: each branch's siblings are all others.
    for (i, (_, comm)) in present.iter().enumerate() {
        let siblings: Vec<Weak<dyn CommControl>> = present
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, (_, other))| Rc::downgrade(&other.ctl))
            .collect();
        comm.ctl.set_siblings(siblings);
    }

    // Randomized arming order: no branch may win merely by its position in
    // the argument list when several can complete immediately.
    let mut order: Vec<usize> = (0..present.len()).collect();
    env.with_rng(|rng| rng.shuffle(&mut order));
    for &i in &order {
        let ctl = &present[i].1.ctl;
        // An earlier arming may already have matched and cancelled this one.
        if ctl.state() != CommState::Unarmed {
            continue;
        }
        ctl.clone().arm()?;
    }

    let completions: Vec<Event> = present
        .iter()
        .map(|(_, comm)| comm.ctl.completion().clone())
        .collect();
    FirstTriggered {
        events: completions,
    }
    .await;

    for (_, comm) in &present {
        comm.ctl.clear_siblings();
    }
    let winner = present
        .iter()
        .find(|(_, comm)| comm.ctl.completion().is_triggered())
        .map(|(i, _)| *i);
    Ok(winner)
}

// ── FirstTriggered ────────────────────────────────────────────────────────────

/// Resolves once any event of the group is triggered.
///
/// Unlike [`AnyOf`][csp_kernel::AnyOf] this ignores aborted events: a losing
/// branch's completion aborts while the winner's trigger may still sit on
/// the queue as a zero-delay entry, and that wake-up must not end the wait.
struct FirstTriggered {
    events: Vec<Event>,
}

impl Future for FirstTriggered {
    type Output = Option<usize>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<usize>> {
        if let Some(i) = self.events.iter().position(|e| e.is_triggered()) {
            return Poll::Ready(Some(i));
        }
        let mut any_pending = false;
        for event in self.events.iter().filter(|e| e.is_pending()) {
            any_pending = true;
            event.register_waker(cx.waker().clone());
        }
        if any_pending {
            Poll::Pending
        } else {
            // Every member aborted without a winner.
            Poll::Ready(None)
        }
    }
}
