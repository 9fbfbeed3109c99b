//! Process handles and the waker plumbing behind the executor.
//!
//! A process is a plain `Future` boxed into the environment's task table.
//! When it suspends on an event, the event stores a [`Waker`] that pushes the
//! process ID back onto the shared ready queue; the run loop drains that
//! queue and polls each process until it suspends again or finishes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::task::Wake;

use csp_core::{CspError, CspResult, ProcessId};

use crate::Event;

/// A boxed process computation.  Yields the fatal error, if any, once the
/// user future has finished and its result has been stored in the handle.
pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = Option<CspError>>>>;

// ── Ready queue ───────────────────────────────────────────────────────────────

/// FIFO of processes due to be polled.
///
/// Shared between the run loop and every waker the executor hands out.  The
/// mutex exists only to satisfy `Wake`'s `Send + Sync` bound — the kernel is
/// single-threaded, so it is never contended.
#[derive(Clone, Default)]
pub(crate) struct ReadyQueue {
    inner: Arc<Mutex<VecDeque<ProcessId>>>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, pid: ProcessId) {
        self.lock().push_back(pid);
    }

    pub(crate) fn pop(&self) -> Option<ProcessId> {
        self.lock().pop_front()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ProcessId>> {
        // Poisoning cannot leave the queue inconsistent: the critical
        // sections are single push/pop calls.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Waker that marks one process runnable again.
pub(crate) struct TaskWaker {
    pid:   ProcessId,
    ready: ReadyQueue,
}

impl TaskWaker {
    pub(crate) fn new(pid: ProcessId, ready: ReadyQueue) -> Self {
        TaskWaker { pid, ready }
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.ready.push(self.pid);
    }
}

// ── ProcessHandle ─────────────────────────────────────────────────────────────

/// Handle to a spawned process, resolving to the computation's return value.
///
/// The handle is single-consumer: both [`join`][ProcessHandle::join] and
/// [`try_result`][ProcessHandle::try_result] take it by value, so a stored
/// result can be claimed exactly once.
pub struct ProcessHandle<T> {
    completion: Event,
    result:     Rc<RefCell<Option<CspResult<T>>>>,
}

impl<T> ProcessHandle<T> {
    pub(crate) fn new(completion: Event, result: Rc<RefCell<Option<CspResult<T>>>>) -> Self {
        ProcessHandle { completion, result }
    }

    /// The event triggered when the process finishes — usable as a
    /// [`run_until`][crate::Env::run_until] target or awaited by other
    /// processes via [`Event::wait`].
    pub fn completion(&self) -> Event {
        self.completion.clone()
    }

    /// Has the process's result been stored?
    ///
    /// The stored result is authoritative, not the completion event: the
    /// event is a shared handle whose `trigger`/`abort` are reachable from
    /// outside the executor, and resolving it early must not make the
    /// handle report a result it does not have.
    pub fn is_finished(&self) -> bool {
        self.result.borrow().is_some()
    }

    /// Claim the result if the process has finished; otherwise hand the
    /// handle back.
    pub fn try_result(self) -> Result<CspResult<T>, Self> {
        let taken = self.result.borrow_mut().take();
        match taken {
            None => Err(self),
            Some(outcome) => Ok(outcome),
        }
    }

    /// Suspend until the process finishes and yield its result.
    ///
    /// Yields [`CspError::Cancelled`] if the completion event was resolved
    /// from outside the executor before the process actually finished.
    pub async fn join(self) -> CspResult<T> {
        self.completion.wait().await;
        match self.result.borrow_mut().take() {
            Some(outcome) => outcome,
            None => Err(CspError::Cancelled),
        }
    }
}
