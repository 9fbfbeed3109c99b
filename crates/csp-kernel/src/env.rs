//! The `Env` struct and its run loop.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use csp_core::{CspError, CspResult, EventId, ProcessId, SimRng, Time};
use rustc_hash::FxHashMap;

use crate::process::{ReadyQueue, TaskFuture, TaskWaker};
use crate::{Event, EventQueue, NoopTrace, ProcessHandle, TraceHook};

// ── Core state ────────────────────────────────────────────────────────────────

/// All mutable kernel state, behind one `RefCell`.
///
/// Mutation only ever happens on the single active execution path (the run
/// loop, or a process it is currently polling), so borrows are short and
/// never overlap a process poll.
struct Core {
    /// The virtual clock.  Advanced only when the run loop pops a due entry.
    now: Time,

    /// Time-ordered queue of pending event triggers.
    queue: EventQueue,

    /// Suspended and runnable process computations, by ID.
    tasks: FxHashMap<ProcessId, TaskFuture>,

    /// Seeded RNG feeding the kernel's two randomized points (pairing
    /// choice, select arm order) and anything the model wants.
    rng: SimRng,

    next_pid: u32,
    next_eid: u64,
}

// ── Env ───────────────────────────────────────────────────────────────────────

/// A simulation environment: virtual clock, event queue, and process
/// executor.
///
/// `Env` is a cheap cloneable handle; every clone refers to the same
/// environment.  Processes capture a clone to schedule timeouts and spawn
/// further processes.
///
/// # Example
///
/// ```rust,ignore
/// let env = Env::new(42);
/// let handle = env.spawn({
///     let env = env.clone();
///     async move {
///         env.timeout(3.0)?.wait().await;
///         Ok(env.now())
///     }
/// });
/// let end = env.run()?;
/// ```
#[derive(Clone)]
pub struct Env {
    core:  Rc<RefCell<Core>>,
    ready: ReadyQueue,
    trace: Rc<RefCell<Box<dyn TraceHook>>>,
}

impl Env {
    /// Create an environment with its clock at zero and the given RNG seed.
    /// The same seed always produces an identical run.
    pub fn new(seed: u64) -> Env {
        Env {
            core:  Rc::new(RefCell::new(Core {
                now:      Time::ZERO,
                queue:    EventQueue::new(),
                tasks:    FxHashMap::default(),
                rng:      SimRng::new(seed),
                next_pid: 0,
                next_eid: 0,
            })),
            ready: ReadyQueue::new(),
            trace: Rc::new(RefCell::new(Box::new(NoopTrace))),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The current virtual time.
    pub fn now(&self) -> Time {
        self.core.borrow().now
    }

    /// Number of event triggers still enqueued.
    pub fn pending_triggers(&self) -> usize {
        self.core.borrow().queue.len()
    }

    /// Number of processes that have been spawned but not yet finished.
    pub fn live_processes(&self) -> usize {
        self.core.borrow().tasks.len()
    }

    /// Do two handles refer to the same environment?
    pub fn same_env(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Run a closure against this environment's seeded RNG.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut SimRng) -> R) -> R {
        f(&mut self.core.borrow_mut().rng)
    }

    /// Install a trace hook, replacing the current one.
    pub fn set_trace(&self, hook: Box<dyn TraceHook>) {
        *self.trace.borrow_mut() = hook;
    }

    // ── Event factories ───────────────────────────────────────────────────

    /// A fresh, pending, unscheduled event.
    pub fn event(&self) -> Event {
        let mut core = self.core.borrow_mut();
        let id = EventId(core.next_eid);
        core.next_eid += 1;
        Event::new(id)
    }

    /// Enqueue `event` to trigger `delay` time units from now.
    ///
    /// `delay` must be finite and non-negative; anything else is a
    /// contract violation ([`CspError::InvalidDelay`]).  Events scheduled
    /// for the identical time trigger in scheduling order.
    pub fn schedule(&self, event: &Event, delay: f64) -> CspResult<()> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(CspError::InvalidDelay(delay));
        }
        let mut core = self.core.borrow_mut();
        let due = core.now.after(delay);
        core.queue.push(due, event.clone());
        Ok(())
    }

    /// A fresh event pre-scheduled to trigger after `delay` — the canonical
    /// way a process suspends for a duration:
    /// `env.timeout(2.5)?.wait().await`.
    pub fn timeout(&self, delay: f64) -> CspResult<Event> {
        let event = self.event();
        self.schedule(&event, delay)?;
        Ok(event)
    }

    // ── Processes ─────────────────────────────────────────────────────────

    /// Register a new process.  The returned handle resolves to the
    /// computation's return value.
    ///
    /// The process first runs during [`run`][Env::run], at the current
    /// virtual time, after all earlier-spawned runnable processes.
    pub fn spawn<T, F>(&self, computation: F) -> ProcessHandle<T>
    where
        T: 'static,
        F: Future<Output = CspResult<T>> + 'static,
    {
        let completion = self.event();
        let result: Rc<RefCell<Option<CspResult<T>>>> = Rc::new(RefCell::new(None));

        let task: TaskFuture = Box::pin({
            let slot = result.clone();
            let done = completion.clone();
            async move {
                let outcome = computation.await;
                let fatal = outcome.as_ref().err().cloned();
                *slot.borrow_mut() = Some(outcome);
                done.trigger();
                fatal
            }
        });

        let pid = {
            let mut core = self.core.borrow_mut();
            let pid = ProcessId(core.next_pid);
            core.next_pid += 1;
            core.tasks.insert(pid, task);
            pid
        };
        self.ready.push(pid);
        self.trace.borrow_mut().on_spawn(pid);

        ProcessHandle::new(completion, result)
    }

    // ── Run loop ──────────────────────────────────────────────────────────

    /// Drive the simulation until the event queue is empty.  Returns the
    /// final virtual time.
    ///
    /// The first process to fail with a [`CspError`] aborts the run with
    /// that error — contract violations mean the model graph is malformed,
    /// so the kernel never retries or continues past them.
    ///
    /// Must not be called from inside a process.
    pub fn run(&self) -> CspResult<Time> {
        self.run_inner(None)
    }

    /// Like [`run`][Env::run], but also stops once `target` has resolved.
    pub fn run_until(&self, target: &Event) -> CspResult<Time> {
        self.run_inner(Some(target))
    }

    fn run_inner(&self, until: Option<&Event>) -> CspResult<Time> {
        loop {
            self.poll_runnable()?;

            if let Some(target) = until {
                if !target.is_pending() {
                    break;
                }
            }

            let next = self.core.borrow_mut().queue.pop();
            let Some((due, event)) = next else { break };

            {
                let mut core = self.core.borrow_mut();
                debug_assert!(due >= core.now, "event queue produced a past time");
                core.now = due;
            }
            self.trace.borrow_mut().on_clock_advance(due);

            // A cancelled event's entry pops as a no-op.
            if event.trigger() {
                self.trace.borrow_mut().on_event_triggered(event.id(), due);
            }
        }
        Ok(self.now())
    }

    /// Poll every runnable process until all are suspended or finished.
    fn poll_runnable(&self) -> CspResult<()> {
        while let Some(pid) = self.ready.pop() {
            // A finished process may still receive spurious wakes.
            let Some(mut task) = self.core.borrow_mut().tasks.remove(&pid) else {
                continue;
            };

            let waker = Waker::from(Arc::new(TaskWaker::new(pid, self.ready.clone())));
            let mut cx = Context::from_waker(&waker);

            // The core borrow is released here: the polled process calls
            // back into this environment through its own `Env` clone.
            match task.as_mut().poll(&mut cx) {
                Poll::Pending => {
                    self.core.borrow_mut().tasks.insert(pid, task);
                }
                Poll::Ready(None) => {
                    self.trace.borrow_mut().on_process_finished(pid);
                }
                Poll::Ready(Some(error)) => {
                    self.trace.borrow_mut().on_process_finished(pid);
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}
