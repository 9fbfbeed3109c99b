//! Kernel trace hooks for progress reporting and debugging.

use csp_core::{EventId, ProcessId, Time};

/// Callbacks invoked by the [`Env`][crate::Env] run loop at key points.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Hooks receive plain values and must
/// not call back into the environment.
///
/// # Example — progress printer
///
/// ```rust,ignore
/// struct ClockPrinter;
///
/// impl TraceHook for ClockPrinter {
///     fn on_clock_advance(&mut self, now: Time) {
///         println!("clock -> {now}");
///     }
/// }
/// ```
pub trait TraceHook {
    /// Called when a new process is registered with the environment.
    fn on_spawn(&mut self, _pid: ProcessId) {}

    /// Called when a process's computation returns.
    fn on_process_finished(&mut self, _pid: ProcessId) {}

    /// Called each time the run loop advances the virtual clock.
    fn on_clock_advance(&mut self, _now: Time) {}

    /// Called when a queued event triggers.
    ///
    /// Not called for entries whose event was aborted in the meantime —
    /// those pop as no-ops.
    fn on_event_triggered(&mut self, _event: EventId, _now: Time) {}
}

/// A [`TraceHook`] that does nothing.  The default on every environment.
pub struct NoopTrace;

impl TraceHook for NoopTrace {}
