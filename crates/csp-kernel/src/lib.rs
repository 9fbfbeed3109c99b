//! `csp-kernel` — discrete-event scheduler and process executor for the
//! `rust_csp` rendezvous kernel.
//!
//! # Execution model
//!
//! ```text
//! loop:
//!   ① Poll     — drain the ready queue, polling each runnable process
//!                until it suspends on an event or finishes.
//!   ② Advance  — pop the earliest (time, seq) entry and move the clock
//!                to its due time (never backwards).
//!   ③ Trigger  — resolve the entry's event; its waiters become runnable.
//! ```
//!
//! Single-threaded and cooperative: exactly one process runs between
//! suspension points, so kernel state needs no locking.  Events due at the
//! same virtual time resolve in scheduling order — the sequence number in
//! [`EventQueue`] makes same-time ordering deterministic, which the channel
//! layer's two-step rendezvous hand-off depends on.
//!
//! # Module map
//!
//! | Module      | Contents                                      |
//! |-------------|-----------------------------------------------|
//! | [`event`]   | `Event`, `EventState`, `Wait`, `AnyOf`        |
//! | [`queue`]   | `EventQueue` — (time, seq)-keyed min-queue    |
//! | [`process`] | `ProcessHandle`, executor waker plumbing      |
//! | [`env`]     | `Env` — clock, queue, spawn, run loop         |
//! | [`trace`]   | `TraceHook`, `NoopTrace` observer callbacks   |

pub mod env;
pub mod event;
pub mod process;
pub mod queue;
pub mod trace;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use env::Env;
pub use event::{AnyOf, Event, EventState, Wait};
pub use process::ProcessHandle;
pub use queue::EventQueue;
pub use trace::{NoopTrace, TraceHook};
