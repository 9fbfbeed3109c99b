//! Kernel error type.
//!
//! With one exception, every variant is a programming-contract violation in
//! the model graph: fatal to the run, raised synchronously at the point of
//! misuse, never retried.  Wrong-argument-type misuse (the other half of
//! the contract) is unrepresentable in Rust and has no variant here.
//!
//! The exception is `Cancelled` — the cooperative outcome observed by a
//! process whose pending event was withdrawn while it was suspended.  A
//! model may match on it and continue; unhandled, it aborts the run like
//! the rest.

use thiserror::Error;

/// The top-level error type for all `csp-*` crates.
///
/// `Clone + PartialEq` so tests can match on the exact violation and the
/// scheduler can both hand the error to the process handle and abort the run
/// with it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CspError {
    #[error("invalid delay {0}: must be finite and non-negative")]
    InvalidDelay(f64),

    #[error("communication events from different environments cannot be combined")]
    MixedEnvironments,

    #[error("communication event was already armed and cannot be reused")]
    AlreadyArmed,

    #[error("a process cannot communicate with itself")]
    SelfCommunication,

    #[error("event was cancelled before the operation completed")]
    Cancelled,
}

/// Shorthand result type for all `csp-*` crates.
pub type CspResult<T> = Result<T, CspError>;
