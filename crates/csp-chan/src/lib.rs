//! `csp-chan` — rendezvous channels and non-deterministic choice for the
//! `rust_csp` kernel.
//!
//! # Model
//!
//! A [`Channel`] is an unbuffered rendezvous point: a sender and a receiver
//! exchange an entity only at the instant both are willing.  The factories
//! [`Channel::send`] and [`Channel::receive`] produce *unarmed*
//! communication events; a process then either executes one directly or
//! offers several at once through [`select`], where exactly one wins and the
//! rest are cancelled.
//!
//! ```rust,ignore
//! // Receive from whichever channel is ready first:
//! let a = chan_a.receive();
//! let b = chan_b.receive();
//! select(vec![Some(a.comm()), Some(b.comm())]).await?;
//! if selected(Some(&a.comm())) {
//!     let entity = a.entity();
//! }
//! ```
//!
//! # Module map
//!
//! | Module      | Contents                                         |
//! |-------------|--------------------------------------------------|
//! | [`channel`] | `Channel`, pairing algorithm                     |
//! | [`comm`]    | `Sender`, `Receiver`, `Comm`, `CommState`        |
//! | [`select`]  | `select`, `execute`, `selected`                  |
//! | `waitset`   | O(1) wait-set arena (crate-internal)             |

pub mod channel;
pub mod comm;
pub mod select;
mod waitset;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use channel::Channel;
pub use comm::{Comm, CommState, Receiver, Sender};
pub use select::{execute, select, selected};
