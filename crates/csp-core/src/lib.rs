//! `csp-core` — foundational types for the `rust_csp` rendezvous kernel.
//!
//! This crate is a dependency of every other `csp-*` crate.  It intentionally
//! has no `csp-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                  |
//! |-----------|-------------------------------------------|
//! | [`ids`]   | `ProcessId`, `EventId`                    |
//! | [`time`]  | `Time` — the virtual-clock scalar         |
//! | [`rng`]   | `SimRng` (per-environment, seeded)        |
//! | [`error`] | `CspError`, `CspResult`                   |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod error;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CspError, CspResult};
pub use ids::{EventId, ProcessId};
pub use rng::SimRng;
pub use time::Time;
