//! Virtual-time model.
//!
//! # Design
//!
//! Time is a single monotonically non-decreasing scalar, advanced only by the
//! scheduler when it pops the next due event — it has no relationship to
//! wall-clock time.  It is stored as `f64` because delays in this model are
//! real-valued (a process may wait 0.25 time units just as easily as 3).
//!
//! The newtype carries a *total* order via `f64::total_cmp` so it can key the
//! scheduler's priority queue.  NaN never enters the system: every delay is
//! validated at the `schedule`/`timeout` boundary before any arithmetic.

use std::cmp::Ordering;
use std::fmt;

/// A point on the simulation's virtual clock.
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    /// The point `delay` time units after `self`.
    #[inline]
    pub fn after(self, delay: f64) -> Time {
        Time(self.0 + delay)
    }

    /// Elapsed virtual time from `earlier` to `self`.
    #[inline]
    pub fn since(self, earlier: Time) -> f64 {
        self.0 - earlier.0
    }
}

impl PartialEq for Time {
    #[inline]
    fn eq(&self, other: &Time) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    #[inline]
    fn partial_cmp(&self, other: &Time) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    #[inline]
    fn cmp(&self, other: &Time) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::ops::Add<f64> for Time {
    type Output = Time;
    #[inline]
    fn add(self, rhs: f64) -> Time {
        Time(self.0 + rhs)
    }
}

impl std::ops::Sub for Time {
    type Output = f64;
    #[inline]
    fn sub(self, rhs: Time) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
