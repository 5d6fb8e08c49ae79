//! Monotonic nanosecond timestamp source.
//!
//! The estimator in [`crate::estimator`] treats differences between two
//! [`now`] calls as physical durations, so only a monotonic clock is
//! acceptable here; a wall-clock source would let NTP adjustments or leap
//! seconds masquerade as alignment drift.

use std::time::Instant;

use lazy_static::lazy_static;

lazy_static! {
    /// Epoch shared by every timestamp taken in the process. [`Instant`]
    /// itself has no cheap "as nanoseconds" representation, so all
    /// timestamps are offsets from this fixed point instead.
    static ref EPOCH: Instant = Instant::now();
}

/// Returns a monotonically non-decreasing nanosecond count.
///
/// Wait-free: this only reads the OS monotonic clock and subtracts a
/// fixed epoch, it never contends with other threads.
#[inline]
pub fn now() -> u64 {
    EPOCH.elapsed().as_nanos() as u64
}
