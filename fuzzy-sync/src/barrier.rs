//! Two-counter rendezvous barrier used at the start of every iteration.
//!
//! Each side owns one counter. To rendezvous a side increments its own
//! counter, then spins until the other side's counter catches up. Because
//! the increment happens before the first read, a side that increments
//! second still observes the other side's already-published increment on
//! its very first check — there is no window where both counters look
//! equal to a spinner without it having performed a fresh atomic read.
//!
//! The end of an iteration does not need a full rendezvous: each side just
//! records its own end timestamp, and the next iteration's start barrier
//! will catch a lagging party.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use crossbeam_utils::CachePadded;

/// Spins on `cond` until it returns `true`, optionally yielding the
/// thread between checks, and returns the number of iterations spun
/// (0 if `cond` was already true).
#[inline]
pub fn spin_until<F: FnMut() -> bool>(yield_in_wait: bool, mut cond: F) -> u64 {
    let mut spins = 0u64;
    while !cond() {
        spins += 1;
        if yield_in_wait {
            thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }
    spins
}

/// A's and B's rendezvous counters, padded onto distinct cache lines so
/// the two sides never false-share a line while spinning on each other.
pub struct Barrier {
    a_cntr: CachePadded<AtomicU32>,
    b_cntr: CachePadded<AtomicU32>,
}

impl Barrier {
    pub fn new() -> Self {
        Barrier {
            a_cntr: CachePadded::new(AtomicU32::new(0)),
            b_cntr: CachePadded::new(AtomicU32::new(0)),
        }
    }

    /// Zeroes both counters. Only safe to call when neither side is
    /// spinning on the barrier.
    pub fn reset(&self) {
        self.a_cntr.store(0, Ordering::Relaxed);
        self.b_cntr.store(0, Ordering::Relaxed);
    }

    pub fn a_cntr(&self) -> u32 {
        self.a_cntr.load(Ordering::Acquire)
    }

    pub fn b_cntr(&self) -> u32 {
        self.b_cntr.load(Ordering::Acquire)
    }

    /// A's half of the rendezvous: publish A's arrival, then wait for B
    /// to catch up. Returns the number of spins A performed.
    pub fn rendezvous_a(&self, yield_in_wait: bool) -> u64 {
        let target = self.a_cntr.fetch_add(1, Ordering::Release) + 1;
        spin_until(yield_in_wait, || self.b_cntr.load(Ordering::Acquire) == target)
    }

    /// B's half of the rendezvous. Returns the number of spins B
    /// performed, which is a direct measure of how much A lagged B by.
    pub fn rendezvous_b(&self, yield_in_wait: bool) -> u64 {
        let target = self.b_cntr.fetch_add(1, Ordering::Release) + 1;
        spin_until(yield_in_wait, || self.a_cntr.load(Ordering::Acquire) == target)
    }

    /// Bumps A's counter once without waiting. Used during cancellation
    /// (§4.6) to unblock a B that is spinning on the start barrier after
    /// `stop` has been raised: B will observe the new counter value, lose
    /// the rendezvous it was expecting, re-check `stop`, and exit instead
    /// of spinning forever.
    pub fn bump_a(&self) {
        self.a_cntr.fetch_add(1, Ordering::Release);
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}
