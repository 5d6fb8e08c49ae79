//! Exponentially-smoothed running mean and mean deviation.
//!
//! An EMA is used instead of a windowed mean because it is constant-space
//! and tracks drift (CPU frequency changes, thermal throttling) without
//! ever needing a reset. `alpha = 0.25` gives an effective horizon of
//! about four samples, trading responsiveness for stability.
//!
//! Some `Stat`s are written by A and read by B, or the reverse (`spins`
//! and `delay_inc` are written by B and read by A; `diff_sb` is written
//! by B and read by A's estimator). Rather than a lock, each field is
//! stored as an atomic word with relaxed ordering: the per-iteration
//! rendezvous barrier already establishes the happens-before edge that
//! makes a plain relaxed read of the *previous* iteration's value safe,
//! exactly as spec'd for the `delay` field in the coordinator.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default smoothing factor, see module docs.
pub const DEFAULT_ALPHA: f64 = 0.25;

/// A single exponentially-smoothed `(avg, avg_dev)` pair.
///
/// The first [`Stat::update`] call seeds `avg` directly with the sample
/// rather than smoothing against the zero-initialized average, so a fresh
/// `Stat` behaves as if it had no history at all.
#[derive(Debug, Default)]
pub struct Stat {
    avg_bits: AtomicU64,
    avg_dev_bits: AtomicU64,
    samples: AtomicU64,
}

impl Stat {
    /// A zeroed stat, as produced by `init`/`reset`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Running mean.
    #[inline]
    pub fn avg(&self) -> f64 {
        f64::from_bits(self.avg_bits.load(Ordering::Relaxed))
    }

    /// Running mean absolute deviation. Always non-negative.
    #[inline]
    pub fn avg_dev(&self) -> f64 {
        f64::from_bits(self.avg_dev_bits.load(Ordering::Relaxed))
    }

    /// Number of samples folded into this stat since the last [`Stat::reset`].
    #[inline]
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Zeroes the stat back to its post-`init` state.
    pub fn reset(&self) {
        self.avg_bits.store(0, Ordering::Relaxed);
        self.avg_dev_bits.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }

    /// Folds one new sample into the stat with smoothing factor `alpha`.
    pub fn update(&self, alpha: f64, sample: f64) {
        let samples = self.samples.load(Ordering::Relaxed);
        if samples == 0 {
            self.avg_bits.store(sample.to_bits(), Ordering::Relaxed);
            self.avg_dev_bits.store(0_f64.to_bits(), Ordering::Relaxed);
        } else {
            let avg = self.avg();
            let new_avg = avg + alpha * (sample - avg);
            let new_avg_dev = self.avg_dev() + alpha * ((sample - new_avg).abs() - self.avg_dev());
            self.avg_bits.store(new_avg.to_bits(), Ordering::Relaxed);
            self.avg_dev_bits.store(new_avg_dev.to_bits(), Ordering::Relaxed);
        }
        self.samples.store(samples + 1, Ordering::Relaxed);
    }

    /// Convenience: samples `end - start` as nanosecond durations (cast to
    /// `f64`) and folds the result in.
    pub fn update_diff(&self, alpha: f64, end_ts: u64, start_ts: u64) {
        let sample = end_ts as f64 - start_ts as f64;
        self.update(alpha, sample);
    }
}
