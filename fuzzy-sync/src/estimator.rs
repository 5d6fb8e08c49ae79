//! Converts window timings into the signed delay bias the next iteration
//! should apply.
//!
//! `delay < 0` means B should delay `|delay|` spin units on its next
//! start; `delay > 0` means A should delay that many; `delay == 0` means
//! neither delays. A single signed field is kept rather than splitting
//! into two unsigned delays, because the two race windows can sit on
//! either side of each other within their threads' iterations — sometimes
//! A must wait for B, sometimes B must wait for A, and a one-sided delay
//! cannot express both.

use crate::stat::Stat;

/// Used for `delay_inc_ns` when B has never lost the start-barrier race
/// during sampling, so no spin has ever been timed. A wildly wrong guess
/// here only costs a few extra sampling iterations before the clamp in
/// [`estimate_delay`] catches it; it is not load-bearing for correctness.
pub const FALLBACK_SPIN_NS: f64 = 50.0;

/// The measured duration of one spin unit, in nanoseconds.
///
/// Backed by a [`Stat`] that is only ever fed samples when B actually had
/// to spin (`spin_count > 0` in [`crate::pair::Pair::start_race_b`]), so
/// `delay_inc.samples() == 0` is exactly the "B never lost the race"
/// condition from the design notes.
pub fn delay_inc_ns(delay_inc: &Stat) -> f64 {
    if delay_inc.samples() == 0 {
        FALLBACK_SPIN_NS
    } else {
        delay_inc.avg().max(1.0)
    }
}

/// Recomputes the signed delay bias from the current alignment-error and
/// window-length stats.
///
/// ```text
/// target_ns = (diff_sb.avg - diff_sa.avg) / 2   // shift so windows share a midpoint
/// bias_ns   = diff_ss.avg - target_ns
/// delay     = round(bias_ns / delay_inc_ns)
/// ```
///
/// The result is clamped so that `|delay| * delay_inc_ns <= 2 *
/// max(diff_sa.avg, diff_sb.avg)`, preventing runaway over-correction
/// when one window is nearly zero-length.
pub fn estimate_delay(diff_ss: &Stat, diff_sa: &Stat, diff_sb: &Stat, delay_inc_ns: f64) -> i64 {
    let target_ns = (diff_sb.avg() - diff_sa.avg()) / 2.0;
    let bias_ns = diff_ss.avg() - target_ns;
    let raw = (bias_ns / delay_inc_ns).round();

    let cap_ns = 2.0 * diff_sa.avg().max(diff_sb.avg());
    if !cap_ns.is_finite() || cap_ns <= 0.0 {
        return 0;
    }
    let max_units = (cap_ns / delay_inc_ns).floor();

    if raw.is_nan() {
        0
    } else {
        raw.clamp(-max_units, max_units) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::DEFAULT_ALPHA;

    fn stat_at(avg: f64) -> Stat {
        let s = Stat::new();
        s.update(DEFAULT_ALPHA, avg);
        s
    }

    #[test]
    fn delay_inc_falls_back_when_uncalibrated() {
        let uncalibrated = Stat::new();
        assert_eq!(delay_inc_ns(&uncalibrated), FALLBACK_SPIN_NS);
    }

    #[test]
    fn delay_inc_uses_calibrated_average() {
        let calibrated = Stat::new();
        calibrated.update(DEFAULT_ALPHA, 30.0);
        assert_eq!(delay_inc_ns(&calibrated), 30.0);
    }

    #[test]
    fn zero_alignment_error_yields_zero_delay_when_windows_match() {
        let diff_ss = stat_at(0.0);
        let diff_sa = stat_at(1_000.0);
        let diff_sb = stat_at(1_000.0);
        assert_eq!(estimate_delay(&diff_ss, &diff_sa, &diff_sb, 10.0), 0);
    }

    #[test]
    fn positive_alignment_error_yields_positive_delay() {
        // a_start trails b_start by 500ns on equal-length windows.
        let diff_ss = stat_at(500.0);
        let diff_sa = stat_at(1_000.0);
        let diff_sb = stat_at(1_000.0);
        let delay = estimate_delay(&diff_ss, &diff_sa, &diff_sb, 10.0);
        assert_eq!(delay, 50);
    }

    #[test]
    fn sign_flips_with_alignment_error() {
        let diff_sa = stat_at(1_000.0);
        let diff_sb = stat_at(1_000.0);
        let positive = estimate_delay(&stat_at(500.0), &diff_sa, &diff_sb, 10.0);
        let negative = estimate_delay(&stat_at(-500.0), &diff_sa, &diff_sb, 10.0);
        assert_eq!(positive, -negative);
    }

    #[test]
    fn clamps_runaway_correction_for_near_zero_window() {
        let diff_ss = stat_at(1_000_000.0);
        let diff_sa = stat_at(1.0);
        let diff_sb = stat_at(0.0);
        let delay = estimate_delay(&diff_ss, &diff_sa, &diff_sb, 1.0);
        // cap_ns = 2 * max(1.0, 0.0) = 2.0, delay_inc_ns = 1.0 -> max_units = 2
        assert!(delay.abs() <= 2);
    }

    #[test]
    fn degenerate_zero_length_windows_never_panic_or_overflow() {
        let diff_ss = stat_at(0.0);
        let diff_sa = stat_at(0.0);
        let diff_sb = stat_at(0.0);
        assert_eq!(estimate_delay(&diff_ss, &diff_sa, &diff_sb, 10.0), 0);
    }
}
