//! Cross-thread invariants and lifecycle laws from the design's testable
//! properties: these exercise real OS threads (the engine has nothing
//! meaningful to say about a single-threaded mock of itself).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fuzzy_sync::{monotonic_now, Pair, PairConfig};

fn config(min_samples: u64, exec_loops: u64) -> PairConfig {
    PairConfig {
        min_samples,
        exec_loops,
        ..PairConfig::default()
    }
}

fn run_basic_pair(min_samples: u64, exec_loops: u64) -> Arc<Pair> {
    let pair = Arc::new(Pair::new(config(min_samples, exec_loops)));
    Pair::reset(
        &pair,
        Some(|p: Arc<Pair>| {
            while p.run_b() {
                p.start_race_b();
                p.end_race_b();
            }
        }),
    )
    .expect("reset should spawn B");

    while pair.run_a() {
        pair.start_race_a();
        pair.end_race_a();
    }

    pair
}

#[test]
fn monotone_clock_within_one_thread() {
    let mut last = monotonic_now();
    for _ in 0..50_000 {
        let next = monotonic_now();
        assert!(next >= last, "clock went backwards: {} -> {}", last, next);
        last = next;
    }
}

#[test]
fn start_precedes_end_on_both_sides_every_iteration() {
    let started = AtomicU64::new(0);
    let observed_bad = AtomicU64::new(0);

    let pair = Arc::new(Pair::new(config(50, 2_000)));
    let starts_b = Arc::new(AtomicU64::new(0));
    let sb = starts_b.clone();

    Pair::reset(
        &pair,
        Some(move |p: Arc<Pair>| {
            while p.run_b() {
                p.start_race_b();
                p.end_race_b();
                if p.b_start() > p.b_end() {
                    sb.fetch_add(1, Ordering::Relaxed);
                }
            }
        }),
    )
    .unwrap();

    while pair.run_a() {
        pair.start_race_a();
        pair.end_race_a();
        started.fetch_add(1, Ordering::Relaxed);
        if pair.a_start() > pair.a_end() {
            observed_bad.fetch_add(1, Ordering::Relaxed);
        }
    }

    assert!(started.load(Ordering::Relaxed) > 0);
    assert_eq!(observed_bad.load(Ordering::Relaxed), 0);
    assert_eq!(starts_b.load(Ordering::Relaxed), 0);
}

#[test]
fn barrier_counters_never_drift_more_than_one_apart() {
    let pair = run_basic_pair(50, 2_000);
    let (a, b) = pair.barrier_counters();
    assert!((a as i64 - b as i64).abs() <= 1);
}

#[test]
fn cleanup_is_idempotent_after_a_full_run() {
    let pair = run_basic_pair(20, 200);
    pair.cleanup();
    pair.cleanup();
    pair.cleanup();
}

#[test]
fn reset_round_trip_matches_fresh_init() {
    let pair = Arc::new(Pair::new(config(20, 200)));

    Pair::reset(
        &pair,
        Some(|p: Arc<Pair>| {
            while p.run_b() {
                p.start_race_b();
                p.end_race_b();
            }
        }),
    )
    .unwrap();
    while pair.run_a() {
        pair.start_race_a();
        pair.end_race_a();
    }

    // A second reset must bring every timestamp, stat, counter and the
    // delay bias back to the same state a brand new `Pair` starts in.
    Pair::reset::<fn(Arc<Pair>)>(&pair, None).unwrap();

    assert_eq!(pair.a_start(), 0);
    assert_eq!(pair.a_end(), 0);
    assert_eq!(pair.b_start(), 0);
    assert_eq!(pair.b_end(), 0);
    assert_eq!(pair.delay(), 0);
    assert_eq!(pair.exec_loop(), 0);
    assert_eq!(pair.diff_ss().samples(), 0);
    assert_eq!(pair.diff_sa().samples(), 0);
    assert_eq!(pair.diff_sb().samples(), 0);
    assert!(!pair.is_amplifying());
}

#[test]
fn reset_refuses_to_clobber_a_still_running_b() {
    let pair = Arc::new(Pair::new(config(u64::MAX, u64::MAX)));

    Pair::reset(
        &pair,
        Some(|p: Arc<Pair>| {
            // Never returns on its own; only `cleanup`'s stop flag ends it.
            while p.run_b() {
                p.start_race_b();
                p.end_race_b();
            }
        }),
    )
    .unwrap();

    // B has nothing driving A's side of the barrier, so it is reliably
    // still parked in the rendezvous spin at this point.
    std::thread::sleep(std::time::Duration::from_millis(20));

    let result = Pair::reset::<fn(Arc<Pair>)>(&pair, None);
    assert!(result.is_err());

    pair.cleanup();
    Pair::reset::<fn(Arc<Pair>)>(&pair, None).unwrap();
}
