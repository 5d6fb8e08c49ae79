//! Statistical alignment of critical sections across two threads.
//!
//! `fuzzy-sync` helps trigger a rare data race reproducibly. Given two
//! threads, A (driver) and B (worker), that each execute a loop
//! containing an unknown "race window" — the interval during which a
//! racy access happens — the engine learns, from measured timings, the
//! delay to insert on one side so the two windows overlap on nearly
//! every iteration.
//!
//! The crate is a *probability amplifier*, not a race detector: it makes
//! no correctness guarantee, does not instrument memory, and does not
//! touch thread scheduling policy beyond optional voluntary yields.
//!
//! ```rust
//! use std::sync::Arc;
//! use fuzzy_sync::{Pair, PairConfig};
//!
//! let pair = Arc::new(Pair::new(PairConfig {
//!     min_samples: 64,
//!     exec_loops: 200,
//!     ..PairConfig::default()
//! }));
//!
//! Pair::reset(&pair, Some(|pair: Arc<Pair>| {
//!     while pair.run_b() {
//!         pair.start_race_b();
//!         // ... B's critical section ...
//!         pair.end_race_b();
//!     }
//! })).expect("failed to spawn B");
//!
//! while pair.run_a() {
//!     pair.start_race_a();
//!     // ... A's critical section ...
//!     pair.end_race_a();
//! }
//! ```

mod barrier;
mod clock;
mod estimator;
mod pair;
mod placement;
mod stat;

pub use crate::pair::{Pair, PairConfig};
pub use crate::placement::CoreId;
pub use crate::stat::Stat;

pub use crate::clock::now as monotonic_now;
