//! Demonstrates actually amplifying a data race: A and B both write to a
//! single shared, *non-atomic* byte inside their aligned windows, and
//! whichever write lands last is what gets recorded.
//!
//! This is the one place in the whole workspace where a shared location
//! is deliberately left racy. Per the design notes, the library's own
//! counters are atomic with explicit ordering, but the thing being raced
//! on must stay exactly as fragile as a real bug would leave it — fixing
//! it with atomics here would defeat the entire point of the library.

use std::cell::UnsafeCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fuzzy_sync::{Pair, PairConfig};

#[derive(Parser, Debug)]
#[command(name = "winner", version, about)]
struct Args {
    /// Path to write the CSV trace to.
    #[arg(short = 'f', long = "file")]
    file: String,

    #[arg(long, default_value_t = 100_000)]
    iterations: u64,

    #[arg(long, default_value_t = 10_000)]
    min_samples: u64,

    #[arg(long, default_value_t = false)]
    pin: bool,
}

/// A single byte raced on by both threads with no synchronization at
/// all. Reads and writes are plain loads/stores through a raw pointer:
/// the compiler is free to reorder or cache them exactly as it would any
/// other racy access, which is the point.
struct RacyCell(UnsafeCell<u8>);

// SAFETY: this is intentionally unsound under the aliasing model for any
// access pattern that expects sequential consistency. It exists only to
// give `fuzzy-sync` something real to race on; every `read`/`write` call
// site below is annotated with why the resulting race is acceptable here
// (it is the demonstrated behavior, not a bug to be papered over).
unsafe impl Sync for RacyCell {}

impl RacyCell {
    fn new(initial: u8) -> Self {
        RacyCell(UnsafeCell::new(initial))
    }

    /// # Safety
    /// Caller accepts that this may race with concurrent reads/writes on
    /// another thread; that race is the behavior under test.
    unsafe fn write(&self, value: u8) {
        *self.0.get() = value;
    }

    /// # Safety
    /// See [`RacyCell::write`].
    unsafe fn read(&self) -> u8 {
        *self.0.get()
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let file = match File::create(&args.file) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("winner: couldn't create {}: {}", args.file, err);
            return ExitCode::FAILURE;
        }
    };
    let mut out = BufWriter::new(file);
    if let Err(err) = writeln!(out, "winner,a_start,b_start,a_end,b_end") {
        eprintln!("winner: couldn't write CSV header: {}", err);
        return ExitCode::FAILURE;
    }

    let shared = Arc::new(RacyCell::new(b'A'));

    let pair = Arc::new(Pair::new(PairConfig {
        min_samples: args.min_samples,
        exec_loops: args.iterations,
        pin: args.pin,
        ..PairConfig::default()
    }));

    let shared_b = shared.clone();
    let reset_result = Pair::reset(
        &pair,
        Some(move |p: Arc<Pair>| {
            while p.run_b() {
                p.start_race_b();
                // SAFETY: see `RacyCell`'s doc comment; this write racing
                // with A's is exactly the scenario being demonstrated.
                unsafe { shared_b.write(b'B') };
                p.end_race_b();
            }
        }),
    );
    if let Err(err) = reset_result {
        eprintln!("winner: couldn't start B: {}", err);
        return ExitCode::FAILURE;
    }

    let mut b_wins = 0u64;
    let mut total = 0u64;

    while pair.run_a() {
        pair.start_race_a();
        // SAFETY: see `RacyCell`'s doc comment.
        unsafe { shared.write(b'A') };
        std::thread::sleep(Duration::from_nanos(1));
        // SAFETY: see `RacyCell`'s doc comment. Whatever is observed
        // here is the demonstration's whole point: either A's own write
        // survived, or B's concurrent write landed first.
        let observed = unsafe { shared.read() };
        pair.end_race_a();

        total += 1;
        if observed == b'B' {
            b_wins += 1;
        }

        if let Err(err) = writeln!(
            out,
            "{},{},{},{},{}",
            observed as char,
            pair.a_start(),
            pair.b_start(),
            pair.a_end(),
            pair.b_end()
        ) {
            eprintln!("winner: couldn't write CSV row: {}", err);
            return ExitCode::FAILURE;
        }
    }

    if let Err(err) = out.flush() {
        eprintln!("winner: couldn't flush CSV output: {}", err);
        return ExitCode::FAILURE;
    }

    let fraction_b = if total > 0 {
        b_wins as f64 / total as f64
    } else {
        0.0
    };
    log::info!(
        "winner: {} of {} iterations observed B ({:.3}), final delay = {}",
        b_wins,
        total,
        fraction_b,
        pair.delay()
    );

    ExitCode::SUCCESS
}
