//! Demonstration binary driving `fuzzy-sync` against a synthetic race
//! window and recording a CSV trace, mirroring the design's basic test.
//!
//! This binary, its CSV format, and its CLI are explicitly outside the
//! core engine's scope: they are a consumer of `fuzzy-sync::Pair`, not
//! part of it, in the same way the `bastion` crate is a consumer of
//! `bastion-executor` rather than part of the executor itself.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fuzzy_sync::{Pair, PairConfig};

/// Drives a synthetic two-thread race and records a CSV trace of every
/// iteration's timestamps.
#[derive(Parser, Debug)]
#[command(name = "basic", version, about)]
struct Args {
    /// Path to write the CSV trace to.
    #[arg(short = 'f', long = "file")]
    file: String,

    /// Number of spin units A burns inside its window.
    #[arg(long, default_value_t = 400)]
    a_window: u32,

    /// Number of spin units B burns inside its window.
    #[arg(long, default_value_t = 400)]
    b_window: u32,

    /// Iterations to run before stopping.
    #[arg(long, default_value_t = 100_000)]
    iterations: u64,

    /// Minimum sampling iterations before the delay bias is frozen.
    #[arg(long, default_value_t = 1024)]
    min_samples: u64,

    /// Pin A to core 0 and B to core 1, when available.
    #[arg(long, default_value_t = false)]
    pin: bool,
}

fn spin(units: u32) {
    for _ in 0..units {
        std::hint::spin_loop();
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let file = match File::create(&args.file) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("basic: couldn't create {}: {}", args.file, err);
            return ExitCode::FAILURE;
        }
    };
    let mut out = BufWriter::new(file);
    if let Err(err) = writeln!(out, "winner,a_start,b_start,a_end,b_end") {
        eprintln!("basic: couldn't write CSV header: {}", err);
        return ExitCode::FAILURE;
    }

    let pair = Arc::new(Pair::new(PairConfig {
        min_samples: args.min_samples,
        exec_loops: args.iterations,
        pin: args.pin,
        ..PairConfig::default()
    }));

    let b_window = args.b_window;
    let reset_result = Pair::reset(
        &pair,
        Some(move |p: Arc<Pair>| {
            while p.run_b() {
                p.start_race_b();
                spin(b_window);
                p.end_race_b();
            }
        }),
    );
    if let Err(err) = reset_result {
        eprintln!("basic: couldn't start B: {}", err);
        return ExitCode::FAILURE;
    }

    while pair.run_a() {
        pair.start_race_a();
        spin(args.a_window);
        pair.end_race_a();

        // "winner" here just records which side's window opened first;
        // there is no shared racy variable in this demonstration (see
        // the `winner` binary for that).
        let winner = if pair.a_start() <= pair.b_start() { "A" } else { "B" };
        if let Err(err) = writeln!(
            out,
            "{},{},{},{},{}",
            winner,
            pair.a_start(),
            pair.b_start(),
            pair.a_end(),
            pair.b_end()
        ) {
            eprintln!("basic: couldn't write CSV row: {}", err);
            return ExitCode::FAILURE;
        }
    }

    if let Err(err) = out.flush() {
        eprintln!("basic: couldn't flush CSV output: {}", err);
        return ExitCode::FAILURE;
    }

    log::info!(
        "basic: completed {} iterations, final delay = {}",
        pair.exec_loop(),
        pair.delay()
    );
    ExitCode::SUCCESS
}
