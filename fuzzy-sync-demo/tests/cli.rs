use std::io::Read;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn basic_writes_a_csv_trace_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.csv");

    Command::cargo_bin("basic")
        .unwrap()
        .args([
            "-f",
            path.to_str().unwrap(),
            "--iterations",
            "200",
            "--min-samples",
            "50",
        ])
        .assert()
        .success();

    let mut contents = String::new();
    std::fs::File::open(&path)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();

    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("winner,a_start,b_start,a_end,b_end"));
    let row_count = lines.count();
    assert_eq!(row_count, 200);
}

#[test]
fn basic_reports_a_setup_error_for_an_unwritable_path() {
    Command::cargo_bin("basic")
        .unwrap()
        .args(["-f", "/nonexistent-directory/trace.csv", "--iterations", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("couldn't create"));
}

#[test]
fn winner_writes_one_csv_row_per_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("winner.csv");

    Command::cargo_bin("winner")
        .unwrap()
        .args([
            "-f",
            path.to_str().unwrap(),
            "--iterations",
            "500",
            "--min-samples",
            "100",
        ])
        .assert()
        .success();

    let mut contents = String::new();
    std::fs::File::open(&path)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();

    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("winner,a_start,b_start,a_end,b_end"));
    assert_eq!(lines.count(), 500);
}
