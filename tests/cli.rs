use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("nark-pfmc").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("nark-pfmc"))
        .stdout(predicate::str::contains("--max-pages"));
}

#[test]
fn unreachable_endpoint_still_writes_summary() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("summary.csv");
    let mut cmd = Command::cargo_bin("nark-pfmc").unwrap();
    cmd.args([
        "--service-key",
        "dummy",
        "--base-url",
        "http://127.0.0.1:9/unreachable",
        "--out",
        out.to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Fetched 0 records"));
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        text.trim_start_matches('\u{feff}'),
        "year,prod_qty_sum,prmsn_qty_sum\n"
    );
}

#[test]
fn unknown_raw_extension_fails_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("summary.csv");
    let raw = dir.path().join("raw.txt");
    let mut cmd = Command::cargo_bin("nark-pfmc").unwrap();
    cmd.args([
        "--base-url",
        "http://127.0.0.1:9/unreachable",
        "--out",
        out.to_str().unwrap(),
        "--raw-out",
        raw.to_str().unwrap(),
    ]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Fetched").not())
        .stderr(predicate::str::contains("unsupported raw output format"));
}

#[test]
fn raw_format_flag_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("summary.csv");
    let raw = dir.path().join("raw.txt");
    let mut cmd = Command::cargo_bin("nark-pfmc").unwrap();
    cmd.args([
        "--base-url",
        "http://127.0.0.1:9/unreachable",
        "--out",
        out.to_str().unwrap(),
        "--raw-out",
        raw.to_str().unwrap(),
        "--raw-format",
        "json",
    ]);
    cmd.assert().success();
    assert!(out.exists());
    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&raw).unwrap()).unwrap();
    assert_eq!(v, serde_json::json!([]));
}

#[test]
fn failed_raw_write_keeps_summary() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("summary.csv");
    let raw = dir.path().join("no_such_dir").join("raw.csv");
    let mut cmd = Command::cargo_bin("nark-pfmc").unwrap();
    cmd.args([
        "--base-url",
        "http://127.0.0.1:9/unreachable",
        "--out",
        out.to_str().unwrap(),
        "--raw-out",
        raw.to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("could not save raw records"));
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        text.trim_start_matches('\u{feff}'),
        "year,prod_qty_sum,prmsn_qty_sum\n"
    );
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn fetch_online_single_page() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("live.csv");
    let mut cmd = Command::cargo_bin("nark-pfmc").unwrap();
    cmd.args(["--rows", "10", "--max-pages", "1", "--out", out.to_str().unwrap()]);
    cmd.assert().success();
    assert!(out.exists());
}
