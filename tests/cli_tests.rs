// Command-line integration tests for the qc-outliers binary

#![allow(deprecated)] // Command::cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FIXTURE: &str = "tests/fixtures/qc_metrics.tsv";

// ============================================================================
// Test 1: Text report on the shifted fixture
// ============================================================================

#[test]
fn test_text_report_flags_shifted_runs() {
    let mut cmd = Command::cargo_bin("qc-outliers").unwrap();
    cmd.arg(FIXTURE).arg("-k").arg("3");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("=== QC Outlier Report ==="))
        .stdout(predicate::str::contains("e11: score"))
        .stdout(predicate::str::contains("e12: score"))
        .stdout(predicate::str::contains("subspace {C}"))
        .stdout(predicate::str::contains("derived from 20-bin histogram"));
}

// ============================================================================
// Test 2: JSON report is machine readable
// ============================================================================

#[test]
fn test_json_report() {
    let output = Command::cargo_bin("qc-outliers")
        .unwrap()
        .args([FIXTURE, "-k", "3", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let outliers = report["outliers"].as_array().unwrap();
    let ids: Vec<&str> = outliers.iter().filter_map(|o| o["id"].as_str()).collect();
    assert!(ids.contains(&"e11"));
    assert!(ids.contains(&"e12"));
    assert_eq!(report["threshold_derived"], true);
    assert_eq!(report["metrics"].as_array().unwrap().len(), 4);
    assert!(report["preprocessing"]["variances"].is_array());
}

// ============================================================================
// Test 3: Fixed threshold and skipped preprocessing
// ============================================================================

#[test]
fn test_fixed_threshold_without_preprocessing() {
    let mut cmd = Command::cargo_bin("qc-outliers").unwrap();
    cmd.args([FIXTURE, "-k", "3", "--min-outlier", "0.6", "--no-preprocess"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Outlier Threshold: 0.600 (fixed)"))
        .stdout(predicate::str::contains("e12: score"))
        .stdout(predicate::str::contains("e11: score").not())
        .stdout(predicate::str::contains("Preprocessing").not());
}

// ============================================================================
// Test 4: Report written to a file, settings from TOML
// ============================================================================

#[test]
fn test_config_file_and_output_file() {
    let tmp_dir = TempDir::new().unwrap();
    let config = tmp_dir.path().join("qc.toml");
    let report = tmp_dir.path().join("report.json");
    fs::write(
        &config,
        "[engine]\nk = 3\ndistance = \"euclidean\"\nmin_support = { absolute = 2 }\n\n[preprocess]\nscaling = \"standard\"\n",
    )
    .unwrap();

    Command::cargo_bin("qc-outliers")
        .unwrap()
        .arg(FIXTURE)
        .arg("--config")
        .arg(&config)
        .arg("--format")
        .arg("json")
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = fs::read_to_string(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["scores"]["metric"], "euclidean");
    assert_eq!(value["min_support"]["absolute"], 2);
    assert_eq!(value["preprocessing"]["scaling"], "standard");
}

// ============================================================================
// Test 5: Input from stdin
// ============================================================================

#[test]
fn test_reads_stdin() {
    let table = fs::read_to_string(FIXTURE).unwrap();
    Command::cargo_bin("qc-outliers")
        .unwrap()
        .args(["-", "-k", "3"])
        .write_stdin(table)
        .assert()
        .success()
        .stdout(predicate::str::contains("Experiments: 12"));
}

// ============================================================================
// Test 6: Errors
// ============================================================================

#[test]
fn test_missing_k_is_rejected() {
    Command::cargo_bin("qc-outliers")
        .unwrap()
        .arg(FIXTURE)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--k-neighbors"));
}

#[test]
fn test_k_too_large() {
    Command::cargo_bin("qc-outliers")
        .unwrap()
        .args([FIXTURE, "-k", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Insufficient data"));
}

#[test]
fn test_unknown_distance() {
    Command::cargo_bin("qc-outliers")
        .unwrap()
        .args([FIXTURE, "-k", "3", "--distance", "cosine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid distance metric"));
}

#[test]
fn test_missing_input_file() {
    Command::cargo_bin("qc-outliers")
        .unwrap()
        .args(["/nonexistent/metrics.tsv", "-k", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read metric table"));
}

#[test]
fn test_malformed_table() {
    let tmp_dir = TempDir::new().unwrap();
    let table = tmp_dir.path().join("bad.tsv");
    fs::write(&table, "run\ta\tb\nr1\t1.0\tn/a\n").unwrap();

    Command::cargo_bin("qc-outliers")
        .unwrap()
        .arg(&table)
        .args(["-k", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}
