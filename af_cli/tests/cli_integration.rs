use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_tuning(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("af.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[rstest]
#[case(&["scan"])]
#[case(&["scan", "--mode", "auto"])]
#[case(&["scan", "--no-pdaf", "--frames", "200"])]
#[case(&["scan", "--mode", "auto", "--no-pdaf", "--frames", "200"])]
fn scan_reaches_focus_on_a_synthetic_peak(#[case] args: &[&str]) {
    let mut cmd = Command::cargo_bin("af_cli").unwrap();
    cmd.args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("focus: Focused"));
}

#[test]
fn help_lists_the_scan_command() {
    Command::cargo_bin("af_cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn json_output_is_parseable_lines() {
    let output = Command::cargo_bin("af_cli")
        .unwrap()
        .args(["--json", "scan", "--frames", "30"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut frames = 0;
    for line in stdout.lines().filter(|l| l.starts_with('{')) {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("frame").is_some());
        assert!(value.get("state").is_some());
        frames += 1;
    }
    assert_eq!(frames, 30);
}

#[test]
fn tuning_file_is_honoured() {
    let dir = tempdir().unwrap();
    // A lens map with a different scale changes the reported hardware
    // codes.
    let tuning = write_tuning(&dir, "map = [[0.0, 0.0], [15.0, 1500.0]]");

    let output = Command::cargo_bin("af_cli")
        .unwrap()
        .args(["--json", "--config"])
        .arg(&tuning)
        .args(["scan", "--frames", "40"])
        .output()
        .unwrap();
    assert!(output.status.success());

    // Lens codes follow the custom 100-per-dioptre map.
    let stdout = String::from_utf8(output.stdout).unwrap();
    let last = stdout
        .lines()
        .filter(|l| l.starts_with('{'))
        .last()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(last).unwrap();
    let lens = value["lens_setting"].as_i64().unwrap();
    let pos = value["position"].as_f64().unwrap();
    assert_eq!(lens, (pos * 100.0).round() as i64);
}

#[test]
fn malformed_tuning_fails_with_a_parse_message() {
    let dir = tempdir().unwrap();
    let tuning = write_tuning(&dir, "map = \"sideways\"");

    Command::cargo_bin("af_cli")
        .unwrap()
        .arg("--config")
        .arg(&tuning)
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tuning file"));
}

#[test]
fn invalid_range_fails_with_a_tuning_error() {
    let dir = tempdir().unwrap();
    let tuning = write_tuning(&dir, "[ranges.normal]\nmin = 9.0\nmax = 1.0");

    Command::cargo_bin("af_cli")
        .unwrap()
        .arg("--config")
        .arg(&tuning)
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid tuning"));
}
