use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[filter]
prefill = "first-sample"

[scheduler]
tick_ms = 0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_line(stdout: &[u8], key: &str) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .find(|l| l.contains(&format!("\"{key}\"")))
        .unwrap_or_else(|| panic!("no JSON line with {key}; stdout was: {stdout}"));
    serde_json::from_str(line).expect("valid JSON")
}

/// A simulated flight settles near the commanded height and heading.
#[rstest]
#[case(false)]
#[case(true)]
fn run_summary_schema(#[case] threaded: bool) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("rotor").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--cycles", "600", "--height", "1", "--yaw", "2"]);
    if threaded {
        cmd.arg("--threaded");
    }

    let out = cmd.assert().success().get_output().stdout.clone();
    let v = json_line(&out, "cycles");

    assert_eq!(v["cycles"].as_u64(), Some(600));
    assert_eq!(v["ground"].as_u64(), Some(3000));
    assert_eq!(v["target_height_index"].as_u64(), Some(1));
    assert_eq!(v["target_yaw_index"].as_u64(), Some(2));
    assert_eq!(v["parked"].as_bool(), Some(false));
    assert_eq!(v["interrupted"].as_bool(), Some(false));
    let err = v["height_error"].as_i64().unwrap();
    assert!((0..=20).contains(&err), "height error {err}");
    let yaw = v["yaw"].as_i64().unwrap();
    assert!((27..=31).contains(&yaw), "yaw {yaw}");
    for key in ["main_duty", "tail_duty", "duration_ms"] {
        assert!(v[key].as_u64().is_some(), "{key} should be a number");
    }
    assert!(v["plant_height"].as_f64().is_some());
}

/// With no config file the height window starts zero-filled; the rig must
/// still fly to the real height, not to one offset by the warm-up bias.
#[test]
fn default_config_flies_to_true_height() {
    let out = Command::cargo_bin("rotor")
        .unwrap()
        .args(["--json", "--log-level", "error"])
        .args(["run", "--cycles", "600", "--height", "3"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v = json_line(&out, "cycles");

    let ground = v["ground"].as_u64().unwrap();
    assert!((2960..=3000).contains(&ground), "ground {ground}");
    let height = v["plant_height"].as_f64().unwrap();
    assert!((270.0..=340.0).contains(&height), "plant height {height}");
    assert_eq!(v["pot"].as_u64(), Some(2048));
}

#[test]
fn setpoint_error_is_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("rotor")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--yaw", "30"])
        .assert()
        .code(4)
        .get_output()
        .stdout
        .clone();
    let v = json_line(&out, "reason");
    assert_eq!(v["reason"], "SetpointOutOfRange");
    assert_eq!(v["details"]["axis"], "yaw");
    assert_eq!(v["details"]["index"], 30);
    assert_eq!(v["details"]["max"], 23);
}

#[test]
fn check_config_json() {
    let out = Command::cargo_bin("rotor")
        .unwrap()
        .args(["--json", "--log-level", "error", "check-config"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_line(&out, "status")["status"], "ok");
}
