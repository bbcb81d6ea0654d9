use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// First-sample prefill so ground reads as the true resting code.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[filter]
height_window = 5
prefill = "first-sample"

[scheduler]
tick_ms = 0
gate_poll_ms = 1

[sim]
ground_raw = 3000
hover_duty = 50
cycle_ms = 10
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check-config"], 0, "config ok", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["run", "--cycles", "20"], 0, "cycles:   20", "stdout")]
#[case(&["run", "--cycles", "20", "--threaded"], 0, "cycles:   20", "stdout")]
#[case(&["run", "--height", "11"], 4, "outside the table", "stderr")]
#[case(&["run", "--yaw", "24"], 4, "0..=23", "stderr")]
#[case(&["run", "--cycles", "20", "--pot", "3000"], 0, "pot:      3000", "stdout")]
#[case(&["run", "--pot", "5000"], 2, "0..=4095", "stderr")]
#[case(&["fly"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("rotor").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("[filter]\nheight_window = 0\n", "filter.height_window must be >= 1")]
#[case("[yaw]\nmax_duty = 100\n", "yaw.max_duty must be <= 99")]
#[case("[filter]\nprefill = \"ones\"\n", "parse config")]
fn cli_rejects_bad_config(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();

    Command::cargo_bin("rotor")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("rotor")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("check-config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[test]
fn no_config_runs_on_defaults() {
    Command::cargo_bin("rotor")
        .unwrap()
        .arg("--log-level")
        .arg("error")
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check ok"));
}

#[test]
fn trace_and_record_files_are_written() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = dir.path().join("trace.csv");
    let record = dir.path().join("record.csv");

    Command::cargo_bin("rotor")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("error")
        .args(["run", "--cycles", "10", "--trace"])
        .arg(&trace)
        .arg("--record")
        .arg(&record)
        .assert()
        .success();

    let trace = fs::read_to_string(&trace).unwrap();
    let lines: Vec<_> = trace.lines().collect();
    assert_eq!(lines[0], "cycle,task,state");
    // four handoff transitions per cycle
    assert_eq!(lines.len(), 1 + 4 * 10);
    assert_eq!(lines[1], "0,sampler,waiting_for_sample");
    assert_eq!(lines[2], "0,sampler,sampling");
    assert_eq!(lines[4], "0,control,controlling");

    let record = fs::read_to_string(&record).unwrap();
    let rows: Vec<_> = record.lines().collect();
    assert_eq!(rows.len(), 1 + 10);
    assert!(rows[0].starts_with("cycle,target_height_index"));
    // first cycle parks on the ground
    assert!(rows[1].ends_with("true,0,0"), "row was {}", rows[1]);
}
