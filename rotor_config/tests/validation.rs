use rotor_config::{Prefill, load_file, load_toml};
use rstest::rstest;
use std::io::Write;

const FULL: &str = r#"
[filter]
height_window = 5
pot_window = 10
prefill = "zeros"

[height]
kp = 0.1
ki = 0.00001
kd = 0.0
deadband = 20
base_duty = 50
max_duty = 99
parked_error = 10

[yaw]
kp = 1.0
ki = 0.0002
deadband = 2
base_duty = 40
max_duty = 85

[timer]
reload_threshold = 400000000
reload_value = 1000000000

[mailbox]
capacity = 10
display_decimation = 5

[pins]
phase_a = 17
phase_b = 27
reference = 22
"#;

#[test]
fn accepts_full_rig_config() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    let pins = cfg.pins.expect("pins present");
    assert_eq!((pins.phase_a, pins.phase_b, pins.reference), (17, 27, Some(22)));
    assert_eq!(cfg.filter.prefill, Prefill::Zeros);
}

#[rstest]
#[case("[filter]\nheight_window = 0\n", "filter.height_window must be >= 1")]
#[case("[filter]\npot_window = 0\n", "filter.pot_window must be >= 1")]
#[case("[height]\nkp = -0.1\n", "height.kp must be finite and >= 0")]
#[case("[yaw]\nmax_duty = 100\n", "yaw.max_duty must be <= 99")]
#[case("[yaw]\nbase_duty = 120\n", "yaw.base_duty must be in [0, 99]")]
#[case("[height]\ndeadband = -1\n", "height.deadband must be >= 0")]
#[case(
    "[timer]\nreload_threshold = 5\nreload_value = 5\n",
    "timer.reload_threshold must be < timer.reload_value"
)]
#[case("[mailbox]\ncapacity = 0\n", "mailbox.capacity must be >= 1")]
#[case("[mailbox]\ndisplay_decimation = 0\n", "mailbox.display_decimation must be >= 1")]
#[case("[scheduler]\ngate_poll_ms = 0\n", "scheduler.gate_poll_ms must be >= 1")]
#[case("[pins]\nphase_a = 4\nphase_b = 4\n", "pins.phase_a and pins.phase_b must differ")]
#[case("[sim]\nground_raw = 5000\n", "sim.ground_raw must be <= 4095")]
#[case("[sim]\npot_raw = 4096\n", "sim.pot_raw must be <= 4095")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn unknown_prefill_fails_to_parse() {
    assert!(load_toml("[filter]\nprefill = \"ones\"\n").is_err());
}

#[test]
fn load_file_parses_and_validates() {
    let mut f = tempfile::NamedTempFile::new().expect("tmp");
    f.write_all(FULL.as_bytes()).expect("write");
    let cfg = load_file(f.path()).expect("load");
    assert_eq!(cfg.yaw.max_duty, 85);

    let mut bad = tempfile::NamedTempFile::new().expect("tmp");
    bad.write_all(b"[mailbox]\ncapacity = 0\n").expect("write");
    let err = load_file(bad.path()).expect_err("invalid");
    assert!(format!("{err}").contains("mailbox.capacity"));
}

#[test]
fn load_file_reports_missing_path() {
    let err = load_file(std::path::Path::new("/definitely/not/here.toml")).expect_err("missing");
    assert!(format!("{err}").contains("read config"));
}
