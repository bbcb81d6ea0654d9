#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the rotor rig.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section has defaults matching the tuned rig, so an empty file
//!   (or a missing section) yields the stock controller.
use serde::Deserialize;
use std::path::Path;

/// How a ring filter treats slots that have never been written.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Prefill {
    /// Unwritten slots read as zero (startup mean is biased low).
    #[default]
    Zeros,
    /// The first written value is copied into every slot.
    FirstSample,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// Height moving-average window (samples).
    pub height_window: usize,
    /// Potentiometer moving-average window (samples).
    pub pot_window: usize,
    /// Prefill policy for the height filter. The potentiometer always uses first-sample.
    pub prefill: Prefill,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            height_window: 5,
            pot_window: 10,
            prefill: Prefill::Zeros,
        }
    }
}

/// Gains and limits for one PID axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Integral accumulator is cleared while |error| < deadband.
    pub deadband: i32,
    /// Duty offset added before the PID terms.
    pub base_duty: i32,
    /// Final ceiling after the generic [0, 99] clamp.
    pub max_duty: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeightCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub deadband: i32,
    pub base_duty: i32,
    pub max_duty: u32,
    /// With target index 0, the rig counts as parked while error < this value.
    pub parked_error: i32,
}

impl Default for HeightCfg {
    fn default() -> Self {
        Self {
            kp: 0.1,
            ki: 0.01e-3,
            kd: 0.0,
            deadband: 20,
            base_duty: 50,
            max_duty: 99,
            parked_error: 10,
        }
    }
}

impl HeightCfg {
    pub const fn axis(&self) -> AxisCfg {
        AxisCfg {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            deadband: self.deadband,
            base_duty: self.base_duty,
            max_duty: self.max_duty,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct YawCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub deadband: i32,
    pub base_duty: i32,
    pub max_duty: u32,
}

impl Default for YawCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.2e-3,
            kd: 0.0,
            deadband: 2,
            base_duty: 40,
            max_duty: 85,
        }
    }
}

impl YawCfg {
    pub const fn axis(&self) -> AxisCfg {
        AxisCfg {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            deadband: self.deadband,
            base_duty: self.base_duty,
            max_duty: self.max_duty,
        }
    }
}

/// Free-running loop timer parameters.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimerCfg {
    /// When the counter falls below this value it is reloaded.
    pub reload_threshold: u32,
    /// Value loaded at start and on every reload.
    pub reload_value: u32,
    /// Milliseconds per counter tick (12.5 ns at 80 MHz).
    pub ms_per_tick: f64,
}

impl Default for TimerCfg {
    fn default() -> Self {
        Self {
            reload_threshold: 400_000_000,
            reload_value: 1_000_000_000,
            ms_per_tick: 12.5e-6,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MailboxCfg {
    /// Capacity of the measurement/telemetry/setpoint mailboxes.
    pub capacity: usize,
    /// Publish display telemetry every Nth cycle.
    pub display_decimation: u32,
    /// Bound on the blocking duty publish (ms). 0 blocks forever.
    pub actuator_send_timeout_ms: u64,
}

impl Default for MailboxCfg {
    fn default() -> Self {
        Self {
            capacity: 10,
            display_decimation: 5,
            actuator_send_timeout_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerCfg {
    /// Yield after each control cycle (ms). 0 just yields the thread.
    pub tick_ms: u64,
    /// How long a task waits on its gate before re-checking for shutdown (ms).
    pub gate_poll_ms: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            tick_ms: 1,
            gate_poll_ms: 1,
        }
    }
}

/// BCM pin numbers for the encoder when running with real GPIO.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub phase_a: u8,
    pub phase_b: u8,
    pub reference: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Plant model used when no hardware is attached.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// ADC code with the rig resting on the ground.
    pub ground_raw: u32,
    /// Main duty at which the rig neither climbs nor sinks.
    pub hover_duty: u32,
    /// Height units gained per cycle per duty point above hover.
    pub climb_per_duty: f64,
    /// Tail duty at which the rig holds its heading.
    pub tail_neutral_duty: u32,
    /// Degrees turned per cycle per duty point below neutral.
    pub spin_per_duty: f64,
    /// Peak ADC noise in counts (0 disables).
    pub noise: u32,
    /// Simulated wall time per cycle (ms); drives the loop timer.
    pub cycle_ms: u64,
    /// Potentiometer code at startup.
    pub pot_raw: u32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            ground_raw: 3000,
            hover_duty: 50,
            climb_per_duty: 0.5,
            tail_neutral_duty: 40,
            spin_per_duty: 0.05,
            noise: 0,
            cycle_ms: 10,
            pot_raw: 2048,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub filter: FilterCfg,
    pub height: HeightCfg,
    pub yaw: YawCfg,
    pub timer: TimerCfg,
    pub mailbox: MailboxCfg,
    pub scheduler: SchedulerCfg,
    /// Encoder pins; only consulted by hardware builds.
    pub pins: Option<Pins>,
    pub logging: Logging,
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn validate_axis(name: &str, a: &AxisCfg) -> eyre::Result<()> {
    for (field, v) in [("kp", a.kp), ("ki", a.ki), ("kd", a.kd)] {
        if !v.is_finite() || v < 0.0 {
            eyre::bail!("{name}.{field} must be finite and >= 0");
        }
    }
    if a.deadband < 0 {
        eyre::bail!("{name}.deadband must be >= 0");
    }
    if !(0..=99).contains(&a.base_duty) {
        eyre::bail!("{name}.base_duty must be in [0, 99]");
    }
    if a.max_duty > 99 {
        eyre::bail!("{name}.max_duty must be <= 99");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Filter
        if self.filter.height_window == 0 {
            eyre::bail!("filter.height_window must be >= 1");
        }
        if self.filter.pot_window == 0 {
            eyre::bail!("filter.pot_window must be >= 1");
        }
        if self.filter.height_window > 1024 || self.filter.pot_window > 1024 {
            eyre::bail!("filter windows are unreasonably large (>1024)");
        }

        // Axes
        validate_axis("height", &self.height.axis())?;
        validate_axis("yaw", &self.yaw.axis())?;
        if self.height.parked_error < 0 {
            eyre::bail!("height.parked_error must be >= 0");
        }

        // Timer
        if self.timer.reload_threshold >= self.timer.reload_value {
            eyre::bail!("timer.reload_threshold must be < timer.reload_value");
        }
        if !(self.timer.ms_per_tick.is_finite() && self.timer.ms_per_tick > 0.0) {
            eyre::bail!("timer.ms_per_tick must be > 0");
        }

        // Mailboxes
        if self.mailbox.capacity == 0 {
            eyre::bail!("mailbox.capacity must be >= 1");
        }
        if self.mailbox.display_decimation == 0 {
            eyre::bail!("mailbox.display_decimation must be >= 1");
        }

        // Scheduler
        if self.scheduler.gate_poll_ms == 0 {
            eyre::bail!("scheduler.gate_poll_ms must be >= 1");
        }

        // Pins
        if let Some(p) = self.pins
            && p.phase_a == p.phase_b
        {
            eyre::bail!("pins.phase_a and pins.phase_b must differ");
        }

        // Sim
        if self.sim.ground_raw > 4095 {
            eyre::bail!("sim.ground_raw must be <= 4095");
        }
        if self.sim.pot_raw > 4095 {
            eyre::bail!("sim.pot_raw must be <= 4095");
        }
        if self.sim.cycle_ms == 0 {
            eyre::bail!("sim.cycle_ms must be >= 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_rig_defaults() {
        let cfg = load_toml("").expect("empty TOML parses");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.filter.height_window, 5);
        assert_eq!(cfg.filter.pot_window, 10);
        assert_eq!(cfg.height.deadband, 20);
        assert_eq!(cfg.height.base_duty, 50);
        assert_eq!(cfg.yaw.max_duty, 85);
        assert_eq!(cfg.timer.reload_value, 1_000_000_000);
        assert_eq!(cfg.mailbox.capacity, 10);
        assert!(cfg.pins.is_none());
    }

    #[test]
    fn partial_axis_keeps_other_defaults() {
        let cfg = load_toml(
            r#"
[yaw]
kp = 0.5
"#,
        )
        .expect("parse");
        assert_eq!(cfg.yaw.kp, 0.5);
        assert_eq!(cfg.yaw.deadband, 2);
        assert_eq!(cfg.yaw.base_duty, 40);
    }

    #[test]
    fn prefill_parses_kebab_case() {
        let cfg = load_toml("[filter]\nprefill = \"first-sample\"\n").expect("parse");
        assert_eq!(cfg.filter.prefill, Prefill::FirstSample);
    }
}
