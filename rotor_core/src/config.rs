//! Runtime configuration for the rig core.
//!
//! These are separate from the TOML-deserialized config in `rotor_config`;
//! see `conversions` for the mapping.
use crate::pid::PidGains;
use crate::ring_filter::PrefillPolicy;
use crate::timer::TimerCfg;
use std::time::Duration;

/// Filter windows and prefill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCfg {
    pub height_window: usize,
    pub pot_window: usize,
    pub height_prefill: PrefillPolicy,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            height_window: 5,
            pot_window: 10,
            height_prefill: PrefillPolicy::Zeros,
        }
    }
}

impl FilterCfg {
    /// Samples before the height mean no longer carries prefill.
    pub fn height_warmup(&self) -> usize {
        match self.height_prefill {
            PrefillPolicy::Zeros => self.height_window,
            PrefillPolicy::FirstSample => 1,
        }
    }
}

/// Gains for both axes plus the parked threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCfg {
    pub height: PidGains,
    pub yaw: PidGains,
    /// With target height index 0 and height error below this, both motors
    /// drop their base duty.
    pub parked_error: i32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            height: PidGains::HEIGHT,
            yaw: PidGains::YAW,
            parked_error: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxCfg {
    pub capacity: usize,
    /// Display telemetry goes out every Nth sampler cycle.
    pub display_decimation: u32,
    /// `None` blocks forever on a full duty slot.
    pub duty_timeout: Option<Duration>,
}

impl Default for MailboxCfg {
    fn default() -> Self {
        Self {
            capacity: 10,
            display_decimation: 5,
            duty_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerCfg {
    /// Pause after each control cycle.
    pub tick: Duration,
    /// Gate wait before re-checking the shutdown flag.
    pub gate_poll: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1),
            gate_poll: Duration::from_millis(1),
        }
    }
}

/// Everything the core needs to assemble a rig.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RigCfg {
    pub filter: FilterCfg,
    pub control: ControlCfg,
    pub timer: TimerCfg,
    pub mailbox: MailboxCfg,
    pub scheduler: SchedulerCfg,
}
