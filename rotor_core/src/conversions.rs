//! `From` implementations bridging `rotor_config` types to `rotor_core` types.

use crate::config::{ControlCfg, FilterCfg, MailboxCfg, RigCfg, SchedulerCfg};
use crate::pid::PidGains;
use crate::ring_filter::PrefillPolicy;
use crate::timer::TimerCfg;
use std::time::Duration;

// ── Filter ───────────────────────────────────────────────────────────────────

impl From<rotor_config::Prefill> for PrefillPolicy {
    fn from(p: rotor_config::Prefill) -> Self {
        match p {
            rotor_config::Prefill::Zeros => Self::Zeros,
            rotor_config::Prefill::FirstSample => Self::FirstSample,
        }
    }
}

impl From<&rotor_config::FilterCfg> for FilterCfg {
    fn from(c: &rotor_config::FilterCfg) -> Self {
        Self {
            height_window: c.height_window,
            pot_window: c.pot_window,
            height_prefill: c.prefill.into(),
        }
    }
}

// ── Control ──────────────────────────────────────────────────────────────────

impl From<rotor_config::AxisCfg> for PidGains {
    fn from(a: rotor_config::AxisCfg) -> Self {
        Self {
            kp: a.kp,
            ki: a.ki,
            kd: a.kd,
            deadband: a.deadband,
            base_duty: a.base_duty,
            max_duty: a.max_duty,
        }
    }
}

impl From<&rotor_config::Config> for ControlCfg {
    fn from(c: &rotor_config::Config) -> Self {
        Self {
            height: c.height.axis().into(),
            yaw: c.yaw.axis().into(),
            parked_error: c.height.parked_error,
        }
    }
}

// ── Timer / mailboxes / scheduler ────────────────────────────────────────────

impl From<&rotor_config::TimerCfg> for TimerCfg {
    fn from(c: &rotor_config::TimerCfg) -> Self {
        Self {
            reload_threshold: c.reload_threshold,
            reload_value: c.reload_value,
            ms_per_tick: c.ms_per_tick,
        }
    }
}

impl From<&rotor_config::MailboxCfg> for MailboxCfg {
    fn from(c: &rotor_config::MailboxCfg) -> Self {
        Self {
            capacity: c.capacity,
            display_decimation: c.display_decimation,
            duty_timeout: (c.actuator_send_timeout_ms > 0)
                .then(|| Duration::from_millis(c.actuator_send_timeout_ms)),
        }
    }
}

impl From<&rotor_config::SchedulerCfg> for SchedulerCfg {
    fn from(c: &rotor_config::SchedulerCfg) -> Self {
        Self {
            tick: Duration::from_millis(c.tick_ms),
            gate_poll: Duration::from_millis(c.gate_poll_ms.max(1)),
        }
    }
}

impl From<&rotor_config::Config> for RigCfg {
    fn from(c: &rotor_config::Config) -> Self {
        Self {
            filter: (&c.filter).into(),
            control: c.into(),
            timer: (&c.timer).into(),
            mailbox: (&c.mailbox).into(),
            scheduler: (&c.scheduler).into(),
        }
    }
}
