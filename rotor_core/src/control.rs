//! Height and yaw control cycle.
//!
//! Runs once per handoff. Inputs are sample-and-hold reads of the measured
//! height/yaw and the operator's target indices; outputs are blocking
//! single-slot duty commands for the main and tail motors.
use crate::calibration::GroundCalibration;
use crate::config::ControlCfg;
use crate::error::FatalError;
use crate::mailbox::{Duty, FeedReader};
use crate::pid::Pid;
use crate::setpoint::{height_target, yaw_target};
use crate::timer::{ElapsedTimer, TimerCfg};
use rotor_traits::TickCounter;

/// Signed yaw error along the shorter way round, negated so that positive
/// error asks the tail for more thrust.
///
/// Candidates are `t - y` and `t - (y + 360)`; ties go to the second.
pub fn yaw_error(target: i32, current: i32) -> i32 {
    let direct = target - current;
    let wrapped = target - (current + 360);
    let shortest = if direct.abs() < wrapped.abs() {
        direct
    } else {
        wrapped
    };
    -shortest
}

/// Readers for everything the control loop consumes.
#[derive(Debug)]
pub struct ControlInputs {
    pub height: FeedReader<u32>,
    pub yaw: FeedReader<i32>,
    pub target_height: FeedReader<usize>,
    pub target_yaw: FeedReader<usize>,
}

#[derive(Debug, Clone)]
pub struct ControlOutputs {
    pub main: Duty,
    pub tail: Duty,
}

/// What one control cycle computed and published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlReport {
    pub target_height_index: usize,
    pub target_yaw_index: usize,
    /// Captured ground code, if any cycle has captured it yet.
    pub ground: Option<u32>,
    pub height_above_ground: u32,
    pub height_error: i32,
    pub yaw: i32,
    pub yaw_error: i32,
    pub dt_ms: u32,
    pub parked: bool,
    pub main_duty: u32,
    pub tail_duty: u32,
}

pub struct ControlLoop<T> {
    inputs: ControlInputs,
    outputs: ControlOutputs,
    ticks: T,
    timer: ElapsedTimer,
    ground: GroundCalibration,
    height_pid: Pid,
    yaw_pid: Pid,
    parked_error: i32,
}

impl<T: TickCounter> ControlLoop<T> {
    /// Takes ownership of the tick counter and reloads it.
    pub fn new(
        cfg: &ControlCfg,
        timer_cfg: TimerCfg,
        mut ticks: T,
        ground: GroundCalibration,
        inputs: ControlInputs,
        outputs: ControlOutputs,
    ) -> Self {
        let timer = ElapsedTimer::start(timer_cfg, &mut ticks);
        Self {
            inputs,
            outputs,
            ticks,
            timer,
            ground,
            height_pid: Pid::new(cfg.height),
            yaw_pid: Pid::new(cfg.yaw),
            parked_error: cfg.parked_error,
        }
    }

    pub fn ground(&self) -> &GroundCalibration {
        &self.ground
    }

    pub fn ticks_mut(&mut self) -> &mut T {
        &mut self.ticks
    }

    pub fn cycle(&mut self) -> Result<ControlReport, FatalError> {
        let measured = self.inputs.height.latest();
        let yaw = self.inputs.yaw.latest();
        let target_height_index = self.inputs.target_height.latest();
        let target_yaw_index = self.inputs.target_yaw.latest();

        // Validate both targets before any duty goes out.
        let target_height = height_target(target_height_index)?;
        let target_yaw = yaw_target(target_yaw_index)?;

        self.ground.observe(target_height_index, measured);
        let dt_ms = self.timer.elapsed_ms(&mut self.ticks);

        let above = self.ground.height_above_ground(measured);
        let height_error = target_height - i32::try_from(above).unwrap_or(i32::MAX);
        let parked = target_height_index == 0 && height_error < self.parked_error;

        let mut main = if parked {
            0
        } else {
            self.height_pid.gains().base_duty
        };
        main += self.height_pid.step(height_error, dt_ms);
        let main_duty = self.height_pid.clamp_duty(main);
        self.outputs.main.publish(main_duty)?;

        let yaw_err = yaw_error(target_yaw, yaw);
        let mut tail = if parked {
            0
        } else {
            self.yaw_pid.gains().base_duty
        };
        tail += self.yaw_pid.step(yaw_err, dt_ms);
        let tail_duty = self.yaw_pid.clamp_duty(tail);
        self.outputs.tail.publish(tail_duty)?;

        tracing::debug!(
            height = above,
            height_error,
            yaw,
            yaw_error = yaw_err,
            dt_ms,
            main_duty,
            tail_duty,
            parked,
            "control cycle"
        );

        Ok(ControlReport {
            target_height_index,
            target_yaw_index,
            ground: self.ground.ground(),
            height_above_ground: above,
            height_error,
            yaw,
            yaw_error: yaw_err,
            dt_ms,
            parked,
            main_duty,
            tail_duty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalError;
    use crate::mailbox::{duty, feed};
    use crate::mocks::ManualTicks;
    use crate::setpoint::Axis;

    #[test]
    fn out_of_range_target_is_fatal_before_any_duty() {
        let (_h, height) = feed("height", 4, 3000u32);
        let (_y, yaw) = feed("yaw", 4, 0i32);
        let (th_tx, target_height) = feed("target height", 4, 0usize);
        let (_ty, target_yaw) = feed("target yaw", 4, 0usize);
        let (main, main_rx) = duty("main duty", None);
        let (tail, _tail_rx) = duty("tail duty", None);
        let mut c = ControlLoop::new(
            &ControlCfg::default(),
            TimerCfg::default(),
            ManualTicks::new(),
            GroundCalibration::default(),
            ControlInputs {
                height,
                yaw,
                target_height,
                target_yaw,
            },
            ControlOutputs { main, tail },
        );
        th_tx.publish(11).unwrap();
        assert_eq!(
            c.cycle().unwrap_err(),
            FatalError::SetpointOutOfRange {
                axis: Axis::Height,
                index: 11,
                max: 10
            }
        );
        assert_eq!(main_rx.try_take(), None);
    }

    #[test]
    fn yaw_error_takes_short_way_and_negates() {
        assert_eq!(yaw_error(179, -165), -(179 - 195));
        assert_eq!(yaw_error(30, 0), -30);
        assert_eq!(yaw_error(0, 30), 30);
        assert_eq!(yaw_error(-15, 15), 30);
    }

    #[test]
    fn yaw_error_tie_prefers_wrapped_candidate() {
        // direct = -180, wrapped = -540: direct wins
        assert_eq!(yaw_error(0, 180), 180);
        // direct = 180, wrapped = -180: tie goes to wrapped, negated
        assert_eq!(yaw_error(0, -180), 180);
    }
}
