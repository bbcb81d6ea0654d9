//! Discrete PID terms with a deadband-cleared integral.
//!
//! Each term is evaluated in floating point and truncated toward zero before
//! it is summed into the duty, matching the rig's integer duty arithmetic.

/// Gains and limits for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Integral accumulator is cleared while `|error| < deadband`.
    pub deadband: i32,
    pub base_duty: i32,
    pub max_duty: u32,
}

impl PidGains {
    pub const HEIGHT: Self = Self {
        kp: 0.1,
        ki: 0.01e-3,
        kd: 0.0,
        deadband: 20,
        base_duty: 50,
        max_duty: 99,
    };

    pub const YAW: Self = Self {
        kp: 1.0,
        ki: 0.2e-3,
        kd: 0.0,
        deadband: 2,
        base_duty: 40,
        max_duty: 85,
    };
}

/// Upper bound for any duty command.
pub const DUTY_CEILING: i32 = 99;

#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    last_error: i32,
    integral: i32,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            last_error: 0,
            integral: 0,
        }
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn integral(&self) -> i32 {
        self.integral
    }

    pub fn proportional(&self, error: i32) -> i32 {
        (self.gains.kp * f64::from(error)) as i32
    }

    /// `(last - error) / dt`, or 0 when no time has elapsed.
    pub fn derivative(&mut self, error: i32, dt_ms: u32) -> i32 {
        let slope = if dt_ms == 0 {
            0
        } else {
            // dt is well below i32::MAX ms between reloads
            self.last_error.wrapping_sub(error) / dt_ms as i32
        };
        self.last_error = error;
        (self.gains.kd * f64::from(slope)) as i32
    }

    pub fn integral_term(&mut self, error: i32, dt_ms: u32) -> i32 {
        if error.abs() < self.gains.deadband {
            self.integral = 0;
        }
        self.integral = self
            .integral
            .saturating_add(error.saturating_mul(dt_ms as i32));
        (self.gains.ki * f64::from(self.integral)) as i32
    }

    /// Sum of all three terms for one cycle.
    pub fn step(&mut self, error: i32, dt_ms: u32) -> i32 {
        self.proportional(error) + self.derivative(error, dt_ms) + self.integral_term(error, dt_ms)
    }

    /// Clamp to `[0, 99]`, then to this axis' ceiling.
    pub fn clamp_duty(&self, raw: i32) -> u32 {
        let duty = raw.clamp(0, DUTY_CEILING) as u32;
        duty.min(self.gains.max_duty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_truncate_toward_zero() {
        let p = Pid::new(PidGains::HEIGHT);
        assert_eq!(p.proportional(19), 1);
        assert_eq!(p.proportional(-19), -1);
        assert_eq!(p.proportional(9), 0);
    }

    #[test]
    fn integral_clears_inside_deadband() {
        let mut p = Pid::new(PidGains::YAW);
        p.integral_term(10, 100);
        assert_eq!(p.integral(), 1000);
        p.integral_term(1, 100);
        assert_eq!(p.integral(), 100);
        p.integral_term(-1, 100);
        assert_eq!(p.integral(), -100);
    }

    #[test]
    fn height_integral_collapses_just_inside_deadband() {
        let mut p = Pid::new(PidGains::HEIGHT);
        p.integral_term(25, 100);
        p.integral_term(-40, 100);
        p.integral_term(300, 100);
        assert_eq!(p.integral(), 28_500);
        // 20 is outside the band and still accumulates
        p.integral_term(20, 100);
        assert_eq!(p.integral(), 30_500);
        p.integral_term(19, 100);
        assert_eq!(p.integral(), 19 * 100);
        p.integral_term(-19, 40);
        assert_eq!(p.integral(), -19 * 40);
    }

    #[test]
    fn zero_dt_derivative_is_zero() {
        let mut p = Pid::new(PidGains {
            kd: 1.0,
            ..PidGains::HEIGHT
        });
        assert_eq!(p.derivative(50, 0), 0);
        assert_eq!(p.derivative(10, 4), 10);
    }

    #[test]
    fn clamp_applies_axis_ceiling() {
        let h = Pid::new(PidGains::HEIGHT);
        let y = Pid::new(PidGains::YAW);
        assert_eq!(h.clamp_duty(150), 99);
        assert_eq!(h.clamp_duty(-3), 0);
        assert_eq!(y.clamp_duty(150), 85);
        assert_eq!(y.clamp_duty(90), 85);
        assert_eq!(y.clamp_duty(60), 60);
    }
}
