//! Assembly of a rig from a config, an ADC and a tick counter.
//!
//! `RigBuilder::try_build` wires every mailbox, creates the sampler and the
//! control loop, and hands back the operator/actuator/display ends as
//! `RigPorts`.
use std::sync::Arc;

use rotor_traits::{HeightAdc, TickCounter};

use crate::config::RigCfg;
use crate::calibration::GroundCalibration;
use crate::control::{ControlInputs, ControlLoop, ControlOutputs};
use crate::error::{BuildError, Result};
use crate::mailbox::{Bus, DutyReader, FeedReader};
use crate::potentiometer::{DEFAULT_VARIANCE, PotMonitor};
use crate::quadrature::QuadratureDecoder;
use crate::ring_filter::RingFilter;
use crate::sampler::{Sampler, SamplerFeeds};
use crate::setpoint::TargetStepper;

/// Everything outside the two tasks talks to the rig through these.
pub struct RigPorts {
    pub stepper: TargetStepper,
    pub height_display: FeedReader<u32>,
    pub yaw_display: FeedReader<i32>,
    pub main_duty: DutyReader,
    pub tail_duty: DutyReader,
    pub decoder: Arc<QuadratureDecoder>,
    /// Smoothing for an operator potentiometer, if the rig has one.
    pub pot: PotMonitor,
}

impl RigPorts {
    /// Drain both display feeds, returning the newest (height, yaw).
    pub fn drain_display(&mut self) -> (u32, i32) {
        (self.height_display.latest(), self.yaw_display.latest())
    }
}

pub struct RigParts<A, T> {
    pub sampler: Sampler<A>,
    pub control: ControlLoop<T>,
    pub ports: RigPorts,
}

pub struct RigBuilder<A, T> {
    cfg: RigCfg,
    adc: Option<A>,
    ticks: Option<T>,
    decoder: Option<Arc<QuadratureDecoder>>,
}

impl<A: HeightAdc, T: TickCounter> RigBuilder<A, T> {
    pub fn new(cfg: RigCfg) -> Self {
        Self {
            cfg,
            adc: None,
            ticks: None,
            decoder: None,
        }
    }

    pub fn with_adc(mut self, adc: A) -> Self {
        self.adc = Some(adc);
        self
    }

    pub fn with_ticks(mut self, ticks: T) -> Self {
        self.ticks = Some(ticks);
        self
    }

    /// Share an existing decoder (e.g. one already bound to GPIO edges).
    /// Without one a decoder starting at phase 00 is created.
    pub fn with_decoder(mut self, decoder: Arc<QuadratureDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn try_build(self) -> Result<RigParts<A, T>> {
        let adc = self
            .adc
            .ok_or_else(|| eyre::Report::new(BuildError::MissingAdc))?;
        let ticks = self
            .ticks
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTicks))?;
        let cfg = self.cfg;
        if cfg.mailbox.capacity == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "mailbox capacity must be >= 1",
            )));
        }
        if cfg.mailbox.display_decimation == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "display decimation must be >= 1",
            )));
        }
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(QuadratureDecoder::new(false, false)));
        let filter = RingFilter::new(cfg.filter.height_window, cfg.filter.height_prefill)
            .map_err(eyre::Report::new)?;
        let pot = PotMonitor::new(cfg.filter.pot_window, DEFAULT_VARIANCE)
            .map_err(eyre::Report::new)?;

        let bus = Bus::new(cfg.mailbox.capacity, cfg.mailbox.duty_timeout);
        let Bus {
            height_control,
            yaw_control,
            height_display,
            yaw_display,
            target_height,
            target_yaw,
            main_duty,
            tail_duty,
        } = bus;

        let sampler = Sampler::new(
            adc,
            filter,
            Arc::clone(&decoder),
            SamplerFeeds {
                height_control: height_control.0,
                yaw_control: yaw_control.0,
                height_display: height_display.0,
                yaw_display: yaw_display.0,
            },
            cfg.mailbox.display_decimation,
        );
        let control = ControlLoop::new(
            &cfg.control,
            cfg.timer,
            ticks,
            GroundCalibration::new(cfg.filter.height_warmup()),
            ControlInputs {
                height: height_control.1,
                yaw: yaw_control.1,
                target_height: target_height.1,
                target_yaw: target_yaw.1,
            },
            ControlOutputs {
                main: main_duty.0,
                tail: tail_duty.0,
            },
        );
        tracing::debug!(
            window = cfg.filter.height_window,
            capacity = cfg.mailbox.capacity,
            "rig assembled"
        );

        Ok(RigParts {
            sampler,
            control,
            ports: RigPorts {
                stepper: TargetStepper::new(target_height.0, target_yaw.0),
                height_display: height_display.1,
                yaw_display: yaw_display.1,
                main_duty: main_duty.1,
                tail_duty: tail_duty.1,
                decoder,
                pot,
            },
        })
    }
}
